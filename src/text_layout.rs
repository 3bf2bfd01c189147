use ratatui::style::Style;
use ratatui::text::{Line, Span};

pub fn wrap_line(line: &Line<'static>, width: u16) -> Vec<Line<'static>> {
    let width = width.max(1);
    let cells: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|span| span.content.chars().map(move |ch| (ch, span.style)))
        .filter(|(ch, _)| *ch != '\n')
        .collect();

    if cells.len() <= width as usize {
        return vec![line.clone()];
    }

    let chars: Vec<char> = cells.iter().map(|(ch, _)| *ch).collect();
    let mut rows: Vec<Vec<(char, Style)>> = vec![Vec::new()];
    let mut col = 0u16;

    for (idx, cell) in cells.iter().copied().enumerate() {
        if should_wrap_before_word(&chars, idx, col, width) || col >= width {
            rows.push(Vec::new());
            col = 0;
        }
        // A wrapped row never starts with the space that caused the break.
        if col == 0 && rows.len() > 1 && cell.0 == ' ' {
            continue;
        }
        if let Some(row) = rows.last_mut() {
            row.push(cell);
        }
        col = col.saturating_add(1);
    }

    let last = rows.len().saturating_sub(1);
    for row in rows.iter_mut().take(last) {
        while row.last().is_some_and(|(ch, _)| *ch == ' ') {
            row.pop();
        }
    }

    rows.into_iter()
        .map(|row| Line::from(regroup_spans(row)).style(line.style))
        .collect()
}

fn regroup_spans(cells: Vec<(char, Style)>) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut run = String::new();
    let mut run_style: Option<Style> = None;
    for (ch, style) in cells {
        if run_style.is_some_and(|current| current != style) {
            spans.push(Span::styled(std::mem::take(&mut run), run_style.unwrap_or_default()));
        }
        run_style = Some(style);
        run.push(ch);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, run_style.unwrap_or_default()));
    }
    spans
}

fn should_wrap_before_word(chars: &[char], idx: usize, col: u16, width: u16) -> bool {
    if col == 0 {
        return false;
    }
    let ch = chars[idx];
    if ch.is_whitespace() {
        return false;
    }
    if idx > 0 && !chars[idx - 1].is_whitespace() {
        return false;
    }

    let word_len = chars[idx..]
        .iter()
        .take_while(|c| !c.is_whitespace())
        .count() as u16;

    word_len <= width && col.saturating_add(word_len) > width
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputWindow {
    pub visible: String,
    pub cursor_col: u16,
}

pub fn input_window(text: &str, cursor: usize, width: u16) -> InputWindow {
    let width = width.max(1) as usize;
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    // Keep one cell free for the cursor when it sits at the end.
    let start = (cursor + 1).saturating_sub(width);
    let visible: String = chars.iter().skip(start).take(width).collect();
    InputWindow {
        visible,
        cursor_col: (cursor - start) as u16,
    }
}
