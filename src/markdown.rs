use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui_core::style as core_style;

pub fn render(markdown: &str) -> Vec<Line<'static>> {
    let rendered = tui_markdown::from_str(markdown);
    let mut lines: Vec<Line<'static>> = rendered
        .lines
        .into_iter()
        .map(|line| {
            let style = convert_style(line.style);
            let spans: Vec<Span<'static>> = line
                .spans
                .into_iter()
                .map(|span| Span::styled(span.content.into_owned(), convert_style(span.style)))
                .collect();
            Line::from(spans).style(style)
        })
        .collect();
    trim_blank_edges(&mut lines);
    lines
}

// Styled empty spans survive a plain `trim`, so edges are trimmed span by span.
pub fn trim_blank_edges(lines: &mut Vec<Line<'static>>) {
    while lines.first().is_some_and(is_blank_line) {
        lines.remove(0);
    }
    while lines.last().is_some_and(is_blank_line) {
        lines.pop();
    }

    if let Some(first) = lines.first_mut() {
        while first
            .spans
            .first()
            .is_some_and(|span| span.content.trim().is_empty())
        {
            first.spans.remove(0);
        }
        if let Some(span) = first.spans.first_mut() {
            span.content = span.content.trim_start().to_string().into();
        }
    }
    if let Some(last) = lines.last_mut() {
        while last
            .spans
            .last()
            .is_some_and(|span| span.content.trim().is_empty())
        {
            last.spans.pop();
        }
        if let Some(span) = last.spans.last_mut() {
            span.content = span.content.trim_end().to_string().into();
        }
    }
}

fn is_blank_line(line: &Line<'static>) -> bool {
    line.spans.iter().all(|span| span.content.trim().is_empty())
}

fn convert_style(style: core_style::Style) -> Style {
    let mut out = Style::default();
    if let Some(fg) = style.fg {
        out = out.fg(convert_color(fg));
    }
    if let Some(bg) = style.bg {
        out = out.bg(convert_color(bg));
    }
    out = out.add_modifier(Modifier::from_bits_truncate(style.add_modifier.bits()));
    out.remove_modifier(Modifier::from_bits_truncate(style.sub_modifier.bits()))
}

fn convert_color(color: core_style::Color) -> Color {
    match color {
        core_style::Color::Reset => Color::Reset,
        core_style::Color::Black => Color::Black,
        core_style::Color::Red => Color::Red,
        core_style::Color::Green => Color::Green,
        core_style::Color::Yellow => Color::Yellow,
        core_style::Color::Blue => Color::Blue,
        core_style::Color::Magenta => Color::Magenta,
        core_style::Color::Cyan => Color::Cyan,
        core_style::Color::Gray => Color::Gray,
        core_style::Color::DarkGray => Color::DarkGray,
        core_style::Color::LightRed => Color::LightRed,
        core_style::Color::LightGreen => Color::LightGreen,
        core_style::Color::LightYellow => Color::LightYellow,
        core_style::Color::LightBlue => Color::LightBlue,
        core_style::Color::LightMagenta => Color::LightMagenta,
        core_style::Color::LightCyan => Color::LightCyan,
        core_style::Color::White => Color::White,
        core_style::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
        core_style::Color::Indexed(idx) => Color::Indexed(idx),
    }
}
