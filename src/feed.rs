use ratatui::text::Line;

use crate::conversation::ConversationEntry;
use crate::text_layout::wrap_line;
use crate::theme::Theme;

// `lines` holds only the visible window; `top` indexes into the full layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub lines: Vec<Line<'static>>,
    pub top: usize,
    pub max_scroll: usize,
}

pub fn layout_lines(entries: &[ConversationEntry], theme: &Theme, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::default());
        }
        for line in entry.render(theme) {
            lines.extend(wrap_line(&line, width));
        }
    }
    lines
}

// `scroll_from_bottom` of 0 pins the view to the newest line.
pub fn view_of(lines: &[Line<'static>], height: u16, scroll_from_bottom: usize) -> FeedView {
    let height = usize::from(height);
    let max_scroll = lines.len().saturating_sub(height);
    let top = max_scroll - scroll_from_bottom.min(max_scroll);
    let bottom = top.saturating_add(height).min(lines.len());
    FeedView {
        lines: lines[top..bottom].to_vec(),
        top,
        max_scroll,
    }
}
