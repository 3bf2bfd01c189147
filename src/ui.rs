use std::path::Path;

use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Padding, Paragraph};

use crate::domain::TaskSummary;
use crate::selection::SelectionTable;
use crate::session::{
    FEED_HORIZONTAL_PADDING, FOOTER_HEIGHT, HEADER_HEIGHT, INPUT_BOX_HEIGHT, SessionState, UiMode,
};
use crate::text_layout::input_window;
use crate::theme::Theme;

const TEXT_PADDING: u16 = 1;
const FOOTER_HELP_TEXT: &str =
    "Enter send | Tab agent | Esc suspend | PgUp/PgDn scroll | F1 help | Ctrl+C twice quit";
const PICKER_HELP_TEXT: &str = "(Up/Down select, Enter open, Esc cancel)";
const HELP_BINDINGS: [(&str, &str); 9] = [
    ("Enter", "Send the message"),
    ("Tab", "Switch to the next agent"),
    ("Esc", "Suspend the running task"),
    ("PgUp / Ctrl+U", "Scroll the feed up half a page"),
    ("PgDn / Ctrl+D", "Scroll the feed down half a page"),
    ("Up / Down", "Scroll the feed one line"),
    ("Home / End", "Jump within the input"),
    ("Ctrl+C", "Clear input, press twice to quit"),
    ("F1", "Toggle this help"),
];

pub fn render(frame: &mut Frame, state: &SessionState) {
    let theme = state.theme();
    let [header, feed, input, footer] = Layout::vertical([
        Constraint::Length(HEADER_HEIGHT),
        Constraint::Min(0),
        Constraint::Length(INPUT_BOX_HEIGHT),
        Constraint::Length(FOOTER_HEIGHT),
    ])
    .areas(frame.area());

    render_header(frame, header, state, theme);
    render_feed(frame, feed, state, theme);
    render_input(frame, input, state, theme);
    frame.render_widget(
        Paragraph::new(FOOTER_HELP_TEXT).style(Style::default().bg(theme.header_bg).fg(theme.muted_fg)),
        footer,
    );

    if state.mode() == UiMode::Help {
        render_help_overlay(frame, theme);
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &SessionState, theme: &Theme) {
    let task = state.task();
    let muted = Style::default().fg(theme.muted_fg);
    let home = dirs::home_dir();

    let mut status = vec![
        Span::styled(
            abbreviate_home(&task.workspace, home.as_deref()),
            Style::default()
                .fg(theme.text_fg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" | ", muted),
        Span::styled(task.phase.label(), Style::default().fg(theme.accent_fg)),
    ];
    if let Some(frame_symbol) = state.spinner_frame() {
        status.push(Span::raw(" "));
        status.push(Span::styled(
            format!("{frame_symbol} working"),
            Style::default().fg(theme.tool_fg),
        ));
    }

    let usage = task.usage;
    let model_name = state
        .model_info()
        .map(|info| info.name.clone())
        .unwrap_or_else(|| "loading model...".to_string());
    let context = state
        .context_percent()
        .map(|percent| format!("ctx {percent}%"))
        .unwrap_or_else(|| "ctx --".to_string());
    let agents = state.agents();
    let mut details = vec![Span::styled(
        state.agent().name.clone(),
        Style::default().fg(theme.user_fg).add_modifier(Modifier::BOLD),
    )];
    if agents.len() > 1
        && let Some(position) = agents.iter().position(|agent| agent.id == state.agent().id)
    {
        details.push(Span::styled(
            format!(" ({}/{})", position + 1, agents.len()),
            muted,
        ));
    }
    details.extend([
        Span::styled(" | ", muted),
        Span::styled(model_name, Style::default().fg(theme.text_fg)),
        Span::styled(" | ", muted),
        Span::styled(context, muted),
        Span::styled(
            format!(
                " | in {} out {} | cache r {} w {} | ${:.4}",
                format_tokens(usage.input_tokens),
                format_tokens(usage.output_tokens),
                format_tokens(usage.cache_read_tokens),
                format_tokens(usage.cache_write_tokens),
                usage.cost
            ),
            muted,
        ),
    ]);

    frame.render_widget(
        Paragraph::new(vec![Line::from(status), Line::from(details)]).block(
            Block::default()
                .style(Style::default().bg(theme.header_bg))
                .padding(Padding::new(TEXT_PADDING, TEXT_PADDING, 0, 1)),
        ),
        area,
    );
}

fn render_feed(frame: &mut Frame, area: Rect, state: &SessionState, theme: &Theme) {
    let view = state.feed_view();
    let hidden_below = view.max_scroll - view.top;
    frame.render_widget(
        Paragraph::new(view.lines)
            .style(Style::default().fg(theme.text_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.feed_bg))
                    .padding(Padding::horizontal(FEED_HORIZONTAL_PADDING)),
            ),
        area,
    );

    // Drawn over the last feed row so the content keeps its full height.
    if hidden_below > 0 && area.height > 0 {
        let hint_row = Rect::new(area.x, area.bottom() - 1, area.width, 1);
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(" {hidden_below} more below "),
                Style::default().fg(theme.muted_fg).bg(theme.header_bg),
            )))
            .right_aligned(),
            hint_row,
        );
    }
}

fn render_input(frame: &mut Frame, area: Rect, state: &SessionState, theme: &Theme) {
    let text_width = area.width.saturating_sub(TEXT_PADDING * 2).max(1);
    let window = input_window(state.input(), state.cursor(), text_width);
    let placeholder = state.input().is_empty();
    let text = if placeholder {
        Span::styled("Message the agent...", Style::default().fg(theme.muted_fg))
    } else {
        Span::styled(window.visible, Style::default().fg(theme.text_fg))
    };
    frame.render_widget(
        Paragraph::new(Line::from(text)).block(
            Block::default()
                .style(Style::default().bg(theme.input_bg))
                .padding(Padding::uniform(TEXT_PADDING)),
        ),
        area,
    );

    if state.mode() == UiMode::Input && area.height > TEXT_PADDING {
        frame.set_cursor_position((
            area.x + TEXT_PADDING + window.cursor_col,
            area.y + TEXT_PADDING,
        ));
    }
}

fn render_help_overlay(frame: &mut Frame, theme: &Theme) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Key Bindings",
            Style::default()
                .fg(theme.accent_fg)
                .add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    for (keys, description) in HELP_BINDINGS {
        lines.push(Line::from(vec![
            Span::styled(format!("{keys:<15}"), Style::default().fg(theme.text_fg)),
            Span::styled(description, Style::default().fg(theme.muted_fg)),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(theme.muted_fg),
    )));

    let height = (lines.len() as u16).saturating_add(TEXT_PADDING * 2);
    let overlay = centered(frame.area(), 56, height);
    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .style(Style::default().bg(theme.input_bg))
                .padding(Padding::uniform(TEXT_PADDING)),
        ),
        overlay,
    );
}

pub fn picker_rows(screen_height: u16) -> usize {
    screen_height.saturating_sub(8).max(3) as usize
}

pub fn render_picker(frame: &mut Frame, table: &SelectionTable<TaskSummary>, theme: &Theme) {
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.feed_bg)),
        frame.area(),
    );
    let entries = table.items();
    let home = dirs::home_dir();
    let shown_count = entries.len().clamp(1, picker_rows(frame.area().height));
    let height = (shown_count as u16).saturating_add(4);
    let overlay = centered(frame.area(), 90, height);
    let start = table.window_start(shown_count);

    let mut lines = Vec::with_capacity(shown_count + 1);
    lines.push(Line::from(vec![
        Span::styled(
            "Open Task",
            Style::default()
                .fg(theme.accent_fg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(PICKER_HELP_TEXT, Style::default().fg(theme.muted_fg)),
    ]));
    for (idx, item) in entries.iter().enumerate().skip(start).take(shown_count) {
        let selected = idx == table.selected();
        let style = if selected {
            Style::default()
                .fg(theme.accent_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text_fg)
        };
        let title = if item.title.trim().is_empty() {
            item.id.as_str()
        } else {
            item.title.as_str()
        };
        let when = item
            .updated_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        lines.push(Line::from(vec![
            Span::styled(
                if selected { ">" } else { " " },
                Style::default().fg(theme.muted_fg),
            ),
            Span::raw(" "),
            Span::styled(title.to_string(), style),
            Span::raw(" "),
            Span::styled(
                format!(
                    "({when} | {} | {})",
                    item.phase.label(),
                    abbreviate_home(&item.workspace, home.as_deref())
                ),
                Style::default().fg(theme.muted_fg),
            ),
        ]));
    }

    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .style(Style::default().bg(theme.input_bg))
                .padding(Padding::uniform(TEXT_PADDING)),
        ),
        overlay,
    );
}

fn centered(area: Rect, max_width: u16, height: u16) -> Rect {
    let width = area.width.min(max_width);
    let height = height.min(area.height);
    let x = area.x.saturating_add(area.width.saturating_sub(width) / 2);
    let y = area.y.saturating_add(area.height.saturating_sub(height) / 2);
    Rect::new(x, y, width, height)
}

pub fn abbreviate_home(path: &str, home: Option<&Path>) -> String {
    let Some(home) = home.and_then(|home| home.to_str()) else {
        return path.to_string();
    };
    let home = home.trim_end_matches('/');
    if home.is_empty() {
        return path.to_string();
    }
    if path == home {
        return "~".to_string();
    }
    match path.strip_prefix(home) {
        Some(rest) if rest.starts_with('/') => format!("~{rest}"),
        _ => path.to_string(),
    }
}

fn format_tokens(count: u64) -> String {
    if count < 1_000 {
        count.to_string()
    } else if count < 1_000_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    }
}

#[cfg(test)]
#[path = "../tests/unit/ui_tests.rs"]
mod tests;
