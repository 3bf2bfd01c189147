use chrono::{DateTime, Utc};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Deserialize;

use crate::errors::UserError;
use crate::markdown;
use crate::theme::Theme;

pub const ARG_SUMMARY_BUDGET: usize = 48;
const ELLIPSIS: &str = "...";
const TOOL_BULLET: &str = "● ";
const RESULT_CONNECTOR: &str = "  ⎿ ";
const RESULT_INDENT: &str = "    ";
const MAX_RESULT_PREVIEW_LINES: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    UserText(String),
    AssistantText(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    SystemError(UserError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub invocation: ToolInvocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call_id: String,
    pub output: ToolOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ReadFile,
    WriteFile,
    EditFile,
    RunCommand,
    Search,
    ListFiles,
    Handoff,
}

impl ToolKind {
    pub fn verb(self) -> &'static str {
        match self {
            Self::ReadFile => "Read",
            Self::WriteFile => "Write",
            Self::EditFile => "Edit",
            Self::RunCommand => "Run",
            Self::Search => "Search",
            Self::ListFiles => "List",
            Self::Handoff => "Handoff",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tool", content = "input", rename_all = "snake_case")]
pub enum ToolInvocation {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        #[serde(default)]
        content: String,
    },
    EditFile {
        path: String,
    },
    RunCommand {
        command: String,
    },
    Search {
        pattern: String,
        #[serde(default)]
        path: Option<String>,
    },
    ListFiles {
        path: String,
    },
    Handoff {
        agent: String,
        #[serde(default)]
        message: String,
    },
}

impl ToolInvocation {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ReadFile { .. } => ToolKind::ReadFile,
            Self::WriteFile { .. } => ToolKind::WriteFile,
            Self::EditFile { .. } => ToolKind::EditFile,
            Self::RunCommand { .. } => ToolKind::RunCommand,
            Self::Search { .. } => ToolKind::Search,
            Self::ListFiles { .. } => ToolKind::ListFiles,
            Self::Handoff { .. } => ToolKind::Handoff,
        }
    }

    pub fn summary(&self) -> String {
        let args = match self {
            Self::ReadFile { path }
            | Self::WriteFile { path, .. }
            | Self::EditFile { path }
            | Self::ListFiles { path } => truncate_start(path, ARG_SUMMARY_BUDGET),
            Self::RunCommand { command } => {
                truncate_end(&single_line(command), ARG_SUMMARY_BUDGET)
            }
            Self::Search { pattern, path } => {
                let pattern = truncate_end(&single_line(pattern), ARG_SUMMARY_BUDGET);
                match path {
                    Some(path) if !path.trim().is_empty() => {
                        format!("{pattern}, in {}", truncate_start(path, ARG_SUMMARY_BUDGET))
                    }
                    _ => pattern,
                }
            }
            Self::Handoff { agent, .. } => truncate_end(agent, ARG_SUMMARY_BUDGET),
        };
        format!("{}({args})", self.kind().verb())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tool", content = "output", rename_all = "snake_case")]
pub enum ToolOutput {
    ReadFile {
        #[serde(default)]
        lines: usize,
    },
    WriteFile {
        #[serde(default)]
        bytes: u64,
    },
    EditFile {
        #[serde(default)]
        added: usize,
        #[serde(default)]
        removed: usize,
    },
    RunCommand {
        #[serde(default)]
        exit_code: i32,
        #[serde(default)]
        output: String,
    },
    Search {
        #[serde(default)]
        matches: usize,
    },
    ListFiles {
        #[serde(default)]
        entries: Vec<String>,
    },
    Handoff {
        agent: String,
    },
    #[serde(skip)]
    Failed { kind: ToolKind, message: String },
}

impl ConversationEntry {
    pub fn user(id: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            kind: EntryKind::UserText(text.into()),
        }
    }

    pub fn system_error(id: impl Into<String>, error: UserError, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            kind: EntryKind::SystemError(error),
        }
    }

    pub fn is_agent_content(&self) -> bool {
        matches!(
            self.kind,
            EntryKind::AssistantText(_) | EntryKind::ToolCall(_) | EntryKind::ToolResult(_)
        )
    }

    pub fn render(&self, theme: &Theme) -> Vec<Line<'static>> {
        match &self.kind {
            EntryKind::UserText(text) => render_user_text(text, theme),
            EntryKind::AssistantText(text) => {
                let lines = markdown::render(text);
                if lines.is_empty() {
                    vec![Line::from("")]
                } else {
                    lines
                }
            }
            EntryKind::ToolCall(call) => vec![Line::from(vec![
                Span::styled(TOOL_BULLET, Style::default().fg(theme.tool_fg)),
                Span::styled(
                    call.invocation.summary(),
                    Style::default()
                        .fg(theme.text_fg)
                        .add_modifier(Modifier::BOLD),
                ),
            ])],
            EntryKind::ToolResult(result) => render_tool_result(&result.output, theme),
            EntryKind::SystemError(error) => render_system_error(error, theme),
        }
    }
}

fn render_user_text(text: &str, theme: &Theme) -> Vec<Line<'static>> {
    let style = Style::default().fg(theme.user_fg);
    text.lines()
        .enumerate()
        .map(|(idx, line)| {
            let prefix = if idx == 0 { "› " } else { "  " };
            Line::from(vec![
                Span::styled(prefix, style.add_modifier(Modifier::BOLD)),
                Span::styled(line.to_string(), style),
            ])
        })
        .collect()
}

fn render_tool_result(output: &ToolOutput, theme: &Theme) -> Vec<Line<'static>> {
    let muted = Style::default().fg(theme.muted_fg);
    let connector = Span::styled(RESULT_CONNECTOR, muted);
    let headline = |text: String, style: Style| Line::from(vec![connector.clone(), Span::styled(text, style)]);

    match output {
        ToolOutput::ReadFile { lines } => vec![headline(
            format!("Read {lines} {}", plural(*lines, "line", "lines")),
            muted,
        )],
        ToolOutput::WriteFile { bytes } => {
            vec![headline(format!("Wrote {bytes} bytes"), muted)]
        }
        ToolOutput::EditFile { added, removed } => vec![Line::from(vec![
            connector.clone(),
            Span::styled(format!("+{added}"), Style::default().fg(theme.user_fg)),
            Span::raw(" "),
            Span::styled(format!("-{removed}"), Style::default().fg(theme.error_fg)),
        ])],
        ToolOutput::RunCommand { exit_code, output } => {
            let style = if *exit_code == 0 {
                muted
            } else {
                Style::default().fg(theme.error_fg)
            };
            let mut lines = vec![headline(format!("Exit code {exit_code}"), style)];
            lines.extend(preview_lines(output.lines(), muted));
            lines
        }
        ToolOutput::Search { matches } => vec![headline(
            format!("Found {matches} {}", plural(*matches, "match", "matches")),
            muted,
        )],
        ToolOutput::ListFiles { entries } => {
            let mut lines = vec![headline(
                format!(
                    "Listed {} {}",
                    entries.len(),
                    plural(entries.len(), "entry", "entries")
                ),
                muted,
            )];
            lines.extend(preview_lines(entries.iter().map(String::as_str), muted));
            lines
        }
        ToolOutput::Handoff { agent } => {
            vec![headline(format!("Handed off to {agent}"), muted)]
        }
        ToolOutput::Failed { kind, message } => vec![headline(
            format!("{} failed: {}", kind.verb(), single_line(message)),
            Style::default().fg(theme.error_fg),
        )],
    }
}

fn preview_lines<'a>(lines: impl Iterator<Item = &'a str>, style: Style) -> Vec<Line<'static>> {
    let all: Vec<&str> = lines.filter(|line| !line.trim().is_empty()).collect();
    let mut out: Vec<Line<'static>> = all
        .iter()
        .take(MAX_RESULT_PREVIEW_LINES)
        .map(|line| Line::from(Span::styled(format!("{RESULT_INDENT}{line}"), style)))
        .collect();
    let hidden = all.len().saturating_sub(MAX_RESULT_PREVIEW_LINES);
    if hidden > 0 {
        out.push(Line::from(Span::styled(
            format!("{RESULT_INDENT}… {hidden} more {}", plural(hidden, "line", "lines")),
            style.add_modifier(Modifier::DIM),
        )));
    }
    out
}

fn render_system_error(error: &UserError, theme: &Theme) -> Vec<Line<'static>> {
    let style = Style::default().fg(theme.error_fg);
    let mut lines = vec![Line::from(vec![
        Span::styled("✗ ", style.add_modifier(Modifier::BOLD)),
        Span::styled(error.message.clone(), style),
    ])];
    for hint in &error.hints {
        lines.push(Line::from(Span::styled(
            format!("  {hint}"),
            Style::default().fg(theme.muted_fg),
        )));
    }
    lines
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_end(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    // Budgets too small for the ellipsis cut without one.
    if budget <= ELLIPSIS.len() {
        return text.chars().take(budget).collect();
    }
    let keep = budget - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn truncate_start(text: &str, budget: usize) -> String {
    let count = text.chars().count();
    if count <= budget {
        return text.to_string();
    }
    if budget <= ELLIPSIS.len() {
        return text.chars().skip(count - budget).collect();
    }
    let keep = budget - ELLIPSIS.len();
    let tail: String = text.chars().skip(count - keep).collect();
    format!("{ELLIPSIS}{tail}")
}

#[cfg(test)]
#[path = "../tests/unit/conversation_tests.rs"]
mod tests;
