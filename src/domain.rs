use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::conversation::{
    ConversationEntry, EntryKind, ToolCall, ToolInvocation, ToolKind, ToolOutput, ToolResult,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub phase: TaskPhase,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<TaskMessage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    #[default]
    Awaiting,
    Running,
    Suspended,
}

impl TaskPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Awaiting => "awaiting",
            Self::Running => "running",
            Self::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost: f64,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_read_tokens)
            .saturating_add(self.cache_write_tokens)
    }

    pub fn context_percent(&self, context_window: u64) -> u8 {
        if context_window == 0 {
            return 0;
        }
        let percent = self.total_tokens().saturating_mul(100) / context_window;
        percent.min(100) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub context_window: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub phase: TaskPhase,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "known_parts")]
    pub parts: Vec<IndexedPart>,
}

// `index` is the position in the wire array, stable across refetches even
// when neighbouring parts fail to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPart {
    pub index: usize,
    pub part: MessagePart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl TaskMessage {
    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.parts
            .iter()
            .filter_map(|IndexedPart { index, part }| {
                let positional_id = format!("{}/{index}", self.id);
                let (id, kind) = match part {
                    MessagePart::Text(text) if text.trim().is_empty() => return None,
                    MessagePart::Text(text) => match self.role {
                        MessageRole::User => (positional_id, EntryKind::UserText(text.clone())),
                        _ => (positional_id, EntryKind::AssistantText(text.clone())),
                    },
                    MessagePart::ToolCall(call) => {
                        let id = if call.id.is_empty() {
                            positional_id
                        } else {
                            call.id.clone()
                        };
                        (id, EntryKind::ToolCall(call.clone()))
                    }
                    MessagePart::ToolResult(result) => {
                        (positional_id, EntryKind::ToolResult(result.clone()))
                    }
                };
                Some(ConversationEntry {
                    id,
                    created_at: self.created_at,
                    kind,
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct WirePart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    call_id: String,
    #[serde(default)]
    tool: String,
    #[serde(default)]
    input: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

fn known_parts<'de, D>(deserializer: D) -> Result<Vec<IndexedPart>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| parse_part(value).map(|part| IndexedPart { index, part }))
        .collect())
}

fn parse_part(value: Value) -> Option<MessagePart> {
    let part = match serde_json::from_value::<WirePart>(value) {
        Ok(part) => part,
        Err(err) => {
            tracing::debug!(error = %err, "dropping malformed message part");
            return None;
        }
    };
    let parsed = match part.kind.as_str() {
        "text" => Some(MessagePart::Text(part.text)),
        "tool_call" => parse_invocation(&part.tool, part.input).map(|invocation| {
            MessagePart::ToolCall(ToolCall {
                id: part.id,
                invocation,
            })
        }),
        "tool_result" => {
            parse_output(&part.tool, part.output, part.error).map(|output| {
                MessagePart::ToolResult(ToolResult {
                    call_id: part.call_id,
                    output,
                })
            })
        }
        _ => None,
    };
    if parsed.is_none() {
        tracing::debug!(kind = %part.kind, tool = %part.tool, "dropping unknown message part");
    }
    parsed
}

fn parse_invocation(tool: &str, input: Option<Value>) -> Option<ToolInvocation> {
    let input = input.unwrap_or_else(|| json!({}));
    serde_json::from_value(json!({ "tool": tool, "input": input })).ok()
}

fn parse_output(tool: &str, output: Option<Value>, error: Option<String>) -> Option<ToolOutput> {
    if let Some(message) = error {
        let kind = serde_json::from_value::<ToolKind>(Value::String(tool.to_string())).ok()?;
        return Some(ToolOutput::Failed { kind, message });
    }
    let output = output.unwrap_or_else(|| json!({}));
    serde_json::from_value(json!({ "tool": tool, "output": output })).ok()
}
