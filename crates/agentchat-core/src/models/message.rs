use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::attachment::AttachmentBlock;

/// Who authored a message, as named by the agent service (`type` field).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Ai,
    Tool,
    System,
    #[serde(other)]
    Other,
}

/// A tool invocation requested by an AI message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// One element of a multi-part message.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentPart {
    Text { text: String },
    Attachment(AttachmentBlock),
    /// Anything the client does not model, kept verbatim
    Other(Value),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Plain text parts and CSV-derived blocks both count as text-kind.
    pub fn is_text_kind(&self) -> bool {
        match self {
            ContentPart::Text { .. } => true,
            ContentPart::Attachment(block) => block.is_text_kind(),
            ContentPart::Other(_) => false,
        }
    }
}

impl Serialize for ContentPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentPart::Text { text } => json!({"type": "text", "text": text}).serialize(serializer),
            ContentPart::Attachment(block) => block.serialize(serializer),
            ContentPart::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;

        if let Ok(block) = AttachmentBlock::deserialize(&value) {
            return Ok(ContentPart::Attachment(block));
        }

        if value.get("type").and_then(Value::as_str) == Some("text")
            && let Some(text) = value.get("text").and_then(Value::as_str)
        {
            return Ok(ContentPart::Text {
                text: text.to_string(),
            });
        }

        Ok(ContentPart::Other(value))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Plain text of the message: the string itself, or the text parts
    /// joined by a space. Attachments contribute nothing.
    pub fn plain_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn attachments(&self) -> Vec<&AttachmentBlock> {
        match self {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Attachment(block) => Some(block),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// A chat message in the agent service's wire format.
///
/// Fields the client does not interpret (`additional_kwargs`,
/// `response_metadata`, ...) are kept in `extra` so messages survive a
/// round-trip through local state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub role: MessageRole,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: MessageRole, id: Option<String>, content: MessageContent) -> Self {
        Self {
            id,
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            extra: Map::new(),
        }
    }

    pub fn human(id: impl Into<String>, content: MessageContent) -> Self {
        Self::new(MessageRole::Human, Some(id.into()), content)
    }

    pub fn ai(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, Some(id.into()), MessageContent::Text(text.into()))
    }

    pub fn tool(id: impl Into<String>, tool_call_id: &str, name: Option<&str>, text: &str) -> Self {
        let mut message = Self::new(MessageRole::Tool, Some(id.into()), MessageContent::Text(text.to_string()));
        message.tool_call_id = Some(tool_call_id.to_string());
        message.name = name.map(str::to_string);
        message
    }

    pub fn is_human(&self) -> bool {
        self.role == MessageRole::Human
    }

    pub fn text(&self) -> String {
        self.content.plain_text()
    }
}
