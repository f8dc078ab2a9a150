use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::Message;
use super::ui_message::UiMessage;

pub const UNTITLED_THREAD: &str = "Untitled chat";
pub const NEW_CHAT_TITLE: &str = "New Chat";
const MESSAGE_TITLE_CHARS: usize = 50;

/// A server-side conversation. `metadata.title` is authoritative once set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Some servers include the latest values in search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

impl Thread {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            metadata: Map::new(),
            created_at: None,
            updated_at: None,
            status: None,
            values: None,
        }
    }

    /// Stored title, trimmed, if there is a non-blank one
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn set_title(&mut self, title: &str) {
        self.metadata
            .insert("title".to_string(), Value::String(title.to_string()));
    }

    /// Title shown in thread lists.
    ///
    /// Falls back to a title derived from the messages embedded in `values`
    /// when the server sent any, then to [`UNTITLED_THREAD`].
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title() {
            return title.to_string();
        }
        match self.embedded_messages() {
            Some(messages) if !messages.is_empty() => title_from_messages(&messages),
            _ => UNTITLED_THREAD.to_string(),
        }
    }

    fn embedded_messages(&self) -> Option<Vec<Message>> {
        let values = self.values.as_ref()?;
        let messages = match values {
            Value::Array(items) => items.iter().find_map(|v| v.get("messages"))?,
            other => other.get("messages")?,
        };
        serde_json::from_value(messages.clone()).ok()
    }
}

/// Derive a short title from the first human message: its text cut to 50
/// characters with a trailing ellipsis, or "New Chat".
pub fn title_from_messages(messages: &[Message]) -> String {
    let text = messages
        .iter()
        .find(|m| m.is_human())
        .map(|m| m.text().trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return NEW_CHAT_TITLE.to_string();
    }
    if text.chars().count() > MESSAGE_TITLE_CHARS {
        let cut: String = text.chars().take(MESSAGE_TITLE_CHARS).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl AgentOutcome {
    pub fn is_finish(&self) -> bool {
        self.kind == "AgentFinish"
    }
}

/// Graph state carried by `values` stream events and thread state loads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadValues {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub ui: Vec<UiMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_outcome: Option<AgentOutcome>,
}

impl ThreadValues {
    pub fn is_finished(&self) -> bool {
        self.agent_outcome.as_ref().is_some_and(AgentOutcome::is_finish)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    #[serde(default)]
    pub values: ThreadValues,
}
