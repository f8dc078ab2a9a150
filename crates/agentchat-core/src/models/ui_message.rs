//! Generative UI elements pushed by the agent through `custom` stream events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl UiMessage {
    fn wants_merge(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("merge"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UiEvent {
    #[serde(rename = "ui")]
    Upsert(UiMessage),
    #[serde(rename = "remove-ui")]
    Remove { id: String },
}

/// Fold one event into the accumulated UI list.
///
/// An upsert for a known id replaces the element in place, or merges its
/// props over the previous ones when `metadata.merge` is true. Unknown ids
/// are appended.
pub fn reduce_ui(state: &mut Vec<UiMessage>, event: UiEvent) {
    match event {
        UiEvent::Upsert(incoming) => match state.iter_mut().find(|m| m.id == incoming.id) {
            Some(existing) if incoming.wants_merge() => {
                let mut props = std::mem::take(&mut existing.props);
                props.extend(incoming.props);
                *existing = UiMessage { props, ..incoming };
            }
            Some(existing) => *existing = incoming,
            None => state.push(incoming),
        },
        UiEvent::Remove { id } => state.retain(|m| m.id != id),
    }
}
