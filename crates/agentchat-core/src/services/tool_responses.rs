use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{Message, MessageRole};

/// Messages whose id starts with this prefix are bookkeeping and never shown
pub const DO_NOT_RENDER_ID_PREFIX: &str = "do-not-render-";
pub const TOOL_HANDLED_CONTENT: &str = "Successfully handled tool call.";

pub fn is_hidden(message: &Message) -> bool {
    message
        .id
        .as_deref()
        .is_some_and(|id| id.starts_with(DO_NOT_RENDER_ID_PREFIX))
}

/// Synthetic tool responses for every AI tool call in `history` that no later
/// tool message answers. Only the new messages are returned, in call order.
pub fn ensure_tool_calls_have_responses(history: &[Message]) -> Vec<Message> {
    let mut responses = Vec::new();

    for (index, message) in history.iter().enumerate() {
        if message.role != MessageRole::Ai || message.tool_calls.is_empty() {
            continue;
        }

        let answered: HashSet<&str> = history[index + 1..]
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        for call in &message.tool_calls {
            let call_id = call.id.as_deref().unwrap_or_default();
            if !call_id.is_empty() && answered.contains(call_id) {
                continue;
            }
            let id = format!("{}{}", DO_NOT_RENDER_ID_PREFIX, Uuid::new_v4());
            responses.push(Message::tool(id, call_id, Some(call.name.as_str()), TOOL_HANDLED_CONTENT));
        }
    }

    responses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolCall;
    use serde_json::json;

    fn ai_with_calls(id: &str, calls: &[(&str, &str)]) -> Message {
        let mut message = Message::ai(id, "");
        message.tool_calls = calls
            .iter()
            .map(|(call_id, name)| ToolCall {
                id: Some(call_id.to_string()),
                name: name.to_string(),
                args: json!({}),
            })
            .collect();
        message
    }

    #[test]
    fn test_unanswered_calls_get_hidden_responses() {
        let history = vec![ai_with_calls("a1", &[("c1", "search"), ("c2", "render")])];

        let responses = ensure_tool_calls_have_responses(&history);

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].role, MessageRole::Tool);
        assert_eq!(responses[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(responses[0].name.as_deref(), Some("search"));
        assert_eq!(responses[0].text(), TOOL_HANDLED_CONTENT);
        assert!(responses.iter().all(is_hidden));
        assert_ne!(responses[0].id, responses[1].id);
    }

    #[test]
    fn test_answered_calls_are_left_alone() {
        let history = vec![
            ai_with_calls("a1", &[("c1", "search"), ("c2", "render")]),
            Message::tool("t1", "c1", Some("search"), "3 results"),
        ];

        let responses = ensure_tool_calls_have_responses(&history);

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].tool_call_id.as_deref(), Some("c2"));
    }

    #[test]
    fn test_earlier_tool_message_does_not_count() {
        let history = vec![
            Message::tool("t0", "c1", None, "stale"),
            ai_with_calls("a1", &[("c1", "search")]),
        ];
        assert_eq!(ensure_tool_calls_have_responses(&history).len(), 1);
    }

    #[test]
    fn test_plain_history_needs_nothing() {
        let history = vec![Message::ai("a1", "hello")];
        assert!(ensure_tool_calls_have_responses(&history).is_empty());
        assert!(!is_hidden(&history[0]));
    }
}
