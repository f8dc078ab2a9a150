use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::message_filter::{FilterMetadata, MessageFilter};
use super::tool_responses::ensure_tool_calls_have_responses;
use crate::models::{AttachmentBlock, ContentPart, Message, MessageContent};
use crate::settings::models::{ClientConfig, MessageFilterConfig};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ComposeRejection {
    #[error("Nothing to send")]
    EmptyInput,

    #[error("A message is already being sent")]
    SendInFlight,
}

/// Messages to append for one user turn
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedTurn {
    /// Synthetic answers to dangling tool calls, sent before `message`
    pub tool_responses: Vec<Message>,
    pub message: Message,
    /// Filter annotations for the text part, when there was text
    pub filter: Option<FilterMetadata>,
}

impl ComposedTurn {
    /// All messages of the turn in submission order
    pub fn into_messages(self) -> Vec<Message> {
        let mut messages = self.tool_responses;
        messages.push(self.message);
        messages
    }
}

pub struct MessageComposer {
    filter: MessageFilter,
    attachment_prompt: String,
}

impl MessageComposer {
    pub fn new(filter_config: MessageFilterConfig, attachment_prompt: impl Into<String>) -> Self {
        Self {
            filter: MessageFilter::new(filter_config),
            attachment_prompt: attachment_prompt.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.filter.clone(), config.attachment_prompt.clone())
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    pub fn update_filter(&mut self, config: MessageFilterConfig) {
        self.filter.update(config);
    }

    /// Filtered text to send. Falls back to the trimmed input when
    /// sanitisation leaves nothing.
    fn outgoing_text(&self, text: &str) -> Option<(String, FilterMetadata)> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let filtered = self.filter.filter_message(trimmed);
        let content = if filtered.content.trim().is_empty() {
            trimmed.to_string()
        } else {
            filtered.content
        };
        Some((content, filtered.metadata))
    }

    fn build_content(&self, text: Option<String>, attachments: Vec<AttachmentBlock>) -> MessageContent {
        match (text, attachments.is_empty()) {
            (Some(text), true) => MessageContent::Text(text),
            (Some(text), false) => {
                let mut parts = vec![ContentPart::text(text)];
                parts.extend(attachments.into_iter().map(ContentPart::Attachment));
                MessageContent::Parts(parts)
            }
            (None, _) => {
                let mut parts: Vec<ContentPart> = attachments.into_iter().map(ContentPart::Attachment).collect();
                if !parts.iter().any(ContentPart::is_text_kind) {
                    parts.insert(0, ContentPart::text(self.attachment_prompt.clone()));
                }
                MessageContent::Parts(parts)
            }
        }
    }

    /// Build the messages for a new user turn.
    pub fn compose(
        &self,
        text: &str,
        attachments: Vec<AttachmentBlock>,
        history: &[Message],
        in_flight: bool,
    ) -> Result<ComposedTurn, ComposeRejection> {
        if in_flight {
            return Err(ComposeRejection::SendInFlight);
        }

        let outgoing = self.outgoing_text(text);
        if outgoing.is_none() && attachments.is_empty() {
            return Err(ComposeRejection::EmptyInput);
        }

        let (text, filter) = match outgoing {
            Some((text, metadata)) => (Some(text), Some(metadata)),
            None => (None, None),
        };
        let message = Message::human(Uuid::new_v4().to_string(), self.build_content(text, attachments));
        let tool_responses = ensure_tool_calls_have_responses(history);

        debug!(
            message_id = ?message.id,
            tool_responses = tool_responses.len(),
            "Composed outgoing message"
        );

        Ok(ComposedTurn {
            tool_responses,
            message,
            filter,
        })
    }

    /// Replacement for an edited human message. Keeps the original id and
    /// its attachments; only the text changes.
    pub fn compose_edit(&self, original: &Message, text: &str) -> Result<Message, ComposeRejection> {
        let attachments: Vec<AttachmentBlock> = original.content.attachments().into_iter().cloned().collect();
        let outgoing = self.outgoing_text(text).map(|(text, _)| text);
        if outgoing.is_none() && attachments.is_empty() {
            return Err(ComposeRejection::EmptyInput);
        }

        Ok(Message {
            content: self.build_content(outgoing, attachments),
            ..original.clone()
        })
    }
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}
