use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::{Message, MessageContent, MessageRole};
use crate::settings::models::MessageFilterConfig;

/// Messages of history forwarded to the backend
const BACKEND_HISTORY_LIMIT: usize = 20;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Why a message was annotated. Filtering never blocks a send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterReason {
    TooShort { min: usize },
    Truncated { max: usize },
    BlockedKeywords,
    Sanitized,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min } => write!(f, "Too short (min: {})", min),
            Self::Truncated { max } => write!(f, "Truncated (max: {})", max),
            Self::BlockedKeywords => write!(f, "Contains blocked keywords"),
            Self::Sanitized => write!(f, "Content sanitized"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterMetadata {
    /// Length of the input in characters
    pub original_length: usize,
    pub filtered: bool,
    pub filter_reasons: Option<Vec<FilterReason>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilteredMessage {
    pub content: String,
    pub metadata: FilterMetadata,
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '_'
        || c.is_whitespace()
        || matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '(' | ')' | '-' | '^')
        || ('\u{00C0}'..='\u{017F}').contains(&c)
        || ('\u{1EA0}'..='\u{1EF9}').contains(&c)
}

/// Drop disallowed characters, then collapse whitespace runs and trim.
/// Applying it twice gives the same result as applying it once.
pub fn sanitize(content: &str) -> String {
    let kept: String = content.chars().filter(|c| is_allowed_char(*c)).collect();
    WHITESPACE_RUN.replace_all(&kept, " ").trim().to_string()
}

pub struct MessageFilter {
    config: MessageFilterConfig,
}

impl MessageFilter {
    pub fn new(config: MessageFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MessageFilterConfig {
        &self.config
    }

    pub fn update(&mut self, config: MessageFilterConfig) {
        self.config = config;
    }

    pub fn filter_message(&self, content: &str) -> FilteredMessage {
        let original_length = content.chars().count();
        let mut reasons = Vec::new();
        let mut processed = content.to_string();

        if self.config.min_length > 0 && original_length < self.config.min_length {
            reasons.push(FilterReason::TooShort {
                min: self.config.min_length,
            });
        }

        if self.config.max_length > 0 && original_length > self.config.max_length {
            processed = content.chars().take(self.config.max_length).collect();
            reasons.push(FilterReason::Truncated {
                max: self.config.max_length,
            });
        }

        let lowered = content.to_lowercase();
        if self
            .config
            .blocked_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| lowered.contains(&k.to_lowercase()))
        {
            reasons.push(FilterReason::BlockedKeywords);
        }

        if self.config.enable_content_sanitization {
            let sanitized = sanitize(&processed);
            if sanitized != processed {
                processed = sanitized;
                reasons.push(FilterReason::Sanitized);
            }
        }

        if !reasons.is_empty() {
            debug!(original_length, reasons = ?reasons, "Outgoing message filtered");
        }

        FilteredMessage {
            content: processed,
            metadata: FilterMetadata {
                original_length,
                filtered: !reasons.is_empty(),
                filter_reasons: (!reasons.is_empty()).then_some(reasons),
            },
        }
    }

    /// Human and AI messages only, plain-string contents filtered, last 20.
    pub fn filter_messages_for_backend(&self, messages: &[Message]) -> Vec<Message> {
        let kept: Vec<Message> = messages
            .iter()
            .filter(|m| matches!(m.role, MessageRole::Human | MessageRole::Ai))
            .map(|m| match &m.content {
                MessageContent::Text(text) => Message {
                    content: MessageContent::Text(self.filter_message(text).content),
                    ..m.clone()
                },
                MessageContent::Parts(_) => m.clone(),
            })
            .collect();

        let skip = kept.len().saturating_sub(BACKEND_HISTORY_LIMIT);
        kept.into_iter().skip(skip).collect()
    }
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self::new(MessageFilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> MessageFilter {
        MessageFilter::default()
    }

    #[test]
    fn test_clean_text_passes_untouched() {
        let result = filter().filter_message("Xin chào, bạn khỏe không?");

        assert_eq!(result.content, "Xin chào, bạn khỏe không?");
        assert!(!result.metadata.filtered);
        assert_eq!(result.metadata.filter_reasons, None);
    }

    #[test]
    fn test_original_length_counts_characters() {
        for text in ["", "abc", "tiếng việt", "  spaced   out  ", "emoji 🚀 here"] {
            let result = filter().filter_message(text);
            assert_eq!(result.metadata.original_length, text.chars().count());
        }
    }

    #[test]
    fn test_empty_is_too_short_but_not_blocked() {
        let result = filter().filter_message("");
        assert_eq!(result.metadata.filter_reasons, Some(vec![FilterReason::TooShort { min: 1 }]));
        assert_eq!(result.content, "");
    }

    #[test]
    fn test_truncation_then_sanitization_order() {
        let filter = MessageFilter::new(MessageFilterConfig {
            max_length: 5,
            ..MessageFilterConfig::default()
        });
        let result = filter.filter_message("ab  cd#efgh");

        assert_eq!(result.content, "ab c");
        assert_eq!(
            result.metadata.filter_reasons,
            Some(vec![FilterReason::Truncated { max: 5 }, FilterReason::Sanitized])
        );
    }

    #[test]
    fn test_blocked_keywords_case_insensitive() {
        let filter = MessageFilter::new(MessageFilterConfig {
            blocked_keywords: vec!["Secret".into(), String::new()],
            ..MessageFilterConfig::default()
        });

        let hit = filter.filter_message("my SECRET plan");
        assert_eq!(hit.metadata.filter_reasons, Some(vec![FilterReason::BlockedKeywords]));
        assert_eq!(hit.content, "my SECRET plan");

        assert!(!filter.filter_message("harmless").metadata.filtered);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for text in ["a @ b", "  hi\t\tthere  ", "giá 100$ #sale ☺ ok", "中文 text", "(x) - y^2!"] {
            let once = filter().filter_message(text);
            let twice = filter().filter_message(&once.content);

            assert_eq!(twice.content, once.content, "input: {text}");
            assert!(
                !twice
                    .metadata
                    .filter_reasons
                    .unwrap_or_default()
                    .contains(&FilterReason::Sanitized)
            );
        }
    }

    #[test]
    fn test_sanitize_keeps_vietnamese_and_punctuation() {
        assert_eq!(sanitize("Đặt vé: Hà Nội -> Huế?"), "Đặt vé: Hà Nội - Huế?");
        assert_eq!(sanitize("a @ b"), "a b");
    }

    #[test]
    fn test_sanitization_can_be_disabled() {
        let filter = MessageFilter::new(MessageFilterConfig {
            enable_content_sanitization: false,
            ..MessageFilterConfig::default()
        });
        assert_eq!(filter.filter_message("a  @  b").content, "a  @  b");
    }

    #[test]
    fn test_history_for_backend() {
        let mut messages = vec![Message::tool("t0", "call", None, "result")];
        for i in 0..25 {
            messages.push(Message::human(format!("h{i}"), MessageContent::Text(format!("msg  {i}"))));
        }

        let kept = filter().filter_messages_for_backend(&messages);

        assert_eq!(kept.len(), 20);
        assert_eq!(kept[0].id.as_deref(), Some("h5"));
        assert_eq!(kept[0].text(), "msg 5");
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(FilterReason::TooShort { min: 1 }.to_string(), "Too short (min: 1)");
        assert_eq!(FilterReason::Sanitized.to_string(), "Content sanitized");
    }
}
