use serde::{Deserialize, Serialize};

/// Rules applied to outgoing text before it is sent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFilterConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub blocked_keywords: Vec<String>,
    pub enable_content_sanitization: bool,
}

impl Default for MessageFilterConfig {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 4000,
            blocked_keywords: Vec::new(),
            enable_content_sanitization: true,
        }
    }
}

/// One way of producing a thread title, tried in configured order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleStrategy {
    Remote,
    PatternCategory,
    Keywords,
    Snippet,
    Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    pub enabled: bool,
    pub max_length: usize,
    /// `{{timestamp}}` is replaced with the local time
    pub fallback_template: String,
    pub use_remote: bool,
    pub keyword_limit: usize,
    pub cache_ttl_secs: u64,
    pub strategies: Vec<TitleStrategy>,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 50,
            fallback_template: "Chat {{timestamp}}".to_string(),
            use_remote: true,
            keyword_limit: 3,
            cache_ttl_secs: 24 * 60 * 60,
            strategies: vec![
                TitleStrategy::Remote,
                TitleStrategy::PatternCategory,
                TitleStrategy::Keywords,
                TitleStrategy::Snippet,
                TitleStrategy::Timestamp,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: TitleConfig = serde_json::from_str(r#"{"max_length": 30, "use_remote": false}"#).unwrap();

        assert_eq!(config.max_length, 30);
        assert!(!config.use_remote);
        assert_eq!(config.keyword_limit, 3);
        assert_eq!(config.strategies.first(), Some(&TitleStrategy::Remote));
    }

    #[test]
    fn test_filter_defaults() {
        let config: MessageFilterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MessageFilterConfig::default());
        assert_eq!(config.max_length, 4000);
    }
}
