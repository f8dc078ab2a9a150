use std::sync::Arc;

use chrono::{Duration, Local};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::title_cache::TitleCache;
use super::title_rules::{category_title, clean_remote_title, keyword_title, snippet_title, timestamp_title};
use crate::models::Message;
use crate::models::thread::NEW_CHAT_TITLE;
use crate::repositories::AgentService;
use crate::settings::models::{TitleConfig, TitleStrategy};

/// Plain text of the first human message, if it has any
pub fn first_human_text(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.is_human())
        .map(|m| m.text().trim().to_string())
        .filter(|text| !text.is_empty())
}

async fn remote_title(service: &dyn AgentService, text: &str) -> Option<String> {
    match service.generate_name(text).await {
        Ok(Some(raw)) => {
            let title = clean_remote_title(&raw);
            debug!(title = ?title, "Remote naming returned a title");
            title
        }
        Ok(None) => {
            debug!("Remote naming unavailable, using local title");
            None
        }
        Err(e) => {
            warn!(error = %e, "Remote naming failed, using local title");
            None
        }
    }
}

/// Run the configured strategies in order; the first non-empty title wins.
async fn resolve_title(service: Option<Arc<dyn AgentService>>, config: TitleConfig, text: String) -> String {
    for strategy in &config.strategies {
        let candidate = match strategy {
            TitleStrategy::Remote => match (&service, config.use_remote) {
                (Some(service), true) => remote_title(service.as_ref(), &text).await,
                _ => None,
            },
            TitleStrategy::PatternCategory => category_title(&text),
            TitleStrategy::Keywords => keyword_title(&text, config.keyword_limit),
            TitleStrategy::Snippet => snippet_title(&text, config.max_length),
            TitleStrategy::Timestamp => Some(timestamp_title(&config.fallback_template, &Local::now())),
        };

        if let Some(title) = candidate.filter(|t| !t.trim().is_empty()) {
            debug!(?strategy, title = %title, "Resolved thread title");
            return title;
        }
    }
    NEW_CHAT_TITLE.to_string()
}

/// Layered, cached thread-title generation
pub struct TitleEngine {
    service: Option<Arc<dyn AgentService>>,
    config: Mutex<TitleConfig>,
    cache: TitleCache,
}

impl TitleEngine {
    pub fn new(config: TitleConfig, service: Option<Arc<dyn AgentService>>) -> Self {
        let ttl = Duration::seconds(config.cache_ttl_secs.min(i64::MAX as u64 / 1000) as i64);
        Self::with_cache(config, service, TitleCache::new(ttl))
    }

    pub fn with_cache(config: TitleConfig, service: Option<Arc<dyn AgentService>>, cache: TitleCache) -> Self {
        Self {
            service,
            config: Mutex::new(config),
            cache,
        }
    }

    pub fn config(&self) -> TitleConfig {
        self.config.lock().clone()
    }

    pub fn update_config(&self, config: TitleConfig) {
        *self.config.lock() = config;
    }

    pub fn cache(&self) -> &TitleCache {
        &self.cache
    }

    fn timestamp_fallback(config: &TitleConfig) -> String {
        let title = timestamp_title(&config.fallback_template, &Local::now());
        if title.trim().is_empty() {
            NEW_CHAT_TITLE.to_string()
        } else {
            title
        }
    }

    /// Title for a message text. Never fails and never returns an empty
    /// string.
    pub async fn generate(&self, text: &str) -> String {
        let config = self.config();
        if !config.enabled || text.trim().is_empty() {
            return Self::timestamp_fallback(&config);
        }

        let service = self.service.clone();
        let owned = text.trim().to_string();
        self.cache
            .get_or_compute(text, move || resolve_title(service, config, owned))
            .await
    }

    /// Like [`generate`](Self::generate) but ignores any cached title
    pub async fn regenerate(&self, text: &str) -> String {
        self.cache.invalidate(text);
        self.generate(text).await
    }

    pub async fn generate_for_messages(&self, messages: &[Message]) -> String {
        match first_human_text(messages) {
            Some(text) => self.generate(&text).await,
            None => Self::timestamp_fallback(&self.config()),
        }
    }
}
