use serde::{Deserialize, Serialize};

use super::config_error::{ConfigError, ConfigResult};
use super::filter_config::{MessageFilterConfig, TitleConfig};
use crate::settings::repositories::SettingsSource;

pub const DEFAULT_ASSISTANT_ID: &str = "agent";
pub const DEFAULT_ATTACHMENT_PROMPT: &str = "Please review the attached file(s).";
pub const DEFAULT_THREAD_SEARCH_LIMIT: usize = 100;

/// Where the naming capability can be found on the agent server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NamingRoute {
    /// `POST /assistants/{assistant_id}/experiments/generate_name`
    AssistantExperiment,
    /// `POST /experiments/generate_name`
    GlobalExperiment,
    /// `POST /runs/stream` against a dedicated naming graph
    GraphStream { graph_id: String },
    /// `POST /runs/wait` against a dedicated naming graph
    GraphWait { graph_id: String },
}

/// Everything a session needs, passed explicitly to its constructor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub thread_id: Option<String>,
    pub naming_routes: Vec<NamingRoute>,
    pub filter: MessageFilterConfig,
    pub title: TitleConfig,
    /// Text part sent along with attachment-only messages
    pub attachment_prompt: String,
    pub thread_search_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
            api_key: None,
            thread_id: None,
            naming_routes: vec![NamingRoute::AssistantExperiment, NamingRoute::GlobalExperiment],
            filter: MessageFilterConfig::default(),
            title: TitleConfig::default(),
            attachment_prompt: DEFAULT_ATTACHMENT_PROMPT.to_string(),
            thread_search_limit: DEFAULT_THREAD_SEARCH_LIMIT,
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, assistant_id: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            assistant_id: assistant_id.into(),
            ..Self::default()
        }
    }

    /// Build a configuration from settings sources in priority order.
    ///
    /// For every value the first source that supplies one wins. Only the API
    /// URL is mandatory.
    pub fn resolve(sources: &[&dyn SettingsSource]) -> ConfigResult<Self> {
        let api_url = sources
            .iter()
            .find_map(|s| s.api_url())
            .ok_or(ConfigError::Missing("api_url"))?;

        let mut config = Self::new(
            api_url,
            sources
                .iter()
                .find_map(|s| s.assistant_id())
                .unwrap_or_else(|| DEFAULT_ASSISTANT_ID.to_string()),
        );
        config.api_key = sources.iter().find_map(|s| s.api_key());
        config.thread_id = sources.iter().find_map(|s| s.thread_id());
        if let Some(filter) = sources.iter().find_map(|s| s.filter_config()) {
            config.filter = filter;
        }
        if let Some(title) = sources.iter().find_map(|s| s.title_config()) {
            config.title = title;
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_naming_routes(mut self, routes: Vec<NamingRoute>) -> Self {
        self.naming_routes = routes;
        self
    }
}
