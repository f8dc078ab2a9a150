use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::settings_source::SettingsSource;
use crate::settings::models::{ConfigResult, MessageFilterConfig, TitleConfig};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Connection settings the user saved from the setup form
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<MessageFilterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<TitleConfig>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SettingsSource for ConnectionSettings {
    fn api_url(&self) -> Option<String> {
        non_blank(&self.api_url)
    }

    fn assistant_id(&self) -> Option<String> {
        non_blank(&self.assistant_id)
    }

    fn api_key(&self) -> Option<String> {
        non_blank(&self.api_key)
    }

    fn thread_id(&self) -> Option<String> {
        non_blank(&self.thread_id)
    }

    fn filter_config(&self) -> Option<MessageFilterConfig> {
        self.filter.clone()
    }

    fn title_config(&self) -> Option<TitleConfig> {
        self.title.clone()
    }
}

pub trait ConnectionSettingsRepository: Send + Sync + 'static {
    /// Load saved settings, defaults when nothing was saved yet
    fn load(&self) -> BoxFuture<'static, ConfigResult<ConnectionSettings>>;

    fn save(&self, settings: ConnectionSettings) -> BoxFuture<'static, ConfigResult<()>>;
}
