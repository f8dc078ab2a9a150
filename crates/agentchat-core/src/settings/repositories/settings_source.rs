use std::collections::HashMap;

use crate::settings::models::{MessageFilterConfig, TitleConfig};

pub const ENV_API_URL: &str = "AGENT_CHAT_API_URL";
pub const ENV_ASSISTANT_ID: &str = "AGENT_CHAT_ASSISTANT_ID";
pub const ENV_API_KEY: &str = "AGENT_CHAT_API_KEY";
pub const ENV_THREAD_ID: &str = "AGENT_CHAT_THREAD_ID";

/// Read-only view of one place settings can come from
pub trait SettingsSource: Send + Sync {
    fn api_url(&self) -> Option<String>;
    fn assistant_id(&self) -> Option<String>;
    fn api_key(&self) -> Option<String>;
    fn thread_id(&self) -> Option<String>;

    fn filter_config(&self) -> Option<MessageFilterConfig> {
        None
    }

    fn title_config(&self) -> Option<TitleConfig> {
        None
    }
}

/// Settings from `AGENT_CHAT_*` environment variables. Blank values count
/// as unset.
#[derive(Clone, Debug, Default)]
pub struct EnvSettings {
    vars: HashMap<String, String>,
}

impl EnvSettings {
    pub fn from_env() -> Self {
        Self::from_vars(
            [ENV_API_URL, ENV_ASSISTANT_ID, ENV_API_KEY, ENV_THREAD_ID]
                .into_iter()
                .filter_map(|key| std::env::var(key).ok().map(|value| (key, value))),
        )
    }

    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

impl SettingsSource for EnvSettings {
    fn api_url(&self) -> Option<String> {
        self.get(ENV_API_URL)
    }

    fn assistant_id(&self) -> Option<String> {
        self.get(ENV_ASSISTANT_ID)
    }

    fn api_key(&self) -> Option<String> {
        self.get(ENV_API_KEY)
    }

    fn thread_id(&self) -> Option<String> {
        self.get(ENV_THREAD_ID)
    }
}
