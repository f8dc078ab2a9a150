use std::path::PathBuf;

use super::connection_settings_repository::{BoxFuture, ConnectionSettings, ConnectionSettingsRepository};
use crate::settings::models::{ConfigError, ConfigResult};

pub struct ConnectionSettingsJsonRepository {
    file_path: PathBuf,
}

impl ConnectionSettingsJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::PathError("Cannot determine config directory".into()))?;

        let file_path = config_dir.join("agent-chat").join("connection_settings.json");

        Ok(Self { file_path })
    }

    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

impl ConnectionSettingsRepository for ConnectionSettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, ConfigResult<ConnectionSettings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            if !tokio::fs::try_exists(&path).await? {
                return Ok(ConnectionSettings::default());
            }

            let contents = tokio::fs::read_to_string(&path).await?;
            let settings: ConnectionSettings = serde_json::from_str(&contents)?;

            Ok(settings)
        })
    }

    fn save(&self, settings: ConnectionSettings) -> BoxFuture<'static, ConfigResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)?;

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, &json).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            tracing::debug!(path = %path.display(), "Saved connection settings");
            Ok(())
        })
    }
}
