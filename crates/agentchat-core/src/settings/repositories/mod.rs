pub mod connection_settings_json_repository;
pub mod connection_settings_repository;
pub mod settings_source;

pub use connection_settings_json_repository::ConnectionSettingsJsonRepository;
pub use connection_settings_repository::{BoxFuture, ConnectionSettings, ConnectionSettingsRepository};
pub use settings_source::{EnvSettings, SettingsSource};
