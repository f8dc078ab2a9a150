pub mod client_config;
pub mod config_error;
pub mod filter_config;

pub use client_config::{ClientConfig, NamingRoute};
pub use config_error::{ConfigError, ConfigResult};
pub use filter_config::{MessageFilterConfig, TitleConfig, TitleStrategy};
