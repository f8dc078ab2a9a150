use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Install the global structured-logging subscriber.
///
/// Honours `RUST_LOG`; without it everything at INFO and above is printed.
/// Calling this more than once returns an error instead of panicking.
pub fn init() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let _ = init();
        assert!(init().is_err());
    }
}
