use tracing_subscriber::fmt;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::HormosolError;

/// Install a global stdout subscriber filtered at `level`
///
/// `level` accepts anything [`EnvFilter`] does, e.g. `"info"` or
/// `"hormosol=debug"`. Returns an error, rather than panicking, when a
/// global subscriber is already installed.
pub fn setup_log(level: &str) -> Result<(), HormosolError> {
    let env_filter = EnvFilter::try_new(level.to_lowercase())
        .map_err(|e| HormosolError::Logging(e.to_string()))?;

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false);

    Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| HormosolError::Logging(e.to_string()))?;

    tracing::debug!("Logging is configured with level: {}", level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_setup_is_an_error() {
        // Another test may have installed the subscriber first
        let _ = setup_log("warn");
        assert!(matches!(setup_log("warn"), Err(HormosolError::Logging(_))));
    }
}
