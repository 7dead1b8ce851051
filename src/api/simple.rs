use std::sync::Once;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LoaderConfig;

static INIT_TRACING: Once = Once::new();

/// Build the subscriber filter. `RUST_LOG` wins; otherwise the configured
/// directive is used, and an unparsable one falls back to `info`.
fn log_filter(config: &LoaderConfig) -> (EnvFilter, Option<String>) {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return (filter, None);
    }
    match EnvFilter::try_new(&config.log_filter) {
        Ok(filter) => (filter, None),
        Err(e) => (
            EnvFilter::new("info"),
            Some(format!("ignoring log filter {:?}: {}", config.log_filter, e)),
        ),
    }
}

/// Install the process-wide tracing subscriber. Only the first call has any
/// effect; later calls keep whatever filter was installed then.
pub fn init_logging(config: &LoaderConfig) {
    INIT_TRACING.call_once(|| {
        let (filter, rejected) = log_filter(config);
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        if let Some(msg) = rejected {
            warn!("{}", msg);
        }
        info!("splat preload tracing initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_directive_falls_back() {
        let config = LoaderConfig {
            log_filter: "splat_preload=loud".to_string(),
            ..LoaderConfig::default()
        };
        if std::env::var_os("RUST_LOG").is_none() {
            let (_, rejected) = log_filter(&config);
            assert!(rejected.unwrap().contains("ignoring log filter"));
        }
    }

    #[test]
    fn test_default_directive_accepted() {
        let (_, rejected) = log_filter(&LoaderConfig::default());
        assert!(rejected.is_none());
    }
}
