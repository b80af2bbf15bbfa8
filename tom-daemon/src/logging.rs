//! Logging initialization for the tom daemon.
//!
//! Builds one `tracing-subscriber` registry from the `[general]` section:
//! an [`EnvFilter`] seeded with `log_level` and an output layer chosen by
//! `log_format`. Both settings are checked before anything is installed,
//! so a typo fails startup instead of silently logging at the wrong level.

use std::str::FromStr;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use tom_core::config::GeneralConfig;

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// Directives in `RUST_LOG` are applied on top of `log_level`; a
/// malformed `RUST_LOG` is an error.
///
/// # Formats
///
/// * `"json"` - one JSON object per line (production default)
/// * `"pretty"` - multi-line human-readable output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let layer = output_layer(&config.log_format)?;
    let filter = env_filter(&config.log_level)?;

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to initialize {} tracing subscriber: {}",
                config.log_format,
                e
            )
        })
}

fn output_layer(format: &str) -> Result<OutputLayer> {
    match format {
        "json" => Ok(tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .boxed()),
        "pretty" => Ok(tracing_subscriber::fmt::layer().pretty().boxed()),
        other => Err(anyhow::anyhow!(
            "unknown log format '{}', expected 'json' or 'pretty'",
            other
        )),
    }
}

/// Parse `log_level` into a level filter.
fn parse_level(level: &str) -> Result<LevelFilter> {
    Level::from_str(level)
        .map(LevelFilter::from_level)
        .map_err(|_| {
            anyhow::anyhow!(
                "invalid log level '{}', expected one of: trace, debug, info, warn, error",
                level
            )
        })
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    let default = parse_level(level)?;
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env()
        .map_err(|e| anyhow::anyhow!("invalid {} directive: {}", EnvFilter::DEFAULT_ENV, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected_before_install() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..GeneralConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }

    #[test]
    fn invalid_level_is_rejected_before_install() {
        let config = GeneralConfig {
            log_level: "loud".to_owned(),
            ..GeneralConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("invalid log level 'loud'"), "got: {}", err);
    }

    #[test]
    fn parse_level_accepts_known_levels() {
        assert_eq!(parse_level("trace").unwrap(), LevelFilter::TRACE);
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("ERROR").unwrap(), LevelFilter::ERROR);
        assert!(parse_level("").is_err());
        assert!(parse_level("tom=debug").is_err());
    }
}
