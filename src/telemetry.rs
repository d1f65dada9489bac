//! Tracing initialisation for the `xeval` binary.
//!
//! Diagnostics go to stderr so that stdout stays reserved for listings and reports.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `json`, events are written as
/// newline-delimited JSON. Only the first call has an effect.
pub(crate) fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
            .ok();
    }
}

/// The default level: `-v` raises it to debug, otherwise the configured level or `warn`.
pub(crate) fn level_for(verbose: bool, configured: Option<&str>) -> Level {
    if verbose {
        return Level::DEBUG;
    }

    configured
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN)
}
