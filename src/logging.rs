//! Tracing subscriber setup for host applications

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogStyle {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Install the global subscriber.
///
/// `RUST_LOG` is honored; `default_level` is added as a fallback directive.
/// Returns an error if a global subscriber is already set.
pub fn init(
    style: LogStyle,
    default_level: Level,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::from_default_env().add_directive(default_level.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match style {
        LogStyle::Pretty => builder.try_init(),
        LogStyle::Json => builder.json().try_init(),
    }
}
