use tracing_subscriber::{
    filter::{Directive, LevelFilter},
    fmt,
    prelude::*,
    EnvFilter,
};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// Unknown levels fall back to info
pub fn normalize_level(level: &str) -> &'static str {
    let level = level.trim().to_ascii_lowercase();
    LEVELS
        .iter()
        .copied()
        .find(|candidate| *candidate == level)
        .unwrap_or("info")
}

/// Installs the global subscriber. `RUST_LOG` directives take precedence over
/// `level`. Returns false if a subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    let normalized = normalize_level(level);

    let filter = EnvFilter::builder()
        .with_default_directive(
            normalized
                .parse::<Directive>()
                .unwrap_or_else(|_| LevelFilter::INFO.into()),
        )
        .parse_lossy(std::env::var("RUST_LOG").unwrap_or_default());

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_filter(filter);

    let installed = tracing_subscriber::registry()
        .with(stdout_layer)
        .try_init()
        .is_ok();

    if installed && normalized != level.trim().to_ascii_lowercase() {
        tracing::warn!("Invalid log level '{}', defaulting to 'info'", level);
    }

    installed
}
