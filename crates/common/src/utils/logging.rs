use std::io;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,sea_orm=warn,sqlx=warn";

/// Initialize tracing subscriber with sensible defaults and stdout writer.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info` with database chatter reduced to warnings
pub fn init_logging_default() {
    init_logging(false, None);
}

/// Initialize tracing subscriber with JSON structured output.
pub fn init_logging_json() {
    init_logging(true, None);
}

/// Initialize logging from configuration values. `RUST_LOG` wins over
/// `default_filter` when set. Safe to call more than once.
pub fn init_logging(json: bool, default_filter: Option<&str>) {
    let fallback = default_filter.unwrap_or(DEFAULT_FILTER).to_string();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let builder = fmt().with_env_filter(env_filter).with_target(false).with_writer(io::stdout);
    let _ = if json { builder.json().try_init() } else { builder.compact().try_init() };
}
