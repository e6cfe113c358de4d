//! Logging initialization.
//!
//! Structured events go to stderr so reports on stdout stay parseable.
//! Controlled by `RUST_LOG`; defaults to `warn`.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
