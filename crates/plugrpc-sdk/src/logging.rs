//! Logging setup for plugin binaries.
//!
//! Logs go to stderr: stdout is reserved for the `PLUGIN_PORT=<port>`
//! handshake line the parent process parses.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `debug` selects between DEBUG and
/// INFO. Calling this twice is a no-op.
pub fn init(debug: bool) {
    let default_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .try_init();
}
