//! Centralized configuration for plugin processes.
//!
//! The only runtime setting is the port, taken from `PLUGIN_PORT` when it is
//! set. Everything else is a constant shared by plugins and their parents.

use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::warn;

/// Server and handshake configuration.
pub struct ServerConfig;

impl ServerConfig {
    /// Plugins only ever listen on loopback.
    pub const HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;
    /// Port 0 asks the OS for an ephemeral port.
    pub const DEFAULT_PORT: u16 = 0;
    pub const PORT_ENV: &'static str = "PLUGIN_PORT";
    /// Prefix of the single stdout line announcing the bound port.
    pub const HANDSHAKE_PREFIX: &'static str = "PLUGIN_PORT=";
    /// How long a parent waits for the handshake line.
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
    /// How long a parent waits for a plugin to exit after SIGTERM.
    pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Parse a port value, ignoring anything that is not a valid `u16`.
pub fn parse_port(raw: Option<&str>) -> Option<u16> {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
}

/// Read the port override from `PLUGIN_PORT`.
pub fn port_from_env() -> Option<u16> {
    let raw = std::env::var(ServerConfig::PORT_ENV).ok();
    let port = parse_port(raw.as_deref());
    if let (Some(value), None) = (&raw, port) {
        warn!(
            "Ignoring {}={:?}: not a valid port",
            ServerConfig::PORT_ENV,
            value
        );
    }
    port
}

/// Pick the port to bind.
///
/// A valid `PLUGIN_PORT` always wins over `requested`, including an explicit
/// non-zero request.
pub fn resolve_port(requested: u16) -> u16 {
    select_port(port_from_env(), requested)
}

fn select_port(env_port: Option<u16>, requested: u16) -> u16 {
    env_port.unwrap_or(requested)
}

/// Format the handshake line written to stdout.
pub fn handshake_line(port: u16) -> String {
    format!("{}{}", ServerConfig::HANDSHAKE_PREFIX, port)
}
