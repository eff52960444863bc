//! Parent-side helpers for launching and calling a plugin process.
//!
//! The parent spawns the plugin with stdout piped, waits for the
//! `PLUGIN_PORT=<port>` line and connects a plaintext gRPC channel to
//! loopback on that port.

use crate::config::ServerConfig;
use crate::contract::ExecutionRequest;
use crate::error::{PluginError, Result};
use crate::proto::plugin_client::PluginClient;
use crate::proto::ExecutionRequestBody;
use prost_types::Any;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tonic::transport::Channel;
use tracing::{debug, warn};

/// Parse a handshake line, returning the announced port.
pub fn parse_handshake(line: &str) -> Option<u16> {
    line.trim()
        .strip_prefix(ServerConfig::HANDSHAKE_PREFIX)
        .and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
}

/// Connect to a plugin already listening on loopback.
pub async fn connect(port: u16) -> Result<PluginClient<Channel>> {
    let endpoint = format!("http://{}:{}", ServerConfig::HOST, port);
    Ok(PluginClient::connect(endpoint).await?)
}

/// A running plugin child process and a client connected to it.
pub struct PluginProcess {
    child: Child,
    port: u16,
    client: PluginClient<Channel>,
    stdout_drain: Option<JoinHandle<()>>,
}

impl PluginProcess {
    /// Spawn `command` and complete the handshake.
    ///
    /// stdout is captured by this function; stdin and stderr are left as the
    /// caller configured them.
    pub async fn spawn(mut command: Command) -> Result<Self> {
        command.stdout(Stdio::piped()).kill_on_drop(true);
        let mut child = command.spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| PluginError::Handshake {
            message: "plugin stdout was not captured".to_string(),
        })?;
        let mut lines = BufReader::new(stdout).lines();

        let port = match tokio::time::timeout(
            ServerConfig::HANDSHAKE_TIMEOUT,
            read_handshake(&mut lines),
        )
        .await
        {
            Ok(Ok(port)) => port,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(e);
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(PluginError::Handshake {
                    message: format!(
                        "no {} line within {:?}",
                        ServerConfig::HANDSHAKE_PREFIX,
                        ServerConfig::HANDSHAKE_TIMEOUT
                    ),
                });
            }
        };

        debug!("Plugin announced port {}", port);

        // Keep reading so a chatty plugin never blocks on a full pipe
        let stdout_drain = tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("plugin stdout: {}", line);
            }
        });

        let client = match connect(port).await {
            Ok(client) => client,
            Err(e) => {
                stdout_drain.abort();
                let _ = child.kill().await;
                return Err(e);
            }
        };

        Ok(Self {
            child,
            port,
            client,
            stdout_drain: Some(stdout_drain),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// OS process id, `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// A clone of the connected client for direct calls.
    pub fn client(&self) -> PluginClient<Channel> {
        self.client.clone()
    }

    /// Call `Execute` and return the plugin's result string.
    pub async fn execute(
        &self,
        input: impl Into<String>,
        args: HashMap<String, Any>,
        options: HashMap<String, Any>,
    ) -> Result<String> {
        let request = ExecutionRequest {
            input: input.into(),
            args,
            options,
        };
        let response = self
            .client
            .clone()
            .execute(ExecutionRequestBody::from(request))
            .await?;
        Ok(response.into_inner().result)
    }

    /// Ask the plugin to shut down and wait for it to exit.
    ///
    /// Sends SIGTERM on Unix and falls back to a kill if the plugin does not
    /// exit within [`ServerConfig::TERMINATE_TIMEOUT`].
    pub async fn terminate(mut self) -> Result<ExitStatus> {
        self.abort_drain();

        if self.send_sigterm() {
            if let Ok(status) =
                tokio::time::timeout(ServerConfig::TERMINATE_TIMEOUT, self.child.wait()).await
            {
                return Ok(status?);
            }
            warn!("Plugin did not exit after SIGTERM, killing it");
        }

        self.child.kill().await?;
        Ok(self.child.wait().await?)
    }

    #[cfg(unix)]
    fn send_sigterm(&self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return false;
        };
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send SIGTERM to plugin {}: {}", pid, e);
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn send_sigterm(&self) -> bool {
        false
    }

    /// Wait for the plugin to exit on its own.
    pub async fn wait(mut self) -> Result<ExitStatus> {
        self.abort_drain();
        Ok(self.child.wait().await?)
    }

    /// Kill the plugin immediately.
    pub async fn kill(mut self) -> Result<()> {
        self.abort_drain();
        self.child.kill().await?;
        Ok(())
    }

    fn abort_drain(&mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
    }
}

impl Drop for PluginProcess {
    fn drop(&mut self) {
        self.abort_drain();
        let _ = self.child.start_kill();
    }
}

async fn read_handshake(
    lines: &mut tokio::io::Lines<BufReader<ChildStdout>>,
) -> Result<u16> {
    while let Some(line) = lines.next_line().await? {
        if let Some(port) = parse_handshake(&line) {
            return Ok(port);
        }
        debug!("Skipping non-handshake plugin output: {}", line);
    }
    Err(PluginError::Handshake {
        message: "plugin exited before announcing its port".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handshake() {
        assert_eq!(parse_handshake("PLUGIN_PORT=5005"), Some(5005));
        assert_eq!(parse_handshake("PLUGIN_PORT=5005\r\n"), Some(5005));
        assert_eq!(parse_handshake("  PLUGIN_PORT= 42 "), Some(42));
        assert_eq!(parse_handshake("PLUGIN_PORT=0"), None);
        assert_eq!(parse_handshake("PLUGIN_PORT=99999"), None);
        assert_eq!(parse_handshake("RPC_PORT=5005"), None);
        assert_eq!(parse_handshake("starting up"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_fails_when_child_exits_without_handshake() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo booting; exit 1");
        let err = PluginProcess::spawn(command).await.err().unwrap();
        assert!(matches!(err, PluginError::Handshake { .. }));
    }
}
