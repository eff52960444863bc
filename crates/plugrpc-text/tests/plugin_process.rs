//! Process-level tests for the plugrpc-text plugin binary.
//!
//! These spawn the real binary, complete the stdout handshake and call
//! `Execute` over loopback gRPC, the same way a parent CLI does.

use plugrpc_sdk::tonic::Code;
use plugrpc_sdk::{pack, Any, PluginError, PluginProcess};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const BINARY: &str = env!("CARGO_BIN_EXE_plugrpc-text");

/// Build a command for the plugin with a clean port environment.
fn plugin_command(port_env: Option<u16>) -> Command {
    let mut command = Command::new(BINARY);
    command.env_remove("PLUGIN_PORT").stderr(Stdio::null());
    if let Some(port) = port_env {
        command.env("PLUGIN_PORT", port.to_string());
    }
    command
}

async fn start_plugin() -> PluginProcess {
    PluginProcess::spawn(plugin_command(None))
        .await
        .expect("plugin should start and announce its port")
}

fn options(op: &str) -> HashMap<String, Any> {
    let mut options = HashMap::new();
    options.insert("op".to_string(), pack(op, None));
    options
}

/// Reserve a free loopback port by binding and releasing it.
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_reverse_scenario() {
    let plugin = start_plugin().await;
    assert!(plugin.port() > 0);

    let result = plugin
        .execute("hello", HashMap::new(), options("reverse"))
        .await
        .unwrap();
    assert!(result.contains("olleh"));

    plugin.kill().await.unwrap();
}

#[tokio::test]
async fn test_all_operations() {
    let plugin = start_plugin().await;

    for (op, expected) in [
        ("uppercase", "MIXED CASE"),
        ("lowercase", "mixed case"),
        ("reverse", "esaC dexiM"),
        ("length", "10"),
    ] {
        let result = plugin
            .execute("Mixed Case", HashMap::new(), options(op))
            .await
            .unwrap();
        assert_eq!(result, expected, "operation {}", op);
    }

    plugin.kill().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_calls() {
    let plugin = start_plugin().await;

    let calls = (0..16).map(|i| {
        let plugin = &plugin;
        async move {
            plugin
                .execute(format!("call-{}", i), HashMap::new(), options("uppercase"))
                .await
        }
    });
    let results = futures::future::join_all(calls).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), format!("CALL-{}", i));
    }

    plugin.kill().await.unwrap();
}

#[tokio::test]
async fn test_contract_error_surfaces_as_internal_status() {
    let plugin = start_plugin().await;

    let err = plugin
        .execute("x", HashMap::new(), options("rot13"))
        .await
        .unwrap_err();
    match err {
        PluginError::Rpc(status) => {
            assert_eq!(status.code(), Code::Internal);
            assert!(status.message().contains("Unsupported operation: rot13"));
        }
        other => panic!("expected an RPC status, got {other}"),
    }

    // The server keeps serving after a failed call
    let result = plugin
        .execute("ok", HashMap::new(), options("uppercase"))
        .await
        .unwrap();
    assert_eq!(result, "OK");

    plugin.kill().await.unwrap();
}

#[tokio::test]
async fn test_unknown_type_url_is_read_as_text() {
    let plugin = start_plugin().await;

    let mut options = HashMap::new();
    options.insert(
        "op".to_string(),
        pack("reverse", Some("example.com/custom.OperationName")),
    );
    let mut args = HashMap::new();
    args.insert("trim".to_string(), pack(true, None));

    let result = plugin.execute("  abc  ", args, options).await.unwrap();
    assert_eq!(result, "cba");

    plugin.kill().await.unwrap();
}

#[tokio::test]
async fn test_plugin_port_env_is_honored() {
    let port = free_port();
    let plugin = PluginProcess::spawn(plugin_command(Some(port)))
        .await
        .unwrap();
    assert_eq!(plugin.port(), port);

    let result = plugin
        .execute("abc", HashMap::new(), options("reverse"))
        .await
        .unwrap();
    assert_eq!(result, "cba");

    plugin.kill().await.unwrap();
}

#[tokio::test]
async fn test_bind_failure_exits_with_code_one() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut command = plugin_command(Some(port));
    command.stdout(Stdio::null());
    let status = tokio::time::timeout(Duration::from_secs(20), command.status())
        .await
        .expect("plugin should exit when its port is taken")
        .unwrap();
    assert_eq!(status.code(), Some(1));

    drop(taken);
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigterm_exits_cleanly() {
    let plugin = start_plugin().await;
    let status = plugin.terminate().await.unwrap();
    assert!(status.success(), "expected exit 0, got {status:?}");
}


#[cfg(unix)]
#[tokio::test]
async fn test_sigint_exits_cleanly() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let plugin = start_plugin().await;
    let pid = plugin.id().expect("plugin should still be running");
    kill(Pid::from_raw(pid as i32), Signal::SIGINT).unwrap();

    let status = tokio::time::timeout(Duration::from_secs(10), plugin.wait())
        .await
        .expect("plugin should exit after SIGINT")
        .unwrap();
    assert_eq!(status.code(), Some(0), "expected exit 0, got {status:?}");
}
