//! plugrpc-text - reference text-transform plugin.
//!
//! Started by a parent CLI, this binary serves the `Execute` RPC on loopback
//! and prints `PLUGIN_PORT=<port>` to stdout once it is ready. Set
//! `PLUGIN_PORT` to request a specific port.

mod transform;

use clap::Parser;
use std::process::ExitCode;
use tracing::info;
use transform::TextTransform;

#[derive(Parser, Debug)]
#[command(name = "plugrpc-text")]
#[command(about = "Text transform plugin (uppercase, lowercase, reverse, length)")]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    plugrpc_sdk::logging::init(args.debug);

    info!("Starting plugrpc-text plugin");

    plugrpc_sdk::serve(TextTransform).await
}
