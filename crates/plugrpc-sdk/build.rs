//! Compiles `proto/plugin.proto` into the `plugin` gRPC module.

use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/plugin.proto");
    println!("cargo:rerun-if-env-changed=PROTOC");

    // Prefer an explicitly configured protoc, otherwise use the vendored one
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let well_known: PathBuf = protoc_bin_vendored::include_path()?;

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/plugin.proto"], &[PathBuf::from("proto"), well_known])?;

    Ok(())
}
