// Build script for querylane-clients
// Compiles the embedding service protobuf definitions using tonic-build

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/embedding.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/embedding.proto");
    Ok(())
}
