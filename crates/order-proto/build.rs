fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The server half is only used by the client's in-process tests
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/order.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/order.proto");
    Ok(())
}
