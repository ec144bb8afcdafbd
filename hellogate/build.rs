fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/hellogate.proto");

    // protox parses the schema in-process, so no system protoc is needed
    let file_descriptors = protox::compile(["hellogate.proto"], ["proto"])?;

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_fds(file_descriptors)?;

    Ok(())
}
