fn main() {
    println!("cargo:rerun-if-changed=proto/protobuf_agent.proto");
    prost_build::compile_protos(&["proto/protobuf_agent.proto"], &["proto/"])
        .expect("failed to compile protobuf_agent.proto");
}
