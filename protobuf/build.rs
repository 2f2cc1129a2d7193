fn main() {
    println!("cargo:rerun-if-changed=./jobs.proto");
    tonic_build::compile_protos("./jobs.proto")
        .unwrap_or_else(|err| panic!("Failed to compile protos {:?}", err));
}
