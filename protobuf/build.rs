fn main() {
    println!("cargo:rerun-if-changed=./grammarjobs.proto");
    tonic_build::compile_protos("./grammarjobs.proto")
        .unwrap_or_else(|err| panic!("Failed to compile protos {:?}", err));
}
