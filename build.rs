fn main() {
    // Embed build metadata (git commit hash, versions) into `built.rs` under OUT_DIR.
    if let Err(err) = built::write_built_file() {
        panic!("Failed to acquire build-time information: {err}");
    }
}
