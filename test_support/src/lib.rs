pub mod test_server;

use std::path::{Path, PathBuf};

/// Path of a fixture relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("test_support sits one level below the workspace root")
        .join(name)
}
