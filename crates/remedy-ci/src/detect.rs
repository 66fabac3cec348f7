//! Toolchain detection from project marker files.

use std::path::Path;

use crate::stage::Toolchain;

/// First toolchain whose marker file exists under `root`.
///
/// Checked in the order Rust, Node, Python, so a Rust crate with a
/// `package.json` for docs tooling is still treated as Rust.
pub fn detect_toolchain(root: &Path) -> Option<Toolchain> {
    Toolchain::all()
        .into_iter()
        .find(|toolchain| toolchain.markers().iter().any(|m| root.join(m).is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(markers: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for marker in markers {
            std::fs::write(dir.path().join(marker), "").expect("write marker");
        }
        dir
    }

    #[test]
    fn test_detects_each_toolchain() {
        assert_eq!(detect_toolchain(project(&["Cargo.toml"]).path()), Some(Toolchain::Rust));
        assert_eq!(detect_toolchain(project(&["tsconfig.json"]).path()), Some(Toolchain::Node));
        assert_eq!(
            detect_toolchain(project(&["requirements.txt"]).path()),
            Some(Toolchain::Python)
        );
    }

    #[test]
    fn test_rust_wins_over_node() {
        let dir = project(&["package.json", "Cargo.toml"]);
        assert_eq!(detect_toolchain(dir.path()), Some(Toolchain::Rust));
    }

    #[test]
    fn test_unknown_project() {
        assert_eq!(detect_toolchain(project(&["README.md"]).path()), None);
    }
}
