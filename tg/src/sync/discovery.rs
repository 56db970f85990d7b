//! Project root discovery

use std::path::{Path, PathBuf};

use tracing::debug;

use super::config::SyncConfig;

/// Locate the project root holding the task document
///
/// An explicit `root` wins if it is a directory. Otherwise `start` and its
/// ancestors are searched for the marker directory.
pub fn discover_root(config: &SyncConfig, start: &Path) -> Option<PathBuf> {
    debug!(start = %start.display(), "discover_root: called");
    if let Some(root) = &config.root {
        debug!(root = %root.display(), "discover_root: explicit root configured");
        return root.is_dir().then(|| root.clone());
    }

    let found = start
        .ancestors()
        .find(|dir| dir.join(&config.marker_dir).is_dir())
        .map(Path::to_path_buf);
    debug!(?found, "discover_root: search complete");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_finds_marker_in_ancestor() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join(".taskmaster")).unwrap();
        let nested = temp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let root = discover_root(&SyncConfig::default(), &nested).unwrap();
        assert_eq!(root, temp.path());
    }

    #[test]
    fn test_explicit_root() {
        let temp = tempdir().unwrap();
        let config = SyncConfig::with_root(temp.path());
        assert_eq!(discover_root(&config, Path::new("/")), Some(temp.path().to_path_buf()));

        let config = SyncConfig::with_root(temp.path().join("missing"));
        assert_eq!(discover_root(&config, Path::new("/")), None);
    }

    #[test]
    fn test_no_marker_found() {
        let temp = tempdir().unwrap();
        let config = SyncConfig {
            marker_dir: ".definitely-not-a-marker-dir".to_string(),
            ..Default::default()
        };
        assert_eq!(discover_root(&config, temp.path()), None);
    }
}
