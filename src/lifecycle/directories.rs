//! Directory preparation.

use std::fs;
use std::path::Path;

use crate::config::DirectoryOptions;
use crate::lifecycle::StageError;

const PROBE_FILE: &str = ".write-probe";

/// Create every configured directory and make sure each one is writable.
pub fn prepare_directories(options: &DirectoryOptions) -> Result<(), StageError> {
    for dir in options.all() {
        fs::create_dir_all(dir)
            .map_err(|e| StageError::resource("directory", format!("{}: {}", dir.display(), e)))?;
        probe_writable(dir)?;
    }
    Ok(())
}

fn probe_writable(dir: &Path) -> Result<(), StageError> {
    let probe = dir.join(PROBE_FILE);
    fs::write(&probe, b"")
        .and_then(|()| fs::remove_file(&probe))
        .map_err(|e| {
            StageError::resource("directory", format!("{} is not writable: {}", dir.display(), e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let options = DirectoryOptions::under(&root.path().join("node"));

        prepare_directories(&options).unwrap();
        for dir in options.all() {
            assert!(dir.is_dir());
            assert!(!dir.join(PROBE_FILE).exists());
        }
    }

    #[test]
    fn test_file_in_the_way_is_a_resource_error() {
        let root = tempfile::tempdir().unwrap();
        let mut options = DirectoryOptions::under(root.path());
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        options.keystore = blocker;

        let err = prepare_directories(&options).unwrap_err();
        assert!(matches!(err, StageError::ResourceAcquisition { resource: "directory", .. }));
    }
}
