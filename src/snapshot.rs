// src/snapshot.rs

use crate::model::SnapshotPair;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const BEFORE_SUFFIX: &str = "_original.java";
pub const AFTER_SUFFIX: &str = "_recent.java";

/// Finds `<prefix><before>` / `<prefix><after>` file pairs in one directory.
#[derive(Debug, Clone)]
pub struct SnapshotPairer {
    before_suffix: String,
    after_suffix: String,
}

impl Default for SnapshotPairer {
    fn default() -> Self {
        Self::new(BEFORE_SUFFIX, AFTER_SUFFIX)
    }
}

impl SnapshotPairer {
    pub fn new(before_suffix: impl Into<String>, after_suffix: impl Into<String>) -> Self {
        Self {
            before_suffix: before_suffix.into(),
            after_suffix: after_suffix.into(),
        }
    }

    /// Pairs regular files directly inside `dir`, ordered by prefix.
    ///
    /// A before- or after-file without a partner is not an error, it just
    /// produces no pair. A missing or non-directory `dir` yields no pairs.
    pub fn find_pairs(&self, dir: &Path) -> Vec<SnapshotPair> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut before: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut after: BTreeMap<String, PathBuf> = BTreeMap::new();

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!("Skipping {}: file name is not valid UTF-8", path.display());
                continue;
            };

            if let Some(prefix) = name.strip_suffix(self.before_suffix.as_str()) {
                before.insert(prefix.to_string(), path.clone());
            } else if let Some(prefix) = name.strip_suffix(self.after_suffix.as_str()) {
                after.insert(prefix.to_string(), path.clone());
            }
        }

        before
            .into_iter()
            .filter_map(|(prefix, before_path)| {
                let after_path = after.remove(&prefix)?;
                Some(SnapshotPair {
                    prefix,
                    before_path,
                    after_path,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "class A {}").unwrap();
    }

    #[test]
    fn test_single_pair() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "foo_original.java");
        touch(dir.path(), "foo_recent.java");

        let pairs = SnapshotPairer::default().find_pairs(dir.path());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].prefix, "foo");
        assert!(pairs[0].before_path.ends_with("foo_original.java"));
        assert!(pairs[0].after_path.ends_with("foo_recent.java"));
    }

    #[test]
    fn test_unmatched_files_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "foo_original.java");
        touch(dir.path(), "foo_recent.java");
        touch(dir.path(), "bar_original.java");
        touch(dir.path(), "baz_recent.java");
        touch(dir.path(), "notes.txt");

        let pairs = SnapshotPairer::default().find_pairs(dir.path());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].prefix, "foo");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "foo_original.java");
        touch(dir.path(), "foo_recent.java");
        let odd = dir.path().join(OsStr::from_bytes(b"bad\xff_recent.java"));
        if fs::write(&odd, "x").is_err() {
            // some filesystems reject non-UTF-8 names outright
            return;
        }

        let pairs = SnapshotPairer::default().find_pairs(dir.path());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].prefix, "foo");
    }

    #[test]
    fn test_pairs_sorted_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for p in ["c", "a", "b"] {
            touch(dir.path(), &format!("{p}_original.java"));
            touch(dir.path(), &format!("{p}_recent.java"));
        }
        let prefixes: Vec<_> = SnapshotPairer::default()
            .find_pairs(dir.path())
            .into_iter()
            .map(|p| p.prefix)
            .collect();
        assert_eq!(prefixes, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_subdirectories_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch(&nested, "foo_original.java");
        touch(&nested, "foo_recent.java");
        // A directory named like a snapshot is not a file
        fs::create_dir(dir.path().join("x_original.java")).unwrap();
        touch(dir.path(), "x_recent.java");

        assert!(SnapshotPairer::default().find_pairs(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let pairs = SnapshotPairer::default().find_pairs(Path::new("/no/such/dir"));
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_custom_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "q1.before.py");
        touch(dir.path(), "q1.after.py");
        let pairs = SnapshotPairer::new(".before.py", ".after.py").find_pairs(dir.path());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].prefix, "q1");
    }
}
