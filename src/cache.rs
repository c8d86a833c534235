//! Content-addressed tarball cache.
//!
//! Verified tarballs live under `.pspm/cache/sha256-<hex>.tgz`, keyed by
//! their own digest so the cache is self-describing. Nothing is written
//! before its integrity has been checked, and a cached file that no longer
//! matches its name is deleted on read and treated as a miss. Read
//! failures are never fatal; they just fall through to the network.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::integrity;
use crate::utils::fs::atomic_write;

pub const CACHE_DIR: &str = ".pspm/cache";

pub struct SkillCache {
    root: PathBuf,
}

impl SkillCache {
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: project_root.join(CACHE_DIR),
        }
    }

    /// Look up cached bytes for an integrity string. Returns `None` on any
    /// miss, including a verification failure (the corrupt file is deleted
    /// first).
    #[must_use]
    pub fn load(&self, integrity: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(integrity)?;
        if !path.exists() {
            return None;
        }
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cache read failed, falling back");
                return None;
            }
        };
        if crate::integrity::digest(&bytes) != integrity {
            warn!(path = %path.display(), "cache entry failed verification, removing");
            let _ = std::fs::remove_file(&path);
            return None;
        }
        debug!(path = %path.display(), "cache hit");
        Some(bytes)
    }

    /// Store verified bytes under their integrity key. The bytes are
    /// re-digested before the write so a corrupt payload can never enter
    /// the cache under a mismatched name.
    pub fn store(&self, expected_integrity: &str, bytes: &[u8]) -> Result<()> {
        integrity::verify("cache entry", bytes, expected_integrity)?;
        let file_name = integrity::cache_file_name(expected_integrity)?;
        atomic_write(self.root.join(file_name), bytes)
    }

    #[must_use]
    pub fn contains(&self, integrity: &str) -> bool {
        self.entry_path(integrity).is_some_and(|path| path.exists())
    }

    fn entry_path(&self, integrity: &str) -> Option<PathBuf> {
        let file_name = crate::integrity::cache_file_name(integrity).ok()?;
        Some(self.root.join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let cache = SkillCache::new(dir.path());
        let bytes = b"tarball payload".to_vec();
        let key = crate::integrity::digest(&bytes);

        cache.store(&key, &bytes).unwrap();
        assert!(cache.contains(&key));
        assert_eq!(cache.load(&key), Some(bytes));
    }

    #[test]
    fn store_rejects_bytes_that_do_not_match_key() {
        let dir = tempdir().unwrap();
        let cache = SkillCache::new(dir.path());
        let key = crate::integrity::digest(b"expected");

        assert!(cache.store(&key, b"different").is_err());
        assert!(!cache.contains(&key));
    }

    #[test]
    fn corrupt_entry_is_deleted_and_reported_as_miss() {
        let dir = tempdir().unwrap();
        let cache = SkillCache::new(dir.path());
        let key = crate::integrity::digest(b"payload");
        let file_name = crate::integrity::cache_file_name(&key).unwrap();

        std::fs::create_dir_all(dir.path().join(CACHE_DIR)).unwrap();
        std::fs::write(dir.path().join(CACHE_DIR).join(&file_name), b"corrupted").unwrap();

        assert_eq!(cache.load(&key), None);
        assert!(!dir.path().join(CACHE_DIR).join(&file_name).exists());
    }

    #[test]
    fn missing_entry_is_a_plain_miss() {
        let dir = tempdir().unwrap();
        let cache = SkillCache::new(dir.path());
        assert_eq!(cache.load(&crate::integrity::digest(b"never stored")), None);
    }

    #[test]
    fn cache_file_name_is_hex_derived_from_integrity() {
        let dir = tempdir().unwrap();
        let cache = SkillCache::new(dir.path());
        let bytes = b"self-describing".to_vec();
        let key = crate::integrity::digest(&bytes);
        cache.store(&key, &bytes).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join(CACHE_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        let hex_part = entries[0]
            .strip_prefix("sha256-")
            .unwrap()
            .strip_suffix(".tgz")
            .unwrap();
        assert_eq!(crate::integrity::from_hex_checksum(hex_part).unwrap(), key);
    }
}
