//! Lockfile (`pspm-lock.json`) reading, upgrading, and writing.
//!
//! The lockfile is the resolved-state snapshot that makes an install
//! reproducible. It is format-versioned; readers accept any version up to
//! the current one and normalise in memory, writers emit the minimum
//! version that carries every populated section:
//!
//! - v1: legacy `skill-lock.json` with a top-level `skills` map
//! - v2: `pspm-lock.json` with `packages`
//! - v3: adds `githubPackages`
//! - v4: adds per-entry `dependencies`
//! - v5: adds `localPackages`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{PspmError, Result};
use crate::utils::fs::atomic_write;

pub const LOCKFILE: &str = "pspm-lock.json";
pub const LEGACY_LOCKFILE: &str = "skill-lock.json";
pub const CURRENT_VERSION: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub lockfile_version: u32,

    #[serde(default)]
    pub registry_url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, RegistryEntry>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub github_packages: BTreeMap<String, GitHubEntry>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub local_packages: BTreeMap<String, LocalEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub version: String,
    /// The download URL actually used.
    pub resolved: String,
    pub integrity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    /// Transitive dependency identity -> resolved range (present from v4).
    /// Lets a frozen install reconstruct the order without the network.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubEntry {
    /// 7-character commit prefix.
    pub version: String,
    pub resolved: String,
    pub integrity: String,
    pub git_commit: String,
    pub git_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEntry {
    /// Always the literal `"local"`.
    pub version: String,
    /// The path as written in the specifier.
    pub path: String,
    /// The absolute path it resolved to at install time.
    pub resolved_path: String,
    pub name: String,
}

impl Lockfile {
    #[must_use]
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            lockfile_version: CURRENT_VERSION,
            registry_url: registry_url.into(),
            ..Self::default()
        }
    }

    /// Load the project lockfile, upgrading older formats in memory.
    /// Returns `None` when neither the current nor the legacy file exists.
    pub fn load(project_root: &Path) -> Result<Option<Self>> {
        let current = project_root.join(LOCKFILE);
        if let Some(contents) = crate::utils::fs::read_optional(&current)? {
            let value: Value = serde_json::from_str(&contents)
                .map_err(|err| PspmError::InvalidLockfile(format!("{LOCKFILE}: {err}")))?;
            return upgrade(value).map(Some);
        }

        let legacy = project_root.join(LEGACY_LOCKFILE);
        if let Some(contents) = crate::utils::fs::read_optional(&legacy)? {
            let value: Value = serde_json::from_str(&contents)
                .map_err(|err| PspmError::InvalidLockfile(format!("{LEGACY_LOCKFILE}: {err}")))?;
            info!("upgrading legacy {LEGACY_LOCKFILE} to lockfile version {CURRENT_VERSION}");
            return upgrade(value).map(Some);
        }

        Ok(None)
    }

    /// Write the lockfile atomically, choosing the minimum format version
    /// that carries every populated section. A surviving legacy file is
    /// renamed away on this write.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let mut on_disk = self.clone();
        on_disk.lockfile_version = self.minimum_version();

        let mut contents = serde_json::to_string_pretty(&on_disk)?;
        contents.push('\n');
        atomic_write(project_root.join(LOCKFILE), contents.as_bytes())?;

        let legacy = project_root.join(LEGACY_LOCKFILE);
        if legacy.exists() {
            std::fs::remove_file(legacy)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(LOCKFILE)
    }

    /// The minimum lockfile version that can represent this content.
    #[must_use]
    pub fn minimum_version(&self) -> u32 {
        if !self.local_packages.is_empty() {
            5
        } else if self.packages.values().any(|e| !e.dependencies.is_empty()) {
            4
        } else if !self.github_packages.is_empty() {
            3
        } else {
            2
        }
    }

    /// True when no package map has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.github_packages.is_empty()
            && self.local_packages.is_empty()
    }

    /// Drop the entry for a dependency key from whichever map holds it.
    pub fn remove(&mut self, key: &str) -> bool {
        self.packages.remove(key).is_some()
            || self.github_packages.remove(key).is_some()
            || self.local_packages.remove(key).is_some()
    }
}

/// Normalise any supported lockfile document to the current shape.
fn upgrade(mut value: Value) -> Result<Lockfile> {
    let object = value
        .as_object_mut()
        .ok_or_else(|| PspmError::InvalidLockfile("lockfile must be a JSON object".to_string()))?;

    // v1 has a top-level `skills` map and predates `lockfileVersion`.
    if let Some(skills) = object.remove("skills") {
        object.insert("packages".to_string(), skills);
        object
            .entry("lockfileVersion")
            .or_insert(Value::from(1u32));
    }

    let version = object
        .get("lockfileVersion")
        .and_then(Value::as_u64)
        .ok_or_else(|| PspmError::InvalidLockfile("missing lockfileVersion".to_string()))?;
    if version > u64::from(CURRENT_VERSION) {
        return Err(PspmError::InvalidLockfile(format!(
            "lockfile version {version} is newer than this pspm supports ({CURRENT_VERSION})"
        )));
    }

    // Later sections are additive; serde defaults fill what older versions
    // never wrote.
    let mut lockfile: Lockfile = serde_json::from_value(value)
        .map_err(|err| PspmError::InvalidLockfile(err.to_string()))?;
    lockfile.lockfile_version = CURRENT_VERSION;
    Ok(lockfile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_registry_entry() -> RegistryEntry {
        RegistryEntry {
            version: "1.1.0".to_string(),
            resolved: "https://registry.example/api/skills/alice/a/1.1.0/download".to_string(),
            integrity: "sha256-R5X6TeLEAbqwkXW5+AzBGsJbCkJVuAUY6HTcWm5M/gQ=".to_string(),
            deprecated: None,
            dependencies: BTreeMap::new(),
        }
    }

    #[test]
    fn absent_lockfile_loads_none() {
        let dir = tempdir().unwrap();
        assert!(Lockfile::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut lockfile = Lockfile::new("https://registry.example");
        lockfile
            .packages
            .insert("@user/alice/a".to_string(), sample_registry_entry());
        lockfile.github_packages.insert(
            "github:acme/prompts/skills/review".to_string(),
            GitHubEntry {
                version: "abc1234".to_string(),
                resolved: "https://github.com/acme/prompts".to_string(),
                integrity: "sha256-R5X6TeLEAbqwkXW5+AzBGsJbCkJVuAUY6HTcWm5M/gQ=".to_string(),
                git_commit: "abc1234def5678abc1234def5678abc1234def56".to_string(),
                git_ref: "v2".to_string(),
            },
        );
        lockfile.save(dir.path()).unwrap();

        let loaded = Lockfile::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.packages, lockfile.packages);
        assert_eq!(loaded.github_packages, lockfile.github_packages);

        // Saving and re-reading again is a fixpoint.
        loaded.save(dir.path()).unwrap();
        let again = Lockfile::load(dir.path()).unwrap().unwrap();
        assert_eq!(again, loaded);
    }

    #[test]
    fn writer_emits_minimum_version() {
        let mut lockfile = Lockfile::new("https://registry.example");
        lockfile
            .packages
            .insert("@user/alice/a".to_string(), sample_registry_entry());
        assert_eq!(lockfile.minimum_version(), 2);

        lockfile.github_packages.insert(
            "github:acme/prompts".to_string(),
            GitHubEntry::default(),
        );
        assert_eq!(lockfile.minimum_version(), 3);

        lockfile
            .packages
            .get_mut("@user/alice/a")
            .unwrap()
            .dependencies
            .insert("@user/alice/util".to_string(), "^1.0.0".to_string());
        assert_eq!(lockfile.minimum_version(), 4);

        lockfile.local_packages.insert(
            "file:../my-skill".to_string(),
            LocalEntry {
                version: "local".to_string(),
                path: "../my-skill".to_string(),
                resolved_path: "/abs/my-skill".to_string(),
                name: "my-skill".to_string(),
            },
        );
        assert_eq!(lockfile.minimum_version(), 5);
    }

    #[test]
    fn minimum_version_is_what_lands_on_disk() {
        let dir = tempdir().unwrap();
        let mut lockfile = Lockfile::new("https://registry.example");
        lockfile
            .packages
            .insert("@user/alice/a".to_string(), sample_registry_entry());
        lockfile.save(dir.path()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(LOCKFILE)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["lockfileVersion"], 2);
        assert!(value.get("githubPackages").is_none());
        assert!(value.get("localPackages").is_none());
    }

    #[test]
    fn legacy_v1_skills_map_is_read_as_packages() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(LEGACY_LOCKFILE),
            r#"{
  "skills": {
    "@user/alice/a": {
      "version": "1.0.0",
      "resolved": "https://registry.example/download/a-1.0.0.tgz",
      "integrity": "sha256-R5X6TeLEAbqwkXW5+AzBGsJbCkJVuAUY6HTcWm5M/gQ="
    }
  }
}"#,
        )
        .unwrap();

        let lockfile = Lockfile::load(dir.path()).unwrap().unwrap();
        assert_eq!(lockfile.lockfile_version, CURRENT_VERSION);
        assert_eq!(lockfile.packages.len(), 1);
        assert_eq!(lockfile.packages["@user/alice/a"].version, "1.0.0");
    }

    #[test]
    fn legacy_file_is_renamed_on_next_write() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(LEGACY_LOCKFILE),
            r#"{ "skills": {} }"#,
        )
        .unwrap();

        let lockfile = Lockfile::load(dir.path()).unwrap().unwrap();
        lockfile.save(dir.path()).unwrap();

        assert!(dir.path().join(LOCKFILE).exists());
        assert!(!dir.path().join(LEGACY_LOCKFILE).exists());
    }

    #[test]
    fn v3_document_upgrades_with_empty_later_sections() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(LOCKFILE),
            r#"{
  "lockfileVersion": 3,
  "registryUrl": "https://registry.example",
  "packages": {},
  "githubPackages": {
    "github:acme/prompts": {
      "version": "abc1234",
      "resolved": "https://github.com/acme/prompts",
      "integrity": "sha256-R5X6TeLEAbqwkXW5+AzBGsJbCkJVuAUY6HTcWm5M/gQ=",
      "gitCommit": "abc1234def5678abc1234def5678abc1234def56",
      "gitRef": "main"
    }
  }
}"#,
        )
        .unwrap();

        let lockfile = Lockfile::load(dir.path()).unwrap().unwrap();
        assert_eq!(lockfile.lockfile_version, CURRENT_VERSION);
        assert!(lockfile.local_packages.is_empty());
        assert_eq!(lockfile.github_packages["github:acme/prompts"].git_ref, "main");
    }

    #[test]
    fn newer_lockfile_versions_are_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(LOCKFILE),
            r#"{ "lockfileVersion": 9, "registryUrl": "" }"#,
        )
        .unwrap();

        let err = Lockfile::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn remove_checks_all_maps() {
        let mut lockfile = Lockfile::new("https://registry.example");
        lockfile
            .packages
            .insert("@user/alice/a".to_string(), sample_registry_entry());
        assert!(lockfile.remove("@user/alice/a"));
        assert!(!lockfile.remove("@user/alice/a"));
        assert!(lockfile.is_empty());
    }
}
