//! Project manifest (`pspm.json`).
//!
//! The manifest declares what a project depends on: three maps keyed by
//! dependency identity, plus per-agent overrides. Publishing metadata
//! (`name`, `version`, `files`, ...) may be present but is opaque here;
//! unknown keys survive a read-modify-write untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PspmError, Result};
use crate::utils::fs::atomic_write;

pub const MANIFEST_FILE: &str = "pspm.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Registry dependencies: `@user/<username>/<name>` -> range string.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    /// GitHub dependencies: `github:<owner>/<repo>[/<path>]` -> ref string.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub github_dependencies: BTreeMap<String, String>,

    /// Local dependencies: `file:<path>` -> version marker (conventionally `*`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub local_dependencies: BTreeMap<String, String>,

    /// Agent overrides: agent name -> configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<String, AgentConfig>,

    /// Publishing-only fields and anything else we don't interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub skills_dir: String,
}

impl Manifest {
    /// Load the manifest at the project root. An absent file is an empty
    /// manifest; the file is only created once a dependency is saved.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = Self::path(project_root);
        match crate::utils::fs::read_optional(&path)? {
            Some(contents) => serde_json::from_str(&contents).map_err(|err| {
                PspmError::InvalidManifest(format!("{}: {err}", path.display()))
            }),
            None => Ok(Self::default()),
        }
    }

    /// Write the manifest back: two-space JSON with a trailing newline.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let mut contents = serde_json::to_string_pretty(self)?;
        contents.push('\n');
        atomic_write(Self::path(project_root), contents.as_bytes())
    }

    #[must_use]
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn exists(project_root: &Path) -> bool {
        Self::path(project_root).exists()
    }

    pub fn add_dependency(&mut self, key: impl Into<String>, range: impl Into<String>) {
        self.dependencies.insert(key.into(), range.into());
    }

    pub fn add_github_dependency(&mut self, key: impl Into<String>, git_ref: impl Into<String>) {
        self.github_dependencies.insert(key.into(), git_ref.into());
    }

    pub fn add_local_dependency(&mut self, key: impl Into<String>) {
        self.local_dependencies.insert(key.into(), "*".to_string());
    }

    /// Remove a dependency from whichever map holds it. Returns false when
    /// the key is unknown to all three maps.
    pub fn remove_dependency(&mut self, key: &str) -> bool {
        self.dependencies.remove(key).is_some()
            || self.github_dependencies.remove(key).is_some()
            || self.local_dependencies.remove(key).is_some()
    }

    /// True when no dependency map has entries.
    #[must_use]
    pub fn has_no_dependencies(&self) -> bool {
        self.dependencies.is_empty()
            && self.github_dependencies.is_empty()
            && self.local_dependencies.is_empty()
    }
}
