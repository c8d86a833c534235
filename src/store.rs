//! Project store layout.
//!
//! Extracted payloads live under `.pspm/skills/`, partitioned by source
//! kind. All returned paths are relative to the project root.

use std::path::PathBuf;

use crate::error::{PspmError, Result};
use crate::specifier::Specifier;

pub const SKILLS_DIR: &str = ".pspm/skills";
pub const GITHUB_NAMESPACE: &str = "_github";
pub const LOCAL_NAMESPACE: &str = "_local";

/// The store path for a dependency key, relative to the project root.
pub fn store_path(spec: &Specifier) -> PathBuf {
    match spec {
        Specifier::Registry { username, name, .. } => {
            PathBuf::from(SKILLS_DIR).join(username).join(name)
        }
        Specifier::GitHub {
            owner, repo, path, ..
        } => {
            let mut out = PathBuf::from(SKILLS_DIR)
                .join(GITHUB_NAMESPACE)
                .join(owner)
                .join(repo);
            if let Some(path) = path {
                out = out.join(path);
            }
            out
        }
        Specifier::Local { .. } => PathBuf::from(SKILLS_DIR)
            .join(LOCAL_NAMESPACE)
            .join(spec.skill_name()),
    }
}

/// The store path for a lockfile dependency key.
pub fn store_path_for_key(key: &str) -> Result<PathBuf> {
    let spec = Specifier::parse(key).map_err(|_| {
        PspmError::InvalidLockfile(format!("unrecognised dependency key: {key}"))
    })?;
    Ok(store_path(&spec))
}
