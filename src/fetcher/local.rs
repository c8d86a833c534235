//! Local skill validation.
//!
//! Local skills are never copied into the store; validation only resolves
//! the path and checks the directory has the shape of a skill. No bytes
//! are read for integrity purposes.

use std::path::{Path, PathBuf};

use crate::error::{PspmError, Result};
use crate::utils::paths::{expand_tilde, normalize};

/// A validated local skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSkill {
    /// The path exactly as the specifier carried it.
    pub path: String,
    /// The absolute directory it resolves to.
    pub resolved_path: PathBuf,
    pub name: String,
}

/// Validate a local path: it must resolve to a directory containing at
/// least one of `SKILL.md` or `pspm.json`. Relative paths resolve against
/// the project root.
pub fn validate(project_root: &Path, path: &str) -> Result<LocalSkill> {
    let expanded = expand_tilde(path);
    let resolved_path = if expanded.is_absolute() {
        normalize(&expanded)
    } else {
        normalize(&project_root.join(expanded))
    };

    if !resolved_path.is_dir() {
        return Err(PspmError::LocalSkillInvalid(format!(
            "{path} is not a directory"
        )));
    }
    if !resolved_path.join("SKILL.md").exists() && !resolved_path.join("pspm.json").exists() {
        return Err(PspmError::LocalSkillInvalid(format!(
            "{path} contains neither SKILL.md nor pspm.json"
        )));
    }

    Ok(LocalSkill {
        path: path.to_string(),
        name: skill_name(&resolved_path),
        resolved_path,
    })
}

/// A local skill's name: the `name` field of its `pspm.json` when present,
/// the directory name otherwise.
fn skill_name(dir: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(dir.join("pspm.json")) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&contents) {
            if let Some(name) = value.get("name").and_then(|n| n.as_str()) {
                return name.to_string();
            }
        }
    }
    dir.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("skill")
        .to_string()
}
