//! Agent symlink management.
//!
//! Every installed skill is projected into each selected agent's skills
//! directory as a relative symlink into the project store, so a checked-out
//! project keeps working when the directory moves. Reconciliation is
//! idempotent and never follows an existing link: the link itself is
//! inspected to decide whether to keep, replace, or warn.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::agents;
use crate::error::Result;
use crate::manifest::AgentConfig;
use crate::utils::fs::ensure_dir;
use crate::utils::paths::relative_path_from;

/// An installed skill as the linker sees it.
#[derive(Debug, Clone)]
pub struct InstalledSkill {
    pub name: String,
    /// Store path relative to the project root, e.g.
    /// `.pspm/skills/alice/review`.
    pub store_path: PathBuf,
}

/// What a linking pass did, for reporting.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub created: Vec<PathBuf>,
    pub replaced: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Create or repair links for `skills` under every selected agent.
///
/// Unknown agent names produce a warning and are skipped; a regular file
/// or directory occupying a link path is left untouched with a warning.
pub fn link_skills(
    project_root: &Path,
    agent_names: &[String],
    overrides: &BTreeMap<String, AgentConfig>,
    skills: &[InstalledSkill],
) -> Result<LinkReport> {
    let mut report = LinkReport::default();

    for agent in agent_names {
        let Some(skills_dir) = agents::skills_dir(agent, overrides) else {
            warn!(agent, "unknown agent, skipping");
            report
                .warnings
                .push(format!("unknown agent '{agent}', skipping"));
            continue;
        };
        let agent_dir = project_root.join(&skills_dir);
        ensure_dir(&agent_dir)?;

        for skill in skills {
            let link_path = agent_dir.join(&skill.name);
            let target = relative_path_from(&agent_dir, &project_root.join(&skill.store_path));
            reconcile(&link_path, &target, &mut report)?;
        }
    }

    Ok(report)
}

/// Remove the link for one skill from every selected agent. Non-symlink
/// occupants are left untouched with a warning.
pub fn unlink_skill(
    project_root: &Path,
    agent_names: &[String],
    overrides: &BTreeMap<String, AgentConfig>,
    skill_name: &str,
) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    for agent in agent_names {
        let Some(skills_dir) = agents::skills_dir(agent, overrides) else {
            continue;
        };
        let link_path = project_root.join(&skills_dir).join(skill_name);
        match std::fs::symlink_metadata(&link_path) {
            Err(_) => continue,
            Ok(metadata) if metadata.is_symlink() => {
                std::fs::remove_file(&link_path)?;
                debug!(path = %link_path.display(), "removed agent link");
            }
            Ok(_) => {
                warnings.push(format!(
                    "{} is not a pspm link, leaving it in place",
                    link_path.display()
                ));
            }
        }
    }
    Ok(warnings)
}

fn reconcile(link_path: &Path, target: &Path, report: &mut LinkReport) -> Result<()> {
    match std::fs::symlink_metadata(link_path) {
        Err(_) => {
            create_symlink(target, link_path)?;
            debug!(path = %link_path.display(), target = %target.display(), "created agent link");
            report.created.push(link_path.to_path_buf());
        }
        Ok(metadata) if metadata.is_symlink() => {
            let current = std::fs::read_link(link_path)?;
            if current == target {
                report.unchanged.push(link_path.to_path_buf());
            } else {
                std::fs::remove_file(link_path)?;
                create_symlink(target, link_path)?;
                debug!(path = %link_path.display(), target = %target.display(), "replaced agent link");
                report.replaced.push(link_path.to_path_buf());
            }
        }
        Ok(_) => {
            warn!(path = %link_path.display(), "link path occupied by a regular file, leaving it");
            report.warnings.push(format!(
                "{} exists and is not a symlink, leaving it in place",
                link_path.display()
            ));
        }
    }
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target, link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn skill(name: &str, store_path: &str) -> InstalledSkill {
        InstalledSkill {
            name: name.to_string(),
            store_path: PathBuf::from(store_path),
        }
    }

    fn store_payload(root: &Path, rel: &str) {
        let dir = root.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("SKILL.md"), "# skill").unwrap();
    }

    #[test]
    fn creates_relative_link_that_resolves_into_store() {
        let project = tempdir().unwrap();
        store_payload(project.path(), ".pspm/skills/alice/review");

        let report = link_skills(
            project.path(),
            &["claude-code".to_string()],
            &BTreeMap::new(),
            &[skill("review", ".pspm/skills/alice/review")],
        )
        .unwrap();
        assert_eq!(report.created.len(), 1);

        let link = project.path().join(".claude/skills/review");
        let target = std::fs::read_link(&link).unwrap();
        assert!(target.is_relative());
        assert_eq!(target, PathBuf::from("../../.pspm/skills/alice/review"));
        // Following the link reaches the payload.
        assert!(link.join("SKILL.md").exists());
    }

    #[test]
    fn relinking_same_target_is_a_noop() {
        let project = tempdir().unwrap();
        store_payload(project.path(), ".pspm/skills/alice/review");
        let agents = vec!["claude-code".to_string()];
        let skills = vec![skill("review", ".pspm/skills/alice/review")];

        link_skills(project.path(), &agents, &BTreeMap::new(), &skills).unwrap();
        let report = link_skills(project.path(), &agents, &BTreeMap::new(), &skills).unwrap();
        assert!(report.created.is_empty());
        assert!(report.replaced.is_empty());
        assert_eq!(report.unchanged.len(), 1);
    }

    #[test]
    fn stale_link_is_replaced() {
        let project = tempdir().unwrap();
        store_payload(project.path(), ".pspm/skills/alice/review");
        let agent_dir = project.path().join(".claude/skills");
        std::fs::create_dir_all(&agent_dir).unwrap();
        std::os::unix::fs::symlink("../../old/location", agent_dir.join("review")).unwrap();

        let report = link_skills(
            project.path(),
            &["claude-code".to_string()],
            &BTreeMap::new(),
            &[skill("review", ".pspm/skills/alice/review")],
        )
        .unwrap();
        assert_eq!(report.replaced.len(), 1);
        assert_eq!(
            std::fs::read_link(agent_dir.join("review")).unwrap(),
            PathBuf::from("../../.pspm/skills/alice/review")
        );
    }

    #[test]
    fn regular_file_at_link_path_is_left_with_warning() {
        let project = tempdir().unwrap();
        store_payload(project.path(), ".pspm/skills/alice/review");
        let agent_dir = project.path().join(".claude/skills");
        std::fs::create_dir_all(&agent_dir).unwrap();
        std::fs::write(agent_dir.join("review"), "hand-written file").unwrap();

        let report = link_skills(
            project.path(),
            &["claude-code".to_string()],
            &BTreeMap::new(),
            &[skill("review", ".pspm/skills/alice/review")],
        )
        .unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            std::fs::read_to_string(agent_dir.join("review")).unwrap(),
            "hand-written file"
        );
    }

    #[test]
    fn unknown_agent_warns_and_skips() {
        let project = tempdir().unwrap();
        store_payload(project.path(), ".pspm/skills/alice/review");

        let report = link_skills(
            project.path(),
            &["emacs".to_string()],
            &BTreeMap::new(),
            &[skill("review", ".pspm/skills/alice/review")],
        )
        .unwrap();
        assert!(report.created.is_empty());
        assert!(report.warnings[0].contains("emacs"));
    }

    #[test]
    fn manifest_override_redirects_link_directory() {
        let project = tempdir().unwrap();
        store_payload(project.path(), ".pspm/skills/alice/review");
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "claude-code".to_string(),
            AgentConfig {
                skills_dir: "tools/claude/skills".to_string(),
            },
        );

        link_skills(
            project.path(),
            &["claude-code".to_string()],
            &overrides,
            &[skill("review", ".pspm/skills/alice/review")],
        )
        .unwrap();
        assert!(project
            .path()
            .join("tools/claude/skills/review")
            .symlink_metadata()
            .unwrap()
            .is_symlink());
    }

    #[test]
    fn unlink_removes_symlinks_but_not_files() {
        let project = tempdir().unwrap();
        store_payload(project.path(), ".pspm/skills/alice/review");
        let agents = vec!["claude-code".to_string(), "codex".to_string()];
        link_skills(
            project.path(),
            &agents,
            &BTreeMap::new(),
            &[skill("review", ".pspm/skills/alice/review")],
        )
        .unwrap();
        // Replace codex's link with a regular file.
        let codex_link = project.path().join(".codex/skills/review");
        std::fs::remove_file(&codex_link).unwrap();
        std::fs::write(&codex_link, "user file").unwrap();

        let warnings =
            unlink_skill(project.path(), &agents, &BTreeMap::new(), "review").unwrap();
        assert!(!project.path().join(".claude/skills/review").exists());
        assert!(codex_link.exists());
        assert_eq!(warnings.len(), 1);
    }
}
