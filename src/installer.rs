//! Install orchestration.
//!
//! `add` and `install` share one pipeline: validate specifiers, resolve
//! registry dependencies transitively, then execute the plan in
//! topological order - registry nodes first, then GitHub, then local. Each
//! package runs fetch -> verify -> extract -> lockfile update -> link
//! strictly in sequence, and the lockfile is only written after a package
//! completes, so a crash leaves the prior state or a prefix of the target
//! state, never a torn middle.
//!
//! Failures are per-package: one bad dependency is reported and the rest
//! of the plan continues. Resolver errors are the exception - they abort
//! before anything touches disk. `--frozen-lockfile` elevates would-be
//! network resolution and integrity mismatches to whole-run failures.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cache::SkillCache;
use crate::config::InstallContext;
use crate::error::{PspmError, Result};
use crate::extract;
use crate::fetcher;
use crate::fetcher::github::{GitHubFetch, GitHubFetcher};
use crate::fetcher::local::{self, LocalSkill};
use crate::integrity;
use crate::linker::{self, InstalledSkill};
use crate::lockfile::{GitHubEntry, LocalEntry, Lockfile, RegistryEntry};
use crate::manifest::Manifest;
use crate::registry::{RegistryApi, RegistryClient};
use crate::resolver::{Resolution, ResolvedNode, Resolver};
use crate::specifier::Specifier;
use crate::store;
use crate::utils::paths::relative_path_from;
use crate::versions;

/// Outcome of an `add`, `install`, or `remove` run.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<InstalledPackage>,
    pub failures: Vec<InstallFailure>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub key: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct InstallFailure {
    pub key: String,
    pub error: String,
}

impl InstallReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, key: impl Into<String>, err: &PspmError) {
        let key = key.into();
        let mut message = err.to_string();
        if let Some(remedy) = err.remedy() {
            message.push_str(&format!(" ({remedy})"));
        }
        warn!(key = %key, error = %message, "package failed");
        self.failures.push(InstallFailure {
            key,
            error: message,
        });
    }
}

/// A specifier that survived validation, ready for plan execution.
enum Validated {
    Registry {
        key: String,
        range: Option<String>,
    },
    GitHub {
        spec: Specifier,
        fetch: GitHubFetch,
    },
    Local {
        key: String,
        raw_path: String,
        skill: LocalSkill,
    },
}

pub struct Installer<'a> {
    ctx: &'a InstallContext,
    registry: RegistryClient,
    github: GitHubFetcher,
    cache: SkillCache,
}

impl<'a> Installer<'a> {
    pub fn new(ctx: &'a InstallContext) -> Result<Self> {
        Ok(Self {
            registry: RegistryClient::new(&ctx.registry_url, ctx.token.clone())?,
            github: GitHubFetcher::new(ctx.github_token.clone())?,
            cache: SkillCache::new(&ctx.project_root),
            ctx,
        })
    }

    /// Point GitHub API calls at a different host (tests).
    #[must_use]
    pub fn with_github_api_base(mut self, api_base: impl Into<String>) -> Self {
        let github = self.github;
        self.github = github.with_api_base(api_base);
        self
    }

    /// Add new dependencies and install them.
    pub fn add(&self, specifiers: &[String]) -> Result<InstallReport> {
        if self.ctx.frozen {
            return Err(PspmError::FrozenLockfile(
                "cannot add dependencies with --frozen-lockfile".to_string(),
            ));
        }

        let mut report = InstallReport::default();
        let validated = self.validate_specifiers(specifiers, &mut report);
        if validated.is_empty() {
            return Ok(report);
        }

        // Transitive resolution for the surviving registry specifiers. A
        // resolver error aborts before any side effect touches disk.
        let roots: Vec<(String, String)> = validated
            .iter()
            .filter_map(|v| match v {
                Validated::Registry { key, range } => Some((
                    key.clone(),
                    range.clone().unwrap_or_else(|| "*".to_string()),
                )),
                _ => None,
            })
            .collect();
        let requested: HashMap<String, Option<String>> = validated
            .iter()
            .filter_map(|v| match v {
                Validated::Registry { key, range } => Some((key.clone(), range.clone())),
                _ => None,
            })
            .collect();

        let mut manifest = Manifest::load(&self.ctx.project_root)?;
        let mut lockfile = self.load_or_new_lockfile()?;

        if !roots.is_empty() {
            let resolution = Resolver::new(&self.registry).resolve(&roots);
            check_resolution(&resolution)?;
            self.execute_registry_plan(
                &resolution,
                &requested,
                &mut manifest,
                &mut lockfile,
                &mut report,
            );
        }

        for item in &validated {
            match item {
                Validated::Registry { .. } => {}
                Validated::GitHub { spec, fetch } => {
                    self.install_github(spec, fetch, true, &mut manifest, &mut lockfile, &mut report);
                }
                Validated::Local {
                    key,
                    raw_path,
                    skill,
                } => {
                    self.install_local(
                        key,
                        raw_path,
                        skill,
                        true,
                        &mut manifest,
                        &mut lockfile,
                        &mut report,
                    );
                }
            }
        }

        Ok(report)
    }

    /// Install everything the manifest declares.
    pub fn install(&self) -> Result<InstallReport> {
        if self.ctx.frozen {
            return self.frozen_install();
        }

        let mut manifest = Manifest::load(&self.ctx.project_root)?;
        let mut lockfile = self.load_or_new_lockfile()?;
        let mut report = InstallReport::default();

        let roots: Vec<(String, String)> = manifest
            .dependencies
            .iter()
            .map(|(key, range)| (key.clone(), range.clone()))
            .collect();
        let requested: HashMap<String, Option<String>> = manifest
            .dependencies
            .iter()
            .map(|(key, range)| (key.clone(), Some(range.clone())))
            .collect();

        if !roots.is_empty() {
            let resolution = Resolver::new(&self.registry).resolve(&roots);
            check_resolution(&resolution)?;
            self.execute_registry_plan(
                &resolution,
                &requested,
                &mut manifest,
                &mut lockfile,
                &mut report,
            );
        }

        let github_deps: Vec<(String, String)> = manifest
            .github_dependencies
            .iter()
            .map(|(key, git_ref)| (key.clone(), git_ref.clone()))
            .collect();
        for (key, git_ref) in github_deps {
            let spec = match Specifier::parse(&key) {
                Ok(spec) => spec,
                Err(err) => {
                    report.fail(&key, &err);
                    continue;
                }
            };
            match self.fetch_github_locked(&spec, &git_ref, &lockfile) {
                Ok(fetch) => {
                    self.install_github(&spec, &fetch, false, &mut manifest, &mut lockfile, &mut report);
                }
                Err(err) => report.fail(&key, &err),
            }
        }

        let local_deps: Vec<String> = manifest.local_dependencies.keys().cloned().collect();
        for key in local_deps {
            let raw_path = match Specifier::parse(&key) {
                Ok(Specifier::Local { path }) => path,
                Ok(_) | Err(_) => {
                    report.fail(
                        &key,
                        &PspmError::InvalidManifest(format!("bad local dependency key: {key}")),
                    );
                    continue;
                }
            };
            match local::validate(&self.ctx.project_root, &raw_path) {
                Ok(skill) => {
                    self.install_local(
                        &key,
                        &raw_path,
                        &skill,
                        false,
                        &mut manifest,
                        &mut lockfile,
                        &mut report,
                    );
                }
                Err(err) => report.fail(&key, &err),
            }
        }

        Ok(report)
    }

    /// Remove dependencies: manifest, lockfile, store payload, and agent
    /// links.
    pub fn remove(&self, names: &[String]) -> Result<InstallReport> {
        let mut manifest = Manifest::load(&self.ctx.project_root)?;
        let mut lockfile = self.load_or_new_lockfile()?;
        let mut report = InstallReport::default();
        let link_agents = self.ctx.link_agents();

        for raw in names {
            let key = Specifier::parse(raw)
                .map(|spec| spec.key())
                .unwrap_or_else(|_| raw.clone());

            // The local store entry is named after the skill, which for
            // local dependencies only the lockfile remembers.
            let skill_name = lockfile
                .local_packages
                .get(&key)
                .map(|entry| entry.name.clone())
                .or_else(|| Specifier::parse(&key).ok().map(|s| s.skill_name()));

            if !manifest.remove_dependency(&key) {
                report.fail(
                    raw,
                    &PspmError::SkillNotFound(format!("{key} is not a dependency")),
                );
                continue;
            }
            lockfile.remove(&key);

            if let Ok(store_rel) = store::store_path_for_key(&key) {
                let store_abs = self.ctx.project_root.join(store_rel);
                if let Ok(metadata) = store_abs.symlink_metadata() {
                    if metadata.is_symlink() {
                        std::fs::remove_file(&store_abs)?;
                    } else {
                        std::fs::remove_dir_all(&store_abs)?;
                    }
                }
            }

            if let Some(skill_name) = skill_name {
                let warnings = linker::unlink_skill(
                    &self.ctx.project_root,
                    &link_agents,
                    &manifest.agents,
                    &skill_name,
                )?;
                report.warnings.extend(warnings);
            }

            info!(key = %key, "removed dependency");
            report.installed.push(InstalledPackage {
                key,
                version: "removed".to_string(),
            });
        }

        manifest.save(&self.ctx.project_root)?;
        lockfile.save(&self.ctx.project_root)?;
        Ok(report)
    }

    /// Rebuild agent links from the lockfile without installing.
    pub fn link(&self) -> Result<InstallReport> {
        let mut report = InstallReport::default();
        let Some(lockfile) = Lockfile::load(&self.ctx.project_root)? else {
            return Ok(report);
        };
        let manifest = Manifest::load(&self.ctx.project_root)?;
        let link_agents = self.ctx.link_agents();
        if link_agents.is_empty() {
            return Ok(report);
        }

        let mut skills = Vec::new();
        for key in lockfile.packages.keys().chain(lockfile.github_packages.keys()) {
            if let (Ok(spec), Ok(store_rel)) =
                (Specifier::parse(key), store::store_path_for_key(key))
            {
                skills.push(InstalledSkill {
                    name: spec.skill_name(),
                    store_path: store_rel,
                });
            }
        }
        for entry in lockfile.local_packages.values() {
            skills.push(InstalledSkill {
                name: entry.name.clone(),
                store_path: PathBuf::from(store::SKILLS_DIR)
                    .join(store::LOCAL_NAMESPACE)
                    .join(&entry.name),
            });
        }

        let link_report = linker::link_skills(
            &self.ctx.project_root,
            &link_agents,
            &manifest.agents,
            &skills,
        )?;
        report.warnings.extend(link_report.warnings);
        Ok(report)
    }

    // ---- validation -----------------------------------------------------

    /// Parse and shape-check every specifier before anything else runs, so
    /// later steps (including agent selection) never fire for inputs that
    /// were doomed from the start.
    fn validate_specifiers(
        &self,
        specifiers: &[String],
        report: &mut InstallReport,
    ) -> Vec<Validated> {
        let mut validated = Vec::new();
        for raw in specifiers {
            let spec = match Specifier::parse(raw) {
                Ok(spec) => spec,
                Err(err) => {
                    report.fail(raw, &err);
                    continue;
                }
            };
            match spec {
                Specifier::Registry {
                    ref username,
                    ref name,
                    ref range,
                } => {
                    // Metadata lookup only; no payload bytes yet.
                    match self.registry.list_versions(username, name) {
                        Ok(list) => {
                            let available: Vec<String> =
                                list.into_iter().map(|v| v.version).collect();
                            let wanted = range.clone().unwrap_or_else(|| "*".to_string());
                            if versions::resolve(&wanted, &available).is_none() {
                                report.fail(
                                    raw,
                                    &PspmError::NoSatisfyingVersion {
                                        package: spec.key(),
                                        ranges: vec![wanted],
                                        available,
                                    },
                                );
                                continue;
                            }
                            validated.push(Validated::Registry {
                                key: spec.key(),
                                range: range.clone(),
                            });
                        }
                        Err(err) => report.fail(raw, &err),
                    }
                }
                Specifier::GitHub {
                    ref owner,
                    ref repo,
                    ref git_ref,
                    ..
                } => match self.github.fetch(owner, repo, git_ref.as_deref()) {
                    Ok(fetch) => validated.push(Validated::GitHub {
                        spec: spec.clone(),
                        fetch,
                    }),
                    Err(err) => report.fail(raw, &err),
                },
                Specifier::Local { ref path } => {
                    match local::validate(&self.ctx.project_root, path) {
                        Ok(skill) => validated.push(Validated::Local {
                            key: spec.key(),
                            raw_path: path.clone(),
                            skill,
                        }),
                        Err(err) => report.fail(raw, &err),
                    }
                }
            }
        }
        validated
    }

    // ---- registry plan --------------------------------------------------

    fn execute_registry_plan(
        &self,
        resolution: &Resolution,
        requested: &HashMap<String, Option<String>>,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
        report: &mut InstallReport,
    ) {
        for name in &resolution.install_order {
            let Some(node) = resolution.nodes.get(name) else {
                continue;
            };
            match self.install_registry_node(node, requested, manifest, lockfile) {
                Ok(warnings) => {
                    report.warnings.extend(warnings);
                    if let Some(message) = &node.deprecated {
                        report
                            .warnings
                            .push(format!("{} is deprecated: {message}", node.name));
                    }
                    report.installed.push(InstalledPackage {
                        key: node.name.clone(),
                        version: node.version.clone(),
                    });
                }
                Err(err) => report.fail(&node.name, &err),
            }
        }
    }

    fn install_registry_node(
        &self,
        node: &ResolvedNode,
        requested: &HashMap<String, Option<String>>,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
    ) -> Result<Vec<String>> {
        let bytes = self.fetch_registry_bytes(node)?;

        let store_rel = PathBuf::from(store::SKILLS_DIR)
            .join(&node.username)
            .join(&node.skill);
        extract::extract_registry_tarball(&bytes, &self.ctx.project_root.join(&store_rel))?;

        lockfile.packages.insert(
            node.name.clone(),
            RegistryEntry {
                version: node.version.clone(),
                resolved: node.download_url.clone(),
                integrity: node.integrity.clone(),
                deprecated: node.deprecated.clone(),
                dependencies: node.dependencies.clone(),
            },
        );
        lockfile.save(&self.ctx.project_root)?;

        if node.is_direct {
            let range = requested
                .get(&node.name)
                .cloned()
                .flatten()
                .unwrap_or_else(|| format!("^{}", node.version));
            if manifest.dependencies.get(&node.name) != Some(&range) {
                manifest.add_dependency(&node.name, range);
                manifest.save(&self.ctx.project_root)?;
            }
        }

        info!(name = %node.name, version = %node.version, "installed");
        self.link_one(manifest, &node.skill, &store_rel)
    }

    /// Cache-first byte acquisition with integrity-or-abort semantics.
    fn fetch_registry_bytes(&self, node: &ResolvedNode) -> Result<Vec<u8>> {
        if let Some(bytes) = self.cache.load(&node.integrity) {
            return Ok(bytes);
        }
        let fetched = fetcher::registry::fetch(
            &self.registry,
            &node.name,
            &node.version,
            &node.download_url,
            &node.integrity,
        )?;
        self.cache.store(&fetched.integrity, &fetched.bytes)?;
        Ok(fetched.bytes)
    }

    // ---- github ---------------------------------------------------------

    /// Reuse the locked commit and cached bytes when the requested ref is
    /// still the one the lockfile recorded; otherwise resolve afresh.
    fn fetch_github_locked(
        &self,
        spec: &Specifier,
        git_ref: &str,
        lockfile: &Lockfile,
    ) -> Result<GitHubFetch> {
        let Specifier::GitHub { owner, repo, .. } = spec else {
            return Err(PspmError::InvalidManifest(format!(
                "expected a github dependency key: {}",
                spec.key()
            )));
        };
        if let Some(entry) = lockfile.github_packages.get(&spec.key()) {
            if entry.git_ref == git_ref {
                let bytes = match self.cache.load(&entry.integrity) {
                    Some(bytes) => bytes,
                    None => {
                        let bytes = self.github.download_tarball(owner, repo, &entry.git_commit)?;
                        integrity::verify(&spec.key(), &bytes, &entry.integrity)?;
                        bytes
                    }
                };
                return Ok(GitHubFetch {
                    skill: crate::fetcher::FetchedSkill {
                        integrity: entry.integrity.clone(),
                        version: entry.version.clone(),
                        bytes,
                    },
                    commit: entry.git_commit.clone(),
                    git_ref: entry.git_ref.clone(),
                });
            }
        }
        let wanted = if git_ref.is_empty() { None } else { Some(git_ref) };
        self.github.fetch(owner, repo, wanted)
    }

    fn install_github(
        &self,
        spec: &Specifier,
        fetch: &GitHubFetch,
        save_manifest: bool,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
        report: &mut InstallReport,
    ) {
        let key = spec.key();
        match self.install_github_inner(spec, fetch, save_manifest, manifest, lockfile) {
            Ok(warnings) => {
                report.warnings.extend(warnings);
                report.installed.push(InstalledPackage {
                    key,
                    version: fetch.skill.version.clone(),
                });
            }
            Err(err) => report.fail(&key, &err),
        }
    }

    fn install_github_inner(
        &self,
        spec: &Specifier,
        fetch: &GitHubFetch,
        save_manifest: bool,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
    ) -> Result<Vec<String>> {
        let Specifier::GitHub {
            owner, repo, path, ..
        } = spec
        else {
            return Err(PspmError::InvalidManifest(format!(
                "expected a github dependency key: {}",
                spec.key()
            )));
        };
        let key = spec.key();

        self.cache.store(&fetch.skill.integrity, &fetch.skill.bytes)?;

        let store_rel = store::store_path(spec);
        extract::extract_github_tarball(
            &fetch.skill.bytes,
            &self.ctx.project_root.join(&store_rel),
            path.as_deref(),
        )?;

        lockfile.github_packages.insert(
            key.clone(),
            GitHubEntry {
                version: fetch.skill.version.clone(),
                resolved: format!("https://github.com/{owner}/{repo}"),
                integrity: fetch.skill.integrity.clone(),
                git_commit: fetch.commit.clone(),
                git_ref: fetch.git_ref.clone(),
            },
        );
        lockfile.save(&self.ctx.project_root)?;

        if save_manifest {
            manifest.add_github_dependency(&key, &fetch.git_ref);
            manifest.save(&self.ctx.project_root)?;
        }

        info!(key = %key, commit = %fetch.skill.version, "installed");
        self.link_one(manifest, &spec.skill_name(), &store_rel)
    }

    // ---- local ----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn install_local(
        &self,
        key: &str,
        raw_path: &str,
        skill: &LocalSkill,
        save_manifest: bool,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
        report: &mut InstallReport,
    ) {
        match self.install_local_inner(key, raw_path, skill, save_manifest, manifest, lockfile) {
            Ok(warnings) => {
                report.warnings.extend(warnings);
                report.installed.push(InstalledPackage {
                    key: key.to_string(),
                    version: "local".to_string(),
                });
            }
            Err(err) => report.fail(key, &err),
        }
    }

    fn install_local_inner(
        &self,
        key: &str,
        raw_path: &str,
        skill: &LocalSkill,
        save_manifest: bool,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
    ) -> Result<Vec<String>> {
        let store_rel = self.place_local_symlink(skill)?;

        lockfile.local_packages.insert(
            key.to_string(),
            LocalEntry {
                version: "local".to_string(),
                path: raw_path.to_string(),
                resolved_path: skill.resolved_path.display().to_string(),
                name: skill.name.clone(),
            },
        );
        lockfile.save(&self.ctx.project_root)?;

        if save_manifest {
            manifest.add_local_dependency(key);
            manifest.save(&self.ctx.project_root)?;
        }

        info!(key = %key, "linked local skill");
        self.link_one(manifest, &skill.name, &store_rel)
    }

    /// Place the store symlink for a local skill. Local skills are never
    /// copied: the store carries one relative symlink to the skill's real
    /// directory. Returns the store path relative to the project root.
    fn place_local_symlink(&self, skill: &LocalSkill) -> Result<PathBuf> {
        let store_rel = PathBuf::from(store::SKILLS_DIR)
            .join(store::LOCAL_NAMESPACE)
            .join(&skill.name);
        let store_abs = self.ctx.project_root.join(&store_rel);
        let store_parent = self
            .ctx
            .project_root
            .join(store::SKILLS_DIR)
            .join(store::LOCAL_NAMESPACE);
        crate::utils::fs::ensure_dir(&store_parent)?;

        let target = relative_path_from(&store_parent, &skill.resolved_path);
        match store_abs.symlink_metadata() {
            Ok(metadata) if metadata.is_symlink() => std::fs::remove_file(&store_abs)?,
            Ok(_) => std::fs::remove_dir_all(&store_abs)?,
            Err(_) => {}
        }
        create_symlink(&target, &store_abs)?;
        Ok(store_rel)
    }

    // ---- frozen ---------------------------------------------------------

    fn frozen_install(&self) -> Result<InstallReport> {
        let manifest = Manifest::load(&self.ctx.project_root)?;
        let lockfile = Lockfile::load(&self.ctx.project_root)?.ok_or_else(|| {
            PspmError::FrozenLockfile("no lockfile found".to_string())
        })?;
        let mut report = InstallReport::default();

        for key in manifest.dependencies.keys() {
            if !lockfile.packages.contains_key(key) {
                return Err(PspmError::FrozenLockfile(format!(
                    "{key} is not in the lockfile"
                )));
            }
        }
        for key in manifest.github_dependencies.keys() {
            if !lockfile.github_packages.contains_key(key) {
                return Err(PspmError::FrozenLockfile(format!(
                    "{key} is not in the lockfile"
                )));
            }
        }
        for key in manifest.local_dependencies.keys() {
            if !lockfile.local_packages.contains_key(key) {
                return Err(PspmError::FrozenLockfile(format!(
                    "{key} is not in the lockfile"
                )));
            }
        }

        // The lockfile's per-entry dependencies reconstruct the install
        // order without touching the registry.
        for key in lockfile_install_order(&lockfile.packages) {
            let entry = &lockfile.packages[&key];
            match self.frozen_registry_package(&key, entry, &manifest) {
                Ok(warnings) => {
                    report.warnings.extend(warnings);
                    report.installed.push(InstalledPackage {
                        key: key.clone(),
                        version: entry.version.clone(),
                    });
                }
                Err(err @ PspmError::IntegrityMismatch { .. }) => return Err(err),
                Err(err) => report.fail(&key, &err),
            }
        }

        for (key, entry) in &lockfile.github_packages {
            match self.frozen_github_package(key, entry, &manifest) {
                Ok(warnings) => {
                    report.warnings.extend(warnings);
                    report.installed.push(InstalledPackage {
                        key: key.clone(),
                        version: entry.version.clone(),
                    });
                }
                Err(err @ PspmError::IntegrityMismatch { .. }) => return Err(err),
                Err(err) => report.fail(key, &err),
            }
        }

        for (key, entry) in &lockfile.local_packages {
            let outcome = local::validate(&self.ctx.project_root, &entry.path)
                .and_then(|skill| {
                    self.place_local_symlink(&skill)
                        .and_then(|store_rel| self.link_one(&manifest, &skill.name, &store_rel))
                });
            match outcome {
                Ok(warnings) => {
                    report.warnings.extend(warnings);
                    report.installed.push(InstalledPackage {
                        key: key.clone(),
                        version: "local".to_string(),
                    });
                }
                Err(err) => report.fail(key, &err),
            }
        }

        Ok(report)
    }

    fn frozen_registry_package(
        &self,
        key: &str,
        entry: &RegistryEntry,
        manifest: &Manifest,
    ) -> Result<Vec<String>> {
        let bytes = match self.cache.load(&entry.integrity) {
            Some(bytes) => bytes,
            None => {
                // Network is permitted: the target is fully identified by
                // resolved + integrity.
                let fetched = fetcher::registry::fetch(
                    &self.registry,
                    key,
                    &entry.version,
                    &entry.resolved,
                    &entry.integrity,
                )?;
                self.cache.store(&fetched.integrity, &fetched.bytes)?;
                fetched.bytes
            }
        };

        let store_rel = store::store_path_for_key(key)?;
        extract::extract_registry_tarball(&bytes, &self.ctx.project_root.join(&store_rel))?;

        let skill_name = Specifier::parse(key)?.skill_name();
        self.link_one(manifest, &skill_name, &store_rel)
    }

    fn frozen_github_package(
        &self,
        key: &str,
        entry: &GitHubEntry,
        manifest: &Manifest,
    ) -> Result<Vec<String>> {
        let spec = Specifier::parse(key)?;
        let Specifier::GitHub {
            ref owner,
            ref repo,
            ref path,
            ..
        } = spec
        else {
            return Err(PspmError::InvalidLockfile(format!(
                "unexpected github key: {key}"
            )));
        };

        let bytes = match self.cache.load(&entry.integrity) {
            Some(bytes) => bytes,
            None => {
                let bytes = self.github.download_tarball(owner, repo, &entry.git_commit)?;
                integrity::verify(key, &bytes, &entry.integrity)?;
                self.cache.store(&entry.integrity, &bytes)?;
                bytes
            }
        };

        let store_rel = store::store_path(&spec);
        extract::extract_github_tarball(
            &bytes,
            &self.ctx.project_root.join(&store_rel),
            path.as_deref(),
        )?;

        self.link_one(manifest, &spec.skill_name(), &store_rel)
    }

    // ---- shared ---------------------------------------------------------

    fn link_one(
        &self,
        manifest: &Manifest,
        skill_name: &str,
        store_rel: &Path,
    ) -> Result<Vec<String>> {
        let link_agents = self.ctx.link_agents();
        if link_agents.is_empty() {
            return Ok(Vec::new());
        }
        let link_report = linker::link_skills(
            &self.ctx.project_root,
            &link_agents,
            &manifest.agents,
            &[InstalledSkill {
                name: skill_name.to_string(),
                store_path: store_rel.to_path_buf(),
            }],
        )?;
        Ok(link_report.warnings)
    }

    fn load_or_new_lockfile(&self) -> Result<Lockfile> {
        Ok(Lockfile::load(&self.ctx.project_root)?
            .unwrap_or_else(|| Lockfile::new(&self.ctx.registry_url)))
    }
}

/// Map a failed resolution to the error that aborts the run. Conflicts win
/// because they carry the most actionable report.
fn check_resolution(resolution: &Resolution) -> Result<()> {
    use crate::resolver::ResolveError;

    if resolution.success {
        return Ok(());
    }
    if let Some(conflict) = resolution.conflicts.first() {
        return Err(conflict.to_error());
    }
    match resolution.errors.first() {
        Some(ResolveError::CircularDependency { path }) => {
            Err(PspmError::CircularDependency(path.clone()))
        }
        Some(ResolveError::MaxDepthExceeded { path }) => {
            Err(PspmError::MaxDepthExceeded(path.clone()))
        }
        Some(ResolveError::PackageNotFound { name, dependent }) => Err(PspmError::SkillNotFound(
            format!("{name} (required by {dependent})"),
        )),
        Some(ResolveError::NoSatisfyingVersion {
            name,
            ranges,
            available,
        }) => Err(PspmError::NoSatisfyingVersion {
            package: name.clone(),
            ranges: ranges.clone(),
            available: available.clone(),
        }),
        Some(err @ ResolveError::FetchError { .. }) => Err(PspmError::Http(err.to_string())),
        None => Err(PspmError::Http("resolution failed".to_string())),
    }
}

/// Kahn's algorithm over lockfile entries, using the recorded per-entry
/// dependency maps. Edges to absent packages are ignored.
fn lockfile_install_order(
    packages: &std::collections::BTreeMap<String, RegistryEntry>,
) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> =
        packages.keys().map(|key| (key.as_str(), 0)).collect();
    let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();

    for (key, entry) in packages {
        for dep in entry.dependencies.keys() {
            if !packages.contains_key(dep) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(key.as_str()) {
                *degree += 1;
            }
            dependents_of
                .entry(dep.as_str())
                .or_default()
                .push(key.as_str());
        }
    }

    let mut queue: VecDeque<&str> = packages
        .keys()
        .filter(|key| in_degree[key.as_str()] == 0)
        .map(String::as_str)
        .collect();
    let mut order = Vec::with_capacity(packages.len());
    while let Some(key) = queue.pop_front() {
        order.push(key.to_string());
        if let Some(dependents) = dependents_of.get(key) {
            for &dependent in dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }
    for key in packages.keys() {
        if !order.contains(key) {
            order.push(key.clone());
        }
    }
    order
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
