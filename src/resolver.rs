//! Recursive registry dependency resolution.
//!
//! Only registry dependencies resolve recursively; GitHub and local
//! dependencies are leaves handled by the orchestrator. Resolution runs in
//! three phases:
//!
//! 1. BFS collection: walk the dependency graph breadth-first, collecting
//!    every `(range, dependent)` requirement per package and building a
//!    provisional node per package from its first-seen range.
//! 2. Finalisation: re-select each package's version against all collected
//!    ranges at once, re-fetching metadata when the selection moved.
//! 3. Topological sort (Kahn), so dependencies install before dependents.
//!
//! Diagnostics accumulate instead of aborting: one run reports every
//! missing package, unsatisfiable range, cycle, and conflict it found.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use tracing::debug;

use crate::error::{PspmError, Result};
use crate::integrity;
use crate::registry::RegistryApi;
use crate::specifier::Specifier;
use crate::versions;

pub const DEFAULT_MAX_DEPTH: usize = 5;

/// One collected requirement on a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub range: String,
    /// Identity of the requiring package, or `"root"`.
    pub dependent: String,
    pub depth: usize,
}

/// A fully resolved registry package.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// Identity key, `@user/<username>/<name>`.
    pub name: String,
    pub username: String,
    pub skill: String,
    pub version: String,
    pub download_url: String,
    pub integrity: String,
    /// Immediate dependencies: identity -> range.
    pub dependencies: BTreeMap<String, String>,
    /// Depth of first discovery (0 for roots).
    pub depth: usize,
    pub dependents: Vec<String>,
    pub is_direct: bool,
    pub deprecated: Option<String>,
}

/// A non-fatal diagnostic recorded during resolution.
#[derive(Debug, Clone)]
pub enum ResolveError {
    MaxDepthExceeded {
        path: Vec<String>,
    },
    CircularDependency {
        path: Vec<String>,
    },
    PackageNotFound {
        name: String,
        dependent: String,
    },
    FetchError {
        name: String,
        detail: String,
    },
    NoSatisfyingVersion {
        name: String,
        ranges: Vec<String>,
        available: Vec<String>,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxDepthExceeded { path } => {
                write!(f, "dependency chain too deep: {}", path.join(" -> "))
            }
            Self::CircularDependency { path } => {
                write!(f, "circular dependency: {}", path.join(" -> "))
            }
            Self::PackageNotFound { name, dependent } => {
                write!(f, "{name} not found (required by {dependent})")
            }
            Self::FetchError { name, detail } => write!(f, "failed to fetch {name}: {detail}"),
            Self::NoSatisfyingVersion {
                name,
                ranges,
                available,
            } => write!(
                f,
                "no version of {name} satisfies {} (available: {})",
                ranges.join(", "),
                available.join(", ")
            ),
        }
    }
}

/// A multi-range conflict, carrying its full witness list.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub package: String,
    pub witnesses: Vec<(String, String)>,
    pub available: Vec<String>,
}

impl VersionConflict {
    #[must_use]
    pub fn to_error(&self) -> PspmError {
        PspmError::VersionConflict {
            package: self.package.clone(),
            witnesses: self.witnesses.clone(),
            available: self.available.clone(),
        }
    }
}

/// The outcome of a resolver run.
#[derive(Debug)]
pub struct Resolution {
    pub success: bool,
    pub nodes: HashMap<String, ResolvedNode>,
    pub roots: Vec<String>,
    pub errors: Vec<ResolveError>,
    pub conflicts: Vec<VersionConflict>,
    /// Node identities in install order, dependencies before dependents.
    pub install_order: Vec<String>,
}

pub struct Resolver<'a, R: RegistryApi> {
    registry: &'a R,
    max_depth: usize,
}

struct QueueEntry {
    name: String,
    range: String,
    depth: usize,
    dependent: String,
    path: Vec<String>,
}

impl<'a, R: RegistryApi> Resolver<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve a set of root dependencies (identity -> range), in order.
    pub fn resolve(&self, roots: &[(String, String)]) -> Resolution {
        let mut ranges_by_package: HashMap<String, Vec<RangeRequest>> = HashMap::new();
        let mut package_order: Vec<String> = Vec::new();
        let mut versions_by_package: HashMap<String, Vec<String>> = HashMap::new();
        let mut nodes: HashMap<String, ResolvedNode> = HashMap::new();
        let mut errors: Vec<ResolveError> = Vec::new();
        let mut conflicts: Vec<VersionConflict> = Vec::new();

        // Phase 1: BFS collection.
        let mut queue: VecDeque<QueueEntry> = roots
            .iter()
            .map(|(name, range)| QueueEntry {
                name: name.clone(),
                range: range.clone(),
                depth: 0,
                dependent: "root".to_string(),
                path: Vec::new(),
            })
            .collect();

        while let Some(entry) = queue.pop_front() {
            let mut chain = entry.path.clone();
            chain.push(entry.name.clone());

            if entry.depth > self.max_depth {
                errors.push(ResolveError::MaxDepthExceeded { path: chain });
                continue;
            }
            if entry.path.contains(&entry.name) {
                errors.push(ResolveError::CircularDependency { path: chain });
                continue;
            }

            if !ranges_by_package.contains_key(&entry.name) {
                package_order.push(entry.name.clone());
            }
            ranges_by_package
                .entry(entry.name.clone())
                .or_default()
                .push(RangeRequest {
                    range: entry.range.clone(),
                    dependent: entry.dependent.clone(),
                    depth: entry.depth,
                });

            if let Some(node) = nodes.get_mut(&entry.name) {
                // Ranges keep accumulating; the graph node is built once.
                if !node.dependents.contains(&entry.dependent) {
                    node.dependents.push(entry.dependent.clone());
                }
                continue;
            }

            // Shortcut before hitting the registry: a range set that is
            // provably disjoint will never finalise, so the round-trip is
            // skipped and the conflict recorded here.
            let requests = &ranges_by_package[&entry.name];
            if requests.len() > 1 {
                let collected: Vec<String> =
                    requests.iter().map(|r| r.range.clone()).collect();
                if !versions::intersects(&collected) {
                    if !conflicts.iter().any(|c| c.package == entry.name) {
                        conflicts.push(VersionConflict {
                            package: entry.name.clone(),
                            witnesses: requests
                                .iter()
                                .map(|r| (r.dependent.clone(), r.range.clone()))
                                .collect(),
                            available: versions_by_package
                                .get(&entry.name)
                                .cloned()
                                .unwrap_or_default(),
                        });
                    }
                    continue;
                }
            }

            let (username, skill) = match identity_parts(&entry.name) {
                Ok(parts) => parts,
                Err(err) => {
                    errors.push(ResolveError::FetchError {
                        name: entry.name.clone(),
                        detail: err.to_string(),
                    });
                    continue;
                }
            };

            let available = match self.registry.list_versions(&username, &skill) {
                Ok(list) => list.into_iter().map(|v| v.version).collect::<Vec<_>>(),
                Err(PspmError::SkillNotFound(_)) => {
                    errors.push(ResolveError::PackageNotFound {
                        name: entry.name.clone(),
                        dependent: entry.dependent.clone(),
                    });
                    continue;
                }
                Err(err) => {
                    errors.push(ResolveError::FetchError {
                        name: entry.name.clone(),
                        detail: err.to_string(),
                    });
                    continue;
                }
            };
            versions_by_package.insert(entry.name.clone(), available.clone());

            let Some(provisional) =
                versions::resolve(&entry.range, &available)
            else {
                errors.push(ResolveError::NoSatisfyingVersion {
                    name: entry.name.clone(),
                    ranges: vec![entry.range.clone()],
                    available,
                });
                continue;
            };
            let provisional = provisional.to_string();

            let metadata = match self.registry.get_version(&username, &skill, &provisional) {
                Ok(metadata) => metadata,
                Err(err) => {
                    errors.push(ResolveError::FetchError {
                        name: entry.name.clone(),
                        detail: err.to_string(),
                    });
                    continue;
                }
            };
            let node_integrity = match integrity::from_hex_checksum(&metadata.checksum) {
                Ok(value) => value,
                Err(err) => {
                    errors.push(ResolveError::FetchError {
                        name: entry.name.clone(),
                        detail: err.to_string(),
                    });
                    continue;
                }
            };

            debug!(name = %entry.name, version = %provisional, depth = entry.depth, "resolved node");
            nodes.insert(
                entry.name.clone(),
                ResolvedNode {
                    name: entry.name.clone(),
                    username,
                    skill,
                    version: provisional,
                    download_url: metadata.download_url,
                    integrity: node_integrity,
                    dependencies: metadata.manifest.dependencies.clone(),
                    depth: entry.depth,
                    dependents: vec![entry.dependent.clone()],
                    is_direct: entry.depth == 0,
                    deprecated: metadata.deprecation_message,
                },
            );

            for (dep_name, dep_range) in metadata.manifest.dependencies {
                queue.push_back(QueueEntry {
                    name: dep_name,
                    range: dep_range,
                    depth: entry.depth + 1,
                    dependent: entry.name.clone(),
                    path: chain.clone(),
                });
            }
        }

        // Phase 2: multi-range finalisation.
        for name in &package_order {
            let Some(requests) = ranges_by_package.get(name) else {
                continue;
            };
            if !nodes.contains_key(name) {
                continue;
            }
            let available = versions_by_package.get(name).cloned().unwrap_or_default();
            let ranges: Vec<String> = requests.iter().map(|r| r.range.clone()).collect();

            let Some(final_version) = versions::find_highest_satisfying(&ranges, &available)
            else {
                // Keep the stale node so reporting can list everything.
                conflicts.push(VersionConflict {
                    package: name.clone(),
                    witnesses: requests
                        .iter()
                        .map(|r| (r.dependent.clone(), r.range.clone()))
                        .collect(),
                    available: available.clone(),
                });
                errors.push(ResolveError::NoSatisfyingVersion {
                    name: name.clone(),
                    ranges,
                    available,
                });
                continue;
            };
            let final_version = final_version.to_string();

            let needs_refetch = nodes
                .get(name)
                .is_some_and(|node| node.version != final_version);
            if needs_refetch {
                debug!(name = %name, version = %final_version, "finalised to a different version");
                let (username, skill) = match identity_parts(name) {
                    Ok(parts) => parts,
                    Err(_) => continue,
                };
                match self.registry.get_version(&username, &skill, &final_version) {
                    Ok(metadata) => {
                        let node_integrity = match integrity::from_hex_checksum(&metadata.checksum)
                        {
                            Ok(value) => value,
                            Err(err) => {
                                errors.push(ResolveError::FetchError {
                                    name: name.clone(),
                                    detail: err.to_string(),
                                });
                                continue;
                            }
                        };
                        if let Some(node) = nodes.get_mut(name) {
                            node.version = final_version;
                            node.download_url = metadata.download_url;
                            node.integrity = node_integrity;
                            node.dependencies = metadata.manifest.dependencies;
                            node.deprecated = metadata.deprecation_message;
                        }
                    }
                    Err(err) => {
                        errors.push(ResolveError::FetchError {
                            name: name.clone(),
                            detail: err.to_string(),
                        });
                    }
                }
            }
        }

        // Phase 3: topological sort (Kahn). Edges outside the graph are
        // ignored; ties break by first-discovery order.
        let install_order = topological_sort(&nodes, &package_order);

        Resolution {
            success: errors.is_empty() && conflicts.is_empty(),
            roots: roots.iter().map(|(name, _)| name.clone()).collect(),
            nodes,
            errors,
            conflicts,
            install_order,
        }
    }
}

fn topological_sort(
    nodes: &HashMap<String, ResolvedNode>,
    package_order: &[String],
) -> Vec<String> {
    let present: Vec<&String> = package_order
        .iter()
        .filter(|name| nodes.contains_key(*name))
        .collect();

    let mut in_degree: HashMap<&str, usize> = present
        .iter()
        .map(|name| (name.as_str(), 0))
        .collect();
    // dependency -> dependents, so finishing a dependency releases its users.
    let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();

    for name in &present {
        let node = &nodes[*name];
        for dep in node.dependencies.keys() {
            if !nodes.contains_key(dep) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(name.as_str()) {
                *degree += 1;
            }
            dependents_of
                .entry(dep.as_str())
                .or_default()
                .push(name.as_str());
        }
    }

    let mut queue: VecDeque<&str> = present
        .iter()
        .filter(|name| in_degree[name.as_str()] == 0)
        .map(|name| name.as_str())
        .collect();

    let mut order = Vec::with_capacity(present.len());
    while let Some(name) = queue.pop_front() {
        order.push(name.to_string());
        if let Some(dependents) = dependents_of.get(name) {
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

    // Cycle members never reach zero in-degree; append them so reporting
    // still sees every node (the cycle itself is already recorded).
    for name in &present {
        if !order.iter().any(|done| done == *name) {
            order.push((*name).clone());
        }
    }
    order
}

fn identity_parts(identity: &str) -> Result<(String, String)> {
    match Specifier::parse(identity)? {
        Specifier::Registry { username, name, .. } => Ok((username, name)),
        _ => Err(PspmError::InvalidSpecifier {
            input: identity.to_string(),
            reason: "expected a registry identity".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{VersionManifest, VersionMetadata, VersionSummary};
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;

    /// In-memory registry fake for resolver tests.
    #[derive(Default)]
    struct FakeRegistry {
        versions: HashMap<String, Vec<String>>,
        metadata: HashMap<String, VersionMetadata>,
        deprecations: HashMap<String, String>,
        version_lookups: std::cell::RefCell<Vec<String>>,
    }

    impl FakeRegistry {
        fn publish(&mut self, identity: &str, version: &str, deps: &[(&str, &str)]) {
            self.versions
                .entry(identity.to_string())
                .or_default()
                .push(version.to_string());
            let mut dependencies = BTreeMap::new();
            for (name, range) in deps {
                dependencies.insert((*name).to_string(), (*range).to_string());
            }
            let mut hasher = Sha256::new();
            hasher.update(identity.as_bytes());
            hasher.update(version.as_bytes());
            self.metadata.insert(
                format!("{identity}@{version}"),
                VersionMetadata {
                    download_url: format!("https://cdn.example/{identity}/{version}.tgz"),
                    checksum: hex::encode(hasher.finalize()),
                    manifest: VersionManifest { dependencies },
                    deprecation_message: self.deprecations.get(identity).cloned(),
                },
            );
        }

        fn deprecate(&mut self, identity: &str, version: &str, message: &str) {
            if let Some(meta) = self.metadata.get_mut(&format!("{identity}@{version}")) {
                meta.deprecation_message = Some(message.to_string());
            }
        }
    }

    impl RegistryApi for FakeRegistry {
        fn list_versions(&self, username: &str, name: &str) -> crate::error::Result<Vec<VersionSummary>> {
            let identity = format!("@user/{username}/{name}");
            self.version_lookups.borrow_mut().push(identity.clone());
            match self.versions.get(&identity) {
                Some(list) => Ok(list
                    .iter()
                    .map(|v| VersionSummary { version: v.clone() })
                    .collect()),
                None => Err(PspmError::SkillNotFound(identity)),
            }
        }

        fn get_version(
            &self,
            username: &str,
            name: &str,
            version: &str,
        ) -> crate::error::Result<VersionMetadata> {
            let key = format!("@user/{username}/{name}@{version}");
            self.metadata
                .get(&key)
                .cloned()
                .ok_or_else(|| PspmError::SkillNotFound(key))
        }
    }

    fn roots(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(name, range)| ((*name).to_string(), (*range).to_string()))
            .collect()
    }

    #[test]
    fn single_root_resolves_highest_satisfying() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/a", "1.0.0", &[]);
        registry.publish("@user/alice/a", "1.1.0", &[]);
        registry.publish("@user/alice/a", "2.0.0", &[]);

        let resolution =
            Resolver::new(&registry).resolve(&roots(&[("@user/alice/a", "^1.0.0")]));
        assert!(resolution.success);
        assert_eq!(resolution.nodes["@user/alice/a"].version, "1.1.0");
        assert!(resolution.nodes["@user/alice/a"].is_direct);
        assert_eq!(resolution.install_order, vec!["@user/alice/a".to_string()]);
    }

    #[test]
    fn diamond_picks_highest_joint_version_and_orders_dep_first() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/a", "1.0.0", &[("@user/alice/u", "^1.0.0")]);
        registry.publish("@user/bob/b", "1.0.0", &[("@user/alice/u", ">=1.2.0")]);
        for version in ["1.0.0", "1.1.0", "1.2.0", "1.3.0"] {
            registry.publish("@user/alice/u", version, &[]);
        }

        let resolution = Resolver::new(&registry)
            .resolve(&roots(&[("@user/alice/a", "^1"), ("@user/bob/b", "^1")]));
        assert!(resolution.success, "errors: {:?}", resolution.errors);
        assert_eq!(resolution.nodes["@user/alice/u"].version, "1.3.0");

        let order = &resolution.install_order;
        let index = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(index("@user/alice/u") < index("@user/alice/a"));
        assert!(index("@user/alice/u") < index("@user/bob/b"));

        // Both dependents are recorded on the shared node.
        let dependents = &resolution.nodes["@user/alice/u"].dependents;
        assert!(dependents.contains(&"@user/alice/a".to_string()));
        assert!(dependents.contains(&"@user/bob/b".to_string()));
    }

    #[test]
    fn finalisation_downgrades_when_later_range_is_tighter() {
        let mut registry = FakeRegistry::default();
        // Root a is seen first and provisionally picks u@1.3.0; root b's
        // tighter range forces the joint selection down to 1.1.x.
        registry.publish("@user/alice/a", "1.0.0", &[("@user/alice/u", "^1.0.0")]);
        registry.publish("@user/bob/b", "1.0.0", &[("@user/alice/u", "~1.1.0")]);
        for version in ["1.0.0", "1.1.0", "1.1.5", "1.3.0"] {
            registry.publish("@user/alice/u", version, &[]);
        }

        let resolution = Resolver::new(&registry)
            .resolve(&roots(&[("@user/alice/a", "*"), ("@user/bob/b", "*")]));
        assert!(resolution.success, "errors: {:?}", resolution.errors);
        assert_eq!(resolution.nodes["@user/alice/u"].version, "1.1.5");
    }

    #[test]
    fn disjoint_ranges_surface_conflict_with_witnesses() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/a", "1.0.0", &[("@user/alice/u", "^1.0.0")]);
        registry.publish("@user/bob/b", "1.0.0", &[("@user/alice/u", "^2.0.0")]);
        registry.publish("@user/alice/u", "1.0.0", &[]);
        registry.publish("@user/alice/u", "2.0.0", &[]);

        let resolution = Resolver::new(&registry)
            .resolve(&roots(&[("@user/alice/a", "1"), ("@user/bob/b", "1")]));
        assert!(!resolution.success);
        assert_eq!(resolution.conflicts.len(), 1);

        let conflict = &resolution.conflicts[0];
        assert_eq!(conflict.package, "@user/alice/u");
        assert!(conflict
            .witnesses
            .contains(&("@user/alice/a".to_string(), "^1.0.0".to_string())));
        assert!(conflict
            .witnesses
            .contains(&("@user/bob/b".to_string(), "^2.0.0".to_string())));
        assert_eq!(conflict.available, vec!["1.0.0", "2.0.0"]);

        // The stale node is kept so reporting can list everything.
        assert!(resolution.nodes.contains_key("@user/alice/u"));
    }

    #[test]
    fn disjoint_pins_skip_the_repeat_registry_lookup() {
        let mut registry = FakeRegistry::default();
        // Neither pin on u exists, so the first requirement fails without
        // building a node; the second requirement's pin is provably
        // disjoint with the first and must not trigger another lookup.
        registry.publish("@user/alice/a", "1.0.0", &[("@user/carol/u", "3.0.0")]);
        registry.publish("@user/bob/b", "1.0.0", &[("@user/carol/u", "2.0.0")]);
        registry.publish("@user/carol/u", "1.0.0", &[]);

        let resolution = Resolver::new(&registry)
            .resolve(&roots(&[("@user/alice/a", "*"), ("@user/bob/b", "*")]));
        assert!(!resolution.success);

        let conflict = resolution
            .conflicts
            .iter()
            .find(|c| c.package == "@user/carol/u")
            .expect("conflict for @user/carol/u");
        assert!(conflict
            .witnesses
            .contains(&("@user/alice/a".to_string(), "3.0.0".to_string())));
        assert!(conflict
            .witnesses
            .contains(&("@user/bob/b".to_string(), "2.0.0".to_string())));

        let lookups_for_u = registry
            .version_lookups
            .borrow()
            .iter()
            .filter(|identity| identity.as_str() == "@user/carol/u")
            .count();
        assert_eq!(lookups_for_u, 1);
    }

    #[test]
    fn cycle_is_recorded_once_with_its_path() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/x", "1.0.0", &[("@user/alice/y", "*")]);
        registry.publish("@user/alice/y", "1.0.0", &[("@user/alice/x", "*")]);

        let resolution = Resolver::new(&registry).resolve(&roots(&[("@user/alice/x", "*")]));
        assert!(!resolution.success);
        let cycles: Vec<_> = resolution
            .errors
            .iter()
            .filter_map(|err| match err {
                ResolveError::CircularDependency { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(
            cycles[0],
            vec!["@user/alice/x", "@user/alice/y", "@user/alice/x"]
        );
    }

    #[test]
    fn chains_beyond_max_depth_are_cut_off() {
        let mut registry = FakeRegistry::default();
        for i in 0..4 {
            registry.publish(
                &format!("@user/alice/s{i}"),
                "1.0.0",
                &[(&format!("@user/alice/s{}", i + 1), "*")],
            );
        }
        registry.publish("@user/alice/s4", "1.0.0", &[]);

        let resolution = Resolver::new(&registry)
            .with_max_depth(2)
            .resolve(&roots(&[("@user/alice/s0", "*")]));
        assert!(!resolution.success);
        assert!(resolution
            .errors
            .iter()
            .any(|err| matches!(err, ResolveError::MaxDepthExceeded { .. })));
    }

    #[test]
    fn missing_package_reports_its_dependent() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/a", "1.0.0", &[("@user/alice/ghost", "*")]);

        let resolution = Resolver::new(&registry).resolve(&roots(&[("@user/alice/a", "*")]));
        assert!(!resolution.success);
        assert!(resolution.errors.iter().any(|err| matches!(
            err,
            ResolveError::PackageNotFound { name, dependent }
                if name == "@user/alice/ghost" && dependent == "@user/alice/a"
        )));
    }

    #[test]
    fn unsatisfiable_single_range_lists_available_versions() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/a", "1.0.0", &[]);

        let resolution =
            Resolver::new(&registry).resolve(&roots(&[("@user/alice/a", "^3.0.0")]));
        assert!(!resolution.success);
        assert!(resolution.errors.iter().any(|err| matches!(
            err,
            ResolveError::NoSatisfyingVersion { name, available, .. }
                if name == "@user/alice/a" && available == &vec!["1.0.0".to_string()]
        )));
    }

    #[test]
    fn deprecated_selection_still_resolves_and_carries_message() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/old", "1.0.0", &[]);
        registry.deprecate("@user/alice/old", "1.0.0", "use @user/alice/new");

        let resolution = Resolver::new(&registry).resolve(&roots(&[("@user/alice/old", "*")]));
        assert!(resolution.success);
        assert_eq!(
            resolution.nodes["@user/alice/old"].deprecated.as_deref(),
            Some("use @user/alice/new")
        );
    }

    #[test]
    fn install_order_is_deterministic_across_runs() {
        let mut registry = FakeRegistry::default();
        registry.publish("@user/alice/a", "1.0.0", &[("@user/alice/u", "*")]);
        registry.publish("@user/bob/b", "1.0.0", &[("@user/alice/u", "*")]);
        registry.publish("@user/alice/u", "1.0.0", &[]);

        let run = || {
            Resolver::new(&registry)
                .resolve(&roots(&[("@user/alice/a", "*"), ("@user/bob/b", "*")]))
                .install_order
        };
        let first = run();
        for _ in 0..5 {
            assert_eq!(run(), first);
        }
        assert_eq!(
            first,
            vec![
                "@user/alice/u".to_string(),
                "@user/alice/a".to_string(),
                "@user/bob/b".to_string()
            ]
        );
    }
}
