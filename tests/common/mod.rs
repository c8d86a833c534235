//! Shared fixtures for integration tests.

use flate2::write::GzEncoder;
use flate2::Compression;
use httpmock::prelude::*;
use sha2::{Digest, Sha256};

/// Build a gzipped tarball from `(path, contents)` pairs.
pub fn build_tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn hex_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A published skill version on the mock registry.
pub struct MockSkill {
    pub username: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub all_versions: Vec<&'static str>,
    pub dependencies: Vec<(&'static str, &'static str)>,
    pub tarball: Vec<u8>,
}

impl MockSkill {
    pub fn new(username: &'static str, name: &'static str, version: &'static str) -> Self {
        Self {
            username,
            name,
            version,
            all_versions: vec![version],
            dependencies: Vec::new(),
            tarball: build_tarball(&[("package/SKILL.md", "# skill")]),
        }
    }

    pub fn with_versions(mut self, versions: Vec<&'static str>) -> Self {
        self.all_versions = versions;
        self
    }

    pub fn with_dependency(mut self, name: &'static str, range: &'static str) -> Self {
        self.dependencies.push((name, range));
        self
    }

    pub fn with_files(mut self, files: &[(&str, &str)]) -> Self {
        self.tarball = build_tarball(files);
        self
    }
}

/// Register versions-list, metadata, and download endpoints for a skill.
pub fn mount_skill(server: &MockServer, skill: &MockSkill) {
    let versions: Vec<serde_json::Value> = skill
        .all_versions
        .iter()
        .map(|v| serde_json::json!({ "version": v }))
        .collect();
    server.mock(|when, then| {
        when.method(GET).path(format!(
            "/api/skills/{}/{}/versions",
            skill.username, skill.name
        ));
        then.status(200).json_body(serde_json::json!(versions));
    });

    let download_path = format!(
        "/download/{}/{}/{}.tgz",
        skill.username, skill.name, skill.version
    );
    let dependencies: serde_json::Map<String, serde_json::Value> = skill
        .dependencies
        .iter()
        .map(|(name, range)| ((*name).to_string(), serde_json::json!(range)))
        .collect();
    server.mock(|when, then| {
        when.method(GET).path(format!(
            "/api/skills/{}/{}/{}",
            skill.username, skill.name, skill.version
        ));
        then.status(200).json_body(serde_json::json!({
            "downloadUrl": format!("{}{}", server.base_url(), download_path),
            "checksum": hex_checksum(&skill.tarball),
            "manifest": { "dependencies": dependencies }
        }));
    });

    let tarball = skill.tarball.clone();
    server.mock(|when, then| {
        when.method(GET).path(download_path);
        then.status(200).body(tarball);
    });
}

/// Register default-branch, commit, and tarball endpoints for a GitHub
/// repository.
pub fn mount_github_repo(
    server: &MockServer,
    owner: &str,
    repo: &str,
    git_ref: &str,
    commit: &str,
    tarball: &[u8],
) {
    server.mock(|when, then| {
        when.method(GET).path(format!("/repos/{owner}/{repo}"));
        then.status(200)
            .json_body(serde_json::json!({ "default_branch": "main" }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/repos/{owner}/{repo}/commits/{git_ref}"));
        then.status(200).json_body(serde_json::json!({ "sha": commit }));
    });
    let tarball = tarball.to_vec();
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/repos/{owner}/{repo}/tarball/{commit}"));
        then.status(200).body(tarball);
    });
}
