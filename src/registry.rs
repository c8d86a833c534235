//! Registry HTTP client.
//!
//! Two read operations back the core: listing a skill's versions and
//! fetching one version's metadata. Both are exposed behind [`RegistryApi`]
//! so the resolver can run against an in-memory fake in tests.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{PspmError, Result};

const USER_AGENT: &str = concat!("pspm/", env!("CARGO_PKG_VERSION"));

/// Maximum tarball download size (100 MB) to prevent memory exhaustion.
pub const MAX_DOWNLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// One entry of a skill's versions list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version: String,
}

/// Metadata for one published version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    pub download_url: String,
    /// Lowercase hex SHA-256 of the tarball.
    pub checksum: String,
    #[serde(default)]
    pub manifest: VersionManifest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// The registry operations the resolver and orchestrator consume.
pub trait RegistryApi {
    fn list_versions(&self, username: &str, name: &str) -> Result<Vec<VersionSummary>>;
    fn get_version(&self, username: &str, name: &str, version: &str) -> Result<VersionMetadata>;
}

/// HTTP registry client.
pub struct RegistryClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| PspmError::Http(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download raw bytes from a URL, honouring the presigned-URL rule:
    /// object-storage URLs must not receive the bearer token.
    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            if !is_presigned_url(url) {
                request = request.bearer_auth(token);
            }
        }
        let response = request
            .send()
            .map_err(|err| PspmError::from_transport(&err, "download"))?;
        if !response.status().is_success() {
            return Err(PspmError::Http(format!(
                "download failed: HTTP {} for {url}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > MAX_DOWNLOAD_SIZE {
                return Err(PspmError::Http(format!(
                    "download too large: {length} bytes (max {} MB)",
                    MAX_DOWNLOAD_SIZE / (1024 * 1024)
                )));
            }
        }
        let mut bytes = Vec::new();
        response
            .take(MAX_DOWNLOAD_SIZE + 1)
            .read_to_end(&mut bytes)
            .map_err(|err| PspmError::Http(format!("download read failed: {err}")))?;
        if bytes.len() as u64 > MAX_DOWNLOAD_SIZE {
            return Err(PspmError::Http(format!(
                "download exceeded size limit ({} MB)",
                MAX_DOWNLOAD_SIZE / (1024 * 1024)
            )));
        }
        Ok(bytes)
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .map_err(|err| PspmError::from_transport(&err, "registry request"))
    }

    fn map_failure(&self, status: StatusCode, what: &str) -> PspmError {
        match status {
            StatusCode::NOT_FOUND => PspmError::SkillNotFound(what.to_string()),
            StatusCode::UNAUTHORIZED if self.token.is_none() => {
                PspmError::AuthRequired(what.to_string())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                PspmError::AuthDenied(what.to_string())
            }
            status => PspmError::Http(format!("{what}: HTTP {status}")),
        }
    }
}

impl RegistryApi for RegistryClient {
    fn list_versions(&self, username: &str, name: &str) -> Result<Vec<VersionSummary>> {
        let identity = format!("@user/{username}/{name}");
        let url = format!("{}/api/skills/{username}/{name}/versions", self.base_url);
        let response = self.get(&url)?;
        if !response.status().is_success() {
            return Err(self.map_failure(response.status(), &identity));
        }
        response
            .json::<Vec<VersionSummary>>()
            .map_err(|err| PspmError::Http(format!("parse versions for {identity}: {err}")))
    }

    fn get_version(&self, username: &str, name: &str, version: &str) -> Result<VersionMetadata> {
        let identity = format!("@user/{username}/{name}@{version}");
        let url = format!("{}/api/skills/{username}/{name}/{version}", self.base_url);
        let response = self.get(&url)?;
        if !response.status().is_success() {
            return Err(self.map_failure(response.status(), &identity));
        }
        response
            .json::<VersionMetadata>()
            .map_err(|err| PspmError::Http(format!("parse metadata for {identity}: {err}")))
    }
}

/// Whether a download URL is presigned object storage, where attaching an
/// Authorization header would break the request signature.
#[must_use]
pub fn is_presigned_url(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    if parsed
        .host_str()
        .is_some_and(|host| host.ends_with(".r2.cloudflarestorage.com"))
    {
        return true;
    }
    parsed
        .query_pairs()
        .any(|(key, _)| key == "X-Amz-Signature")
}
