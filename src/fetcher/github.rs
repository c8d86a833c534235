//! GitHub tarball fetching.
//!
//! Resolving a specifier takes two round-trips: the repository metadata
//! (only when no ref was given, to learn the default branch) and the
//! commit lookup that turns any branch, tag, or commit-ish into a full
//! sha. The tarball itself is fetched by that sha, so a locked install
//! re-downloads exactly the bytes that were resolved.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PspmError, Result};
use crate::fetcher::FetchedSkill;
use crate::integrity;
use crate::registry::MAX_DOWNLOAD_SIZE;

const GH_API: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("pspm/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
}

/// A fetched GitHub skill, with the ref bookkeeping the lockfile records.
#[derive(Debug, Clone)]
pub struct GitHubFetch {
    pub skill: FetchedSkill,
    /// Full commit sha the ref resolved to.
    pub commit: String,
    /// The ref that was asked for (default branch when none was given).
    pub git_ref: String,
}

pub struct GitHubFetcher {
    client: Client,
    token: Option<String>,
    api_base: String,
}

impl GitHubFetcher {
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PspmError::Http(err.to_string()))?;
        Ok(Self {
            client,
            token: token.or_else(token_from_env),
            api_base: GH_API.to_string(),
        })
    }

    /// Point the client at a different API host (tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch a repository tree at a ref, returning the tarball bytes and
    /// the canonical commit.
    pub fn fetch(&self, owner: &str, repo: &str, git_ref: Option<&str>) -> Result<GitHubFetch> {
        let git_ref = match git_ref {
            Some(r) if !r.is_empty() && r != "latest" => r.to_string(),
            _ => self.default_branch(owner, repo)?,
        };
        let commit = self.resolve_commit(owner, repo, &git_ref)?;
        debug!(owner, repo, git_ref, commit, "resolved GitHub ref");

        let bytes = self.download_tarball(owner, repo, &commit)?;
        let skill = FetchedSkill {
            integrity: integrity::digest(&bytes),
            version: commit.chars().take(7).collect(),
            bytes,
        };
        Ok(GitHubFetch {
            skill,
            commit,
            git_ref,
        })
    }

    /// Re-download a tarball for a commit already pinned by the lockfile.
    pub fn download_tarball(&self, owner: &str, repo: &str, commit: &str) -> Result<Vec<u8>> {
        let url = format!("{}/repos/{owner}/{repo}/tarball/{commit}", self.api_base);
        let response = self.get(&url, &format!("{owner}/{repo}"))?;

        let mut bytes = Vec::new();
        response
            .take(MAX_DOWNLOAD_SIZE + 1)
            .read_to_end(&mut bytes)
            .map_err(|err| PspmError::Http(format!("tarball read failed: {err}")))?;
        if bytes.len() as u64 > MAX_DOWNLOAD_SIZE {
            return Err(PspmError::Http(format!(
                "tarball exceeded size limit ({} MB)",
                MAX_DOWNLOAD_SIZE / (1024 * 1024)
            )));
        }
        Ok(bytes)
    }

    fn default_branch(&self, owner: &str, repo: &str) -> Result<String> {
        let url = format!("{}/repos/{owner}/{repo}", self.api_base);
        let response = self.get(&url, &format!("{owner}/{repo}"))?;
        let info: RepoInfo = response
            .json()
            .map_err(|err| PspmError::Http(format!("parse repository metadata: {err}")))?;
        Ok(info.default_branch)
    }

    fn resolve_commit(&self, owner: &str, repo: &str, git_ref: &str) -> Result<String> {
        let url = format!("{}/repos/{owner}/{repo}/commits/{git_ref}", self.api_base);
        let response = self.get(&url, &format!("{owner}/{repo}@{git_ref}"))?;
        let info: CommitInfo = response
            .json()
            .map_err(|err| PspmError::Http(format!("parse commit metadata: {err}")))?;
        Ok(info.sha)
    }

    fn get(&self, url: &str, what: &str) -> Result<Response> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|err| PspmError::from_transport(&err, what))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(PspmError::GitHubNotFound(what.to_string()));
        }
        if status == StatusCode::FORBIDDEN && rate_limit_exhausted(&response) {
            return Err(PspmError::RateLimited(what.to_string()));
        }
        Err(PspmError::Http(format!("{what}: HTTP {status}")))
    }
}

fn rate_limit_exhausted(response: &Response) -> bool {
    response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == "0")
}

fn token_from_env() -> Option<String> {
    std::env::var("GITHUB_TOKEN")
        .ok()
        .or_else(|| std::env::var("GH_TOKEN").ok())
        .filter(|token| !token.is_empty())
}
