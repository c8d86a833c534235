//! Error handling for pspm.
//!
//! All fallible operations return [`Result`], an alias over [`PspmError`].
//! Install-time failures are per-package: the orchestrator reports them and
//! keeps going, so most variants carry enough context to identify the
//! offending specifier or package on their own.

use std::io;

use thiserror::Error;

/// Main error type for pspm operations.
#[derive(Error, Debug)]
pub enum PspmError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid specifier '{input}': {reason}")]
    InvalidSpecifier { input: String, reason: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid lockfile: {0}")]
    InvalidLockfile(String),

    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    #[error("No version of {package} satisfies {ranges}", ranges = .ranges.join(", "))]
    NoSatisfyingVersion {
        package: String,
        ranges: Vec<String>,
        available: Vec<String>,
    },

    #[error("Version conflict for {package}: {}", format_witnesses(.witnesses))]
    VersionConflict {
        package: String,
        /// `(dependent, range)` pairs that could not be satisfied together.
        witnesses: Vec<(String, String)>,
        available: Vec<String>,
    },

    #[error("Circular dependency: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Dependency chain exceeds maximum depth: {}", .0.join(" -> "))]
    MaxDepthExceeded(Vec<String>),

    #[error("Authentication required for {0}")]
    AuthRequired(String),

    #[error("Access denied for {0}")]
    AuthDenied(String),

    #[error("GitHub rate limit exceeded while fetching {0}")]
    RateLimited(String),

    #[error("Integrity mismatch for {name}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("GitHub repository or ref not found: {0}")]
    GitHubNotFound(String),

    #[error("Path '{path}' not found in repository archive (top-level entries: {})", .available.join(", "))]
    GitHubPathNotFound {
        path: String,
        available: Vec<String>,
    },

    #[error("Local skill invalid: {0}")]
    LocalSkillInvalid(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Frozen lockfile: {0}")]
    FrozenLockfile(String),
}

impl PspmError {
    /// The minimal concrete remedy to print alongside the failure, when one
    /// exists.
    #[must_use]
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            Self::AuthRequired(_) => Some("run `pspm login` to authenticate"),
            Self::AuthDenied(_) => Some("you don't have access to this skill"),
            Self::RateLimited(_) => Some("set GITHUB_TOKEN to raise the rate limit"),
            Self::FrozenLockfile(_) => {
                Some("the lockfile is stale - rerun without --frozen-lockfile")
            }
            Self::IntegrityMismatch { .. } => {
                Some("the cached or downloaded archive is corrupt - retry the install")
            }
            _ => None,
        }
    }

    /// Classify a reqwest transport failure, separating deadline expiry from
    /// other network errors.
    pub fn from_transport(err: &reqwest::Error, what: &str) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("{what}: {err}"))
        } else {
            Self::Http(format!("{what}: {err}"))
        }
    }
}

fn format_witnesses(witnesses: &[(String, String)]) -> String {
    witnesses
        .iter()
        .map(|(dependent, range)| format!("{dependent} requires {range}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using PspmError.
pub type Result<T> = std::result::Result<T, PspmError>;
