//! Install context.
//!
//! Configuration is captured once at command start and passed explicitly;
//! there is no ambient mutable state. The CLI layer is responsible for
//! reading flags and environment variables into this value, so the core
//! stays fully driveable headlessly.

use std::path::PathBuf;

use crate::agents;

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.pspm.dev";

#[derive(Debug, Clone)]
pub struct InstallContext {
    pub project_root: PathBuf,
    pub registry_url: String,
    /// Registry bearer token, when the user is logged in.
    pub token: Option<String>,
    /// GitHub bearer token for API calls and tarball downloads.
    pub github_token: Option<String>,
    /// Agents to project installed skills into.
    pub agents: Vec<String>,
    /// Refuse any fetch not already pinned by the lockfile.
    pub frozen: bool,
}

impl InstallContext {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            token: None,
            github_token: None,
            agents: agents::builtin_names(),
            frozen: false,
        }
    }

    #[must_use]
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token;
        self
    }

    #[must_use]
    pub fn with_agents(mut self, agents: Vec<String>) -> Self {
        self.agents = agents;
        self
    }

    #[must_use]
    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    /// The agents to actually link for. Selecting only `none` disables
    /// linking entirely.
    #[must_use]
    pub fn link_agents(&self) -> Vec<String> {
        if self.agents.len() == 1 && self.agents[0] == agents::AGENT_NONE {
            return Vec::new();
        }
        self.agents
            .iter()
            .filter(|name| name.as_str() != agents::AGENT_NONE)
            .cloned()
            .collect()
    }
}
