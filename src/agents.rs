//! Built-in agent definitions.
//!
//! An agent is a named consumer that expects skills at a well-known
//! directory. The manifest's `agents` map may redefine any of these or add
//! custom names with an explicit `skillsDir`.

use std::collections::BTreeMap;

use crate::manifest::AgentConfig;

/// The agent name that suppresses linking entirely when it is the sole
/// selection.
pub const AGENT_NONE: &str = "none";

/// Built-in agents and their skills directories, relative to the project
/// root.
pub const BUILTIN_AGENTS: &[(&str, &str)] = &[
    ("claude-code", ".claude/skills"),
    ("codex", ".codex/skills"),
    ("cursor", ".cursor/skills"),
    ("gemini", ".gemini/skills"),
    ("kiro", ".kiro/skills"),
    ("opencode", ".opencode/skills"),
];

/// All built-in agent names, in table order.
#[must_use]
pub fn builtin_names() -> Vec<String> {
    BUILTIN_AGENTS
        .iter()
        .map(|(name, _)| (*name).to_string())
        .collect()
}

/// Resolve an agent's skills directory from built-in defaults merged with
/// manifest overrides. Unknown agents resolve to `None`.
#[must_use]
pub fn skills_dir(agent: &str, overrides: &BTreeMap<String, AgentConfig>) -> Option<String> {
    if let Some(config) = overrides.get(agent) {
        return Some(config.skills_dir.clone());
    }
    BUILTIN_AGENTS
        .iter()
        .find(|(name, _)| *name == agent)
        .map(|(_, dir)| (*dir).to_string())
}
