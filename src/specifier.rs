//! Dependency specifier parsing.
//!
//! A specifier is the textual reference a user writes for a dependency.
//! Classification is precedence-based: a leading `file:`, `./` or `../`
//! means local, a leading `github:` means GitHub, and anything else must
//! match the registry grammar.
//!
//! Supported formats:
//! - `@user/<username>/<name>[@<range>]` - registry skill
//! - `github:<owner>/<repo>[/<path>][@<ref>]` - GitHub repository subtree
//! - `file:<path>`, `./path`, `../path` - local directory

use serde::{Deserialize, Serialize};

use crate::error::{PspmError, Result};

/// A parsed dependency specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Specifier {
    Registry {
        username: String,
        name: String,
        /// Semver range string, passed downstream verbatim. `None` means
        /// "highest available".
        range: Option<String>,
    },
    GitHub {
        owner: String,
        repo: String,
        /// Subdirectory within the repository, if any.
        path: Option<String>,
        /// Branch, tag, or commit-ish. `None` means the default branch.
        git_ref: Option<String>,
    },
    Local {
        /// The path exactly as the user wrote it (after `file:` stripping).
        path: String,
    },
}

impl Specifier {
    /// Parse a single specifier string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(invalid(input, "empty specifier"));
        }

        if let Some(path) = input.strip_prefix("file:") {
            if path.is_empty() {
                return Err(invalid(input, "file: specifier needs a path"));
            }
            return Ok(Self::Local {
                path: path.to_string(),
            });
        }
        if input.starts_with("./") || input.starts_with("../") {
            return Ok(Self::Local {
                path: input.to_string(),
            });
        }

        if let Some(rest) = input.strip_prefix("github:") {
            return parse_github(input, rest);
        }

        parse_registry(input)
    }

    /// The identity key under which this dependency is tracked.
    ///
    /// GitHub keys deliberately omit the ref: two specifiers that differ
    /// only in branch collide, and the last write wins.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Registry { username, name, .. } => format!("@user/{username}/{name}"),
            Self::GitHub {
                owner, repo, path, ..
            } => match path {
                Some(path) => format!("github:{owner}/{repo}/{path}"),
                None => format!("github:{owner}/{repo}"),
            },
            Self::Local { path } => format!("file:{path}"),
        }
    }

    /// The short name used for store placement and agent links.
    #[must_use]
    pub fn skill_name(&self) -> String {
        match self {
            Self::Registry { name, .. } => name.clone(),
            Self::GitHub { repo, path, .. } => path
                .as_deref()
                .and_then(|p| p.rsplit('/').next())
                .unwrap_or(repo)
                .to_string(),
            Self::Local { path } => path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(path)
                .to_string(),
        }
    }

    /// Render the specifier back to its canonical textual form.
    #[must_use]
    pub fn format(&self) -> String {
        match self {
            Self::Registry { range, .. } => match range {
                Some(range) => format!("{}@{range}", self.key()),
                None => self.key(),
            },
            Self::GitHub { git_ref, .. } => match git_ref {
                Some(git_ref) => format!("{}@{git_ref}", self.key()),
                None => self.key(),
            },
            Self::Local { .. } => self.key(),
        }
    }
}

impl std::fmt::Display for Specifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

fn parse_github(input: &str, rest: &str) -> Result<Specifier> {
    // The ref separator is the last '@' past the owner/repo segment, so
    // that refs containing '@' in the owner position never confuse the
    // split.
    let slash = rest
        .find('/')
        .ok_or_else(|| invalid(input, "expected github:<owner>/<repo>"))?;
    let (tree, git_ref) = match rest[slash..].rfind('@') {
        Some(offset) => {
            let at = slash + offset;
            (&rest[..at], Some(rest[at + 1..].to_string()))
        }
        None => (rest, None),
    };
    if let Some(git_ref) = &git_ref {
        if git_ref.is_empty() {
            return Err(invalid(input, "ref after '@' is empty"));
        }
    }

    let mut parts = tree.splitn(3, '/');
    let owner = parts.next().unwrap_or("");
    let repo = parts.next().unwrap_or("");
    if owner.is_empty() || repo.is_empty() {
        return Err(invalid(input, "expected github:<owner>/<repo>"));
    }
    let path = parts
        .next()
        .filter(|p| !p.is_empty())
        .map(|p| p.trim_end_matches('/').to_string());

    Ok(Specifier::GitHub {
        owner: owner.to_string(),
        repo: repo.to_string(),
        path,
        git_ref,
    })
}

fn parse_registry(input: &str) -> Result<Specifier> {
    let rest = input
        .strip_prefix("@user/")
        .ok_or_else(|| invalid(input, "registry skills are named @user/<username>/<name>"))?;

    // Username and name never contain '@', so any '@' past the prefix
    // starts the range.
    let (ident, range) = match rest.split_once('@') {
        Some((ident, range)) if !range.is_empty() => (ident, Some(range.to_string())),
        Some((_, _)) => return Err(invalid(input, "range after '@' is empty")),
        None => (rest, None),
    };

    let (username, name) = ident
        .split_once('/')
        .ok_or_else(|| invalid(input, "registry skills are named @user/<username>/<name>"))?;
    if name.contains('/') {
        return Err(invalid(input, "skill name must not contain '/'"));
    }
    validate_username(input, username)?;
    validate_skill_name(input, name)?;

    Ok(Specifier::Registry {
        username: username.to_string(),
        name: name.to_string(),
        range,
    })
}

fn validate_username(input: &str, username: &str) -> Result<()> {
    if username.is_empty()
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(
            input,
            "username must contain only letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

fn validate_skill_name(input: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !first_ok || !rest_ok {
        return Err(invalid(
            input,
            "skill name must start with a lowercase letter and contain only lowercase letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

fn invalid(input: &str, reason: &str) -> PspmError {
    PspmError::InvalidSpecifier {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
