//! Path manipulation helpers.

use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` or `~/` through the user's home directory.
pub fn expand_tilde(input: &str) -> PathBuf {
    if input == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(input)
}

/// Lexically normalise a path, resolving `.` and `..` components without
/// touching the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Compute the relative path from one directory to a target.
///
/// Both arguments must be absolute. The result, joined onto `from` and
/// normalised, equals `to` - the property agent symlinks rely on so a
/// checked-out project keeps working when moved.
#[must_use]
pub fn relative_path_from(from: &Path, to: &Path) -> PathBuf {
    let from = normalize(from);
    let to = normalize(to);

    let from_components: Vec<Component> = from.components().collect();
    let to_components: Vec<Component> = to.components().collect();

    let common = from_components
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from_components.len() {
        out.push("..");
    }
    for component in &to_components[common..] {
        out.push(component);
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
