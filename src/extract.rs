//! Tarball extraction into the project store.
//!
//! Registry tarballs carry a single known top-level directory that is
//! stripped. GitHub tarballs also carry a single top-level directory, but
//! its name (`<owner>-<repo>-<sha>`) is not known a priori, so it is
//! detected as the one entry that is neither `archive.tgz` nor a dotfile.
//! The destination directory is removed and recreated before writing, so
//! the payload is exactly what the archive carries and never a merge with
//! a prior version.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::{PspmError, Result};
use crate::utils::fs::recreate_dir;

/// Extract a registry tarball, dropping its single top-level directory.
pub fn extract_registry_tarball(bytes: &[u8], dest: &Path) -> Result<()> {
    recreate_dir(dest)?;
    unpack(bytes, dest, 1)
}

/// Extract a GitHub tarball, dropping the detected top-level directory and,
/// when `subpath` is given, extracting only that subtree.
///
/// A missing subpath is reported with the top-level entries that do exist
/// under the archive root, so the failure is actionable.
pub fn extract_github_tarball(bytes: &[u8], dest: &Path, subpath: Option<&str>) -> Result<()> {
    let root = detect_github_root(bytes)?;
    let prefix = match subpath {
        Some(subpath) => format!("{root}/{}", subpath.trim_matches('/')),
        None => root.clone(),
    };

    recreate_dir(dest)?;
    let written = unpack_with_prefix(bytes, dest, &prefix)?;
    if written == 0 {
        if let Some(subpath) = subpath {
            let _ = std::fs::remove_dir_all(dest);
            return Err(PspmError::GitHubPathNotFound {
                path: subpath.to_string(),
                available: list_entries_under(bytes, &root)?,
            });
        }
    }
    Ok(())
}

/// Strip the first `strip` path components from every entry and unpack the
/// remainder under `dest`.
fn unpack(bytes: &[u8], dest: &Path, strip: usize) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(stripped) = strip_components(&path, strip) else {
            continue;
        };
        write_entry(&mut entry, dest, &stripped)?;
    }
    Ok(())
}

/// Unpack only entries under `prefix/`, stripped of it. Returns how many
/// filesystem objects were written.
fn unpack_with_prefix(bytes: &[u8], dest: &Path, prefix: &str) -> Result<usize> {
    let prefix_path = Path::new(prefix);
    let mut written = 0usize;
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let Ok(stripped) = path.strip_prefix(prefix_path) else {
            continue;
        };
        if stripped.as_os_str().is_empty() {
            continue;
        }
        write_entry(&mut entry, dest, &stripped.to_path_buf())?;
        written += 1;
    }
    Ok(written)
}

fn write_entry<R: std::io::Read>(
    entry: &mut tar::Entry<R>,
    dest: &Path,
    rel: &PathBuf,
) -> Result<()> {
    if !is_safe_relative(rel) {
        return Err(PspmError::InvalidArchive(format!(
            "archive entry escapes destination: {}",
            rel.display()
        )));
    }
    let target = dest.join(rel);
    if entry.header().entry_type().is_dir() {
        std::fs::create_dir_all(&target)?;
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    entry.unpack(&target)?;
    Ok(())
}

fn strip_components(path: &Path, strip: usize) -> Option<PathBuf> {
    let components: Vec<Component> = path.components().collect();
    if components.len() <= strip {
        return None;
    }
    Some(components[strip..].iter().collect())
}

fn is_safe_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path.components().all(|component| {
            matches!(component, Component::Normal(_) | Component::CurDir)
        })
}

/// Detect a GitHub tarball's top-level directory: the one first-level entry
/// that is neither `archive.tgz` nor a dotfile (tar metadata entries like
/// `pax_global_header` are skipped the same way).
fn detect_github_root(bytes: &[u8]) -> Result<String> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    let mut root: Option<String> = None;
    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(Component::Normal(first)) = path.components().next() else {
            continue;
        };
        let Some(first) = first.to_str() else {
            continue;
        };
        if first == "archive.tgz" || first == "pax_global_header" || first.starts_with('.') {
            continue;
        }
        match &root {
            None => root = Some(first.to_string()),
            Some(existing) if existing == first => {}
            Some(existing) => {
                return Err(PspmError::InvalidArchive(format!(
                    "expected a single top-level directory, found '{existing}' and '{first}'"
                )));
            }
        }
    }
    root.ok_or_else(|| PspmError::InvalidArchive("archive has no top-level directory".to_string()))
}

/// Top-level directory names that exist directly under the archive root.
fn list_entries_under(bytes: &[u8], root: &str) -> Result<Vec<String>> {
    let root_path = Path::new(root);
    let mut entries = Vec::new();
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?.into_owned();
        let Ok(rel) = path.strip_prefix(root_path) else {
            continue;
        };
        if let Some(Component::Normal(first)) = rel.components().next() {
            if let Some(name) = first.to_str() {
                if !entries.iter().any(|existing| existing == name) {
                    entries.push(name.to_string());
                }
            }
        }
    }
    entries.sort();
    Ok(entries)
}
