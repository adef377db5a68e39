use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::ThreadStoreError;

pub const THREAD_DIR: [&str; 2] = [".plexctl", "threads"];
pub const THREAD_FILE_SUFFIX: &str = ".json";

/// `~/.plexctl/threads`.
pub fn default_thread_root() -> Result<PathBuf, ThreadStoreError> {
    let home = dirs::home_dir().ok_or(ThreadStoreError::HomeDirUnavailable)?;
    Ok(home.join(THREAD_DIR[0]).join(THREAD_DIR[1]))
}

#[must_use]
pub fn thread_file_name(thread_id: &str) -> String {
    format!("{thread_id}{THREAD_FILE_SUFFIX}")
}

/// Resolves `candidate` and checks it is `base` itself or nested under it.
///
/// Both paths are made absolute against the current directory and normalized
/// lexically, then compared by component, so `/a/bx` is never inside `/a/b`.
/// The comparison is repeated with symlinks resolved along the longest existing
/// prefix of each path, so a link inside the base cannot point out of it.
/// Returns the lexically resolved candidate.
pub fn ensure_within(base: &Path, candidate: &Path) -> Result<PathBuf, ThreadStoreError> {
    let resolved_base = resolve(base)?;
    let resolved = resolve(candidate)?;

    if resolved.starts_with(&resolved_base)
        && resolve_links(&resolved).starts_with(resolve_links(&resolved_base))
    {
        Ok(resolved)
    } else {
        Err(ThreadStoreError::PathViolation {
            path: candidate.to_path_buf(),
            base: resolved_base,
        })
    }
}

fn resolve(path: &Path) -> Result<PathBuf, ThreadStoreError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| ThreadStoreError::io("resolving current directory", path, source))?
            .join(path)
    };
    Ok(normalize_lexically(&absolute))
}

/// Canonicalizes the longest existing ancestor of an absolute, normalized
/// path and re-appends the components that do not exist yet.
fn resolve_links(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(real) = fs::canonicalize(existing) {
            return missing.iter().rev().fold(real, |out, name| out.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `pop` is a no-op at the root, matching `/..` == `/`.
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
