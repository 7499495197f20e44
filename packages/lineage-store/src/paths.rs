//! Path-safety checker
//!
//! Every file a base touches is resolved through [`SafeDir::resolve`]. The
//! check is lexical: `.` and `..` components are folded without touching the
//! filesystem, and the result must stay under the base directory or one of
//! the configured extra directories.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StorageError};

#[derive(Debug, Clone)]
pub struct SafeDir {
    root: PathBuf,
    allowed: Vec<PathBuf>,
}

impl SafeDir {
    pub fn new(root: impl Into<PathBuf>, extra: &[PathBuf]) -> Self {
        let root = normalize(&root.into());
        let mut allowed = vec![root.clone()];
        allowed.extend(extra.iter().map(|p| normalize(p)));
        Self { root, allowed }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` against the base directory.
    ///
    /// Absolute paths are accepted only when they fall inside an allowed
    /// directory; relative ones may not climb out of it with `..`.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        if relative.as_os_str().is_empty() {
            return Err(StorageError::path_rejected(relative));
        }

        let candidate = if relative.is_absolute() {
            normalize(relative)
        } else {
            if escapes(relative) {
                return Err(StorageError::path_rejected(relative));
            }
            normalize(&self.root.join(relative))
        };

        if self.is_allowed(&candidate) {
            Ok(candidate)
        } else {
            Err(StorageError::path_rejected(relative))
        }
    }

    pub fn is_allowed(&self, path: &Path) -> bool {
        self.allowed.iter().any(|dir| path.starts_with(dir))
    }
}

/// Lexically fold `.` and `..`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True if a relative path climbs above its starting point at any step.
fn escapes(path: &Path) -> bool {
    let mut depth: isize = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
        if depth < 0 {
            return true;
        }
    }
    false
}
