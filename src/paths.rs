//! Lexical path helpers.
//!
//! Pipelines and dependency edges are keyed by path, so every path entering the
//! composer goes through [`resolve_path`] first. Resolution is purely lexical:
//! virtual files have nothing on disk to canonicalize against.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized form.
///
/// Relative paths are joined onto the current directory, then `.` and `..`
/// components are folded away. Symlinks are not followed.
pub fn resolve_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        normalize(path)
    } else {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        normalize(&cwd.join(path))
    }
}

/// Resolve `to` relative to the file `from`.
///
/// When `from` ends with a separator it is treated as a directory, otherwise
/// its parent directory is used.
pub fn resolve_relative(from: impl AsRef<Path>, to: impl AsRef<Path>) -> PathBuf {
    let from = from.as_ref();
    let is_dir = from.as_os_str().to_string_lossy().ends_with(std::path::MAIN_SEPARATOR);
    let dir = if is_dir { from } else { from.parent().unwrap_or(from) };
    resolve_path(dir.join(to))
}

/// Replace the extension of `path` with `ext` (given without the leading dot).
pub fn replace_ext(path: impl AsRef<Path>, ext: &str) -> PathBuf {
    path.as_ref().with_extension(ext)
}

/// Path of `path` relative to `base`, walking up with `..` where needed.
///
/// Both paths are resolved first.
pub fn relative_to(path: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    let path = resolve_path(path);
    let base = resolve_path(base);

    let path_parts: Vec<_> = path.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = path_parts.iter().zip(&base_parts).take_while(|(a, b)| a == b).count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `pop` refuses to go above the root, matching `path.resolve`.
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
