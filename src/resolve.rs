use anyhow::{Result, bail};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Resolve a staged path against the working root, confining it to the root.
///
/// Staged paths are POSIX-style and relative to the invocation root.
/// Resolution is lexical: the target of a create does not exist yet, so the
/// filesystem cannot be consulted.
pub fn resolve_path(root: &Path, path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        bail!("empty path");
    }
    if path.is_absolute() {
        bail!("absolute paths are not allowed: {}", path.display());
    }
    let root = root.absolutize().map_err(|_| {
        anyhow::anyhow!("root cannot be resolved: {}", root.display())
    })?;
    let resolved = path.absolutize_virtually(&root).map_err(|_| {
        anyhow::anyhow!("path escapes the working root: {}", path.display())
    })?;
    Ok(resolved.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_path_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_path(dir.path(), Path::new("sub/file.txt")).unwrap();
        assert_eq!(resolved, dir.path().join("sub/file.txt"));
    }

    #[test]
    fn normalizes_dot_segments() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_path(dir.path(), Path::new("a/../b.txt")).unwrap();
        assert_eq!(resolved, dir.path().join("b.txt"));
    }

    #[test]
    fn rejects_escape_from_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_path(dir.path(), Path::new("../outside.txt")).is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_path(dir.path(), Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn rejects_empty_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_path(dir.path(), Path::new("")).is_err());
    }
}
