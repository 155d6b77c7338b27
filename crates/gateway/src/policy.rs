use std::path::{Component, Path, PathBuf};

/// Lexically normalize `path`, resolving `.` and `..` components without
/// touching the filesystem (the target may not exist yet, e.g. for
/// `WRITE_FILE`). A `..` that would climb above the root is rejected.
fn normalize(path: &Path) -> Result<PathBuf, String> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !out.pop() {
                    return Err("path escapes its base via `..`".to_owned());
                }
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

/// Verify `working_dir` exists, is a directory, and is a subpath of
/// `workspace_root` (spec.md §4.4 point 1).
pub fn check_working_dir(working_dir: &Path, workspace_root: &Path) -> Result<(), String> {
    if !working_dir.is_dir() {
        return Err(format!("working_dir {} does not exist or is not a directory", working_dir.display()));
    }
    let normalized_root = normalize(workspace_root)?;
    let normalized_dir = normalize(working_dir)?;
    if !normalized_dir.starts_with(&normalized_root) {
        return Err(format!(
            "working_dir {} escapes workspace root {}",
            working_dir.display(),
            workspace_root.display()
        ));
    }
    Ok(())
}

/// Resolve a payload-supplied relative path against `base`, rejecting any
/// path that would escape `base`.
pub fn resolve_within(base: &Path, rel: &str) -> Result<PathBuf, String> {
    let joined = base.join(rel);
    let normalized_base = normalize(base)?;
    let normalized = normalize(&joined)?;
    if !normalized.starts_with(&normalized_base) {
        return Err(format!("path `{rel}` escapes its working_dir"));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_within_allows_nested_path() {
        let base = Path::new("/workspaces/forge");
        let resolved = resolve_within(base, "src/lib.rs").unwrap();
        assert_eq!(resolved, Path::new("/workspaces/forge/src/lib.rs"));
    }

    #[test]
    fn resolve_within_rejects_escape() {
        let base = Path::new("/workspaces/forge");
        assert!(resolve_within(base, "../escape.txt").is_err());
        assert!(resolve_within(base, "../../etc/passwd").is_err());
    }

    #[test]
    fn check_working_dir_accepts_subpath_of_root() {
        let root = TempDir::new().unwrap();
        let sub = root.path().join("forge");
        std::fs::create_dir(&sub).unwrap();
        check_working_dir(&sub, root.path()).unwrap();
    }

    #[test]
    fn check_working_dir_rejects_sibling_path() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        assert!(check_working_dir(outside.path(), root.path()).is_err());
    }
}
