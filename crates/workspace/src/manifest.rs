use std::collections::BTreeMap;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::WorkspaceError;

const MANIFEST_FILE: &str = ".hiveguard-baseline.manifest";

/// A sorted map of workspace-relative path to SHA-256 hex digest, capturing
/// a workspace's content at the moment it was created or last reset.
pub type Manifest = BTreeMap<String, String>;

/// Walk `root` (excluding the manifest file itself) and hash every regular
/// file's contents, keyed by its path relative to `root`.
pub fn snapshot(root: &Path) -> Result<Manifest, WorkspaceError> {
    let mut manifest = Manifest::new();
    walk(root, root, &mut manifest)?;
    Ok(manifest)
}

fn walk(root: &Path, dir: &Path, out: &mut Manifest) -> Result<(), WorkspaceError> {
    let entries = std::fs::read_dir(dir).map_err(|source| WorkspaceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| WorkspaceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| WorkspaceError::Io {
            path: path.clone(),
            source,
        })?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            if path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE) {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(|source| WorkspaceError::Io {
                path: path.clone(),
                source,
            })?;
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let digest = format!("{:x}", hasher.finalize());
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.insert(rel, digest);
        }
    }
    Ok(())
}

/// Persist `manifest` as the workspace's recorded baseline snapshot.
pub fn write(root: &Path, manifest: &Manifest) -> Result<(), WorkspaceError> {
    let path = root.join(MANIFEST_FILE);
    let body = manifest
        .iter()
        .map(|(k, v)| format!("{v}  {k}\n"))
        .collect::<String>();
    std::fs::write(&path, body).map_err(|source| WorkspaceError::Io { path, source })
}

/// Read back the manifest written by [`write`], if present.
pub fn read(root: &Path) -> Result<Manifest, WorkspaceError> {
    let path = root.join(MANIFEST_FILE);
    let text = std::fs::read_to_string(&path).map_err(|source| WorkspaceError::Io { path, source })?;
    let mut manifest = Manifest::new();
    for line in text.lines() {
        if let Some((digest, rel)) = line.split_once("  ") {
            manifest.insert(rel.to_owned(), digest.to_owned());
        }
    }
    Ok(manifest)
}
