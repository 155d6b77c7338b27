use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::WorkspaceError;
use crate::manifest;

/// Ensures an isolated workspace directory per agent, derived from a shared
/// baseline checkout, and enforces a cleanliness invariant: a workspace must
/// match the byte-for-byte snapshot taken when it was last created or reset
/// (spec.md §4.3).
pub struct WorkspaceManager {
    baseline_root: PathBuf,
    workspaces_root: PathBuf,
}

impl WorkspaceManager {
    #[must_use]
    pub fn new(baseline_root: PathBuf, workspaces_root: PathBuf) -> Self {
        Self {
            baseline_root,
            workspaces_root,
        }
    }

    /// Create any missing workspace for `agent_ids` from the baseline.
    /// When `reset` is set, existing workspaces are wiped and recreated too.
    pub fn ensure_worktrees(&self, agent_ids: &[String], reset: bool) -> Result<(), WorkspaceError> {
        std::fs::create_dir_all(&self.workspaces_root).map_err(|source| WorkspaceError::Io {
            path: self.workspaces_root.clone(),
            source,
        })?;
        for agent_id in agent_ids {
            let path = self.workspaces_root.join(agent_id);
            if reset && path.exists() {
                std::fs::remove_dir_all(&path).map_err(|source| WorkspaceError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
            if !path.exists() {
                info!(agent_id, path = %path.display(), "creating workspace from baseline");
                copy_dir_recursive(&self.baseline_root, &path)?;
                let snapshot = manifest::snapshot(&path)?;
                manifest::write(&path, &snapshot)?;
            }
        }
        Ok(())
    }

    /// Return the absolute workspace root for `agent_id`, failing if it has
    /// not been created yet.
    pub fn worktree_for(&self, agent_id: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.workspaces_root.join(agent_id);
        if path.is_dir() {
            Ok(path)
        } else {
            Err(WorkspaceError::NotFound(agent_id.to_owned()))
        }
    }

    /// Assert that `agent_id`'s workspace still matches its recorded
    /// baseline snapshot, i.e. has no uncommitted changes.
    pub fn assert_clean(&self, agent_id: &str) -> Result<(), WorkspaceError> {
        let path = self.worktree_for(agent_id)?;
        let recorded = manifest::read(&path)?;
        let current = manifest::snapshot(&path)?;
        if recorded != current {
            warn!(agent_id, "workspace cleanliness violation");
            return Err(WorkspaceError::Dirty {
                agent: agent_id.to_owned(),
                detail: "current contents differ from the recorded baseline snapshot".to_owned(),
            });
        }
        Ok(())
    }

    /// Refresh the recorded baseline snapshot to the workspace's current
    /// contents, e.g. after a legitimate commit inside the workspace.
    pub fn rebaseline(&self, agent_id: &str) -> Result<(), WorkspaceError> {
        let path = self.worktree_for(agent_id)?;
        let snapshot = manifest::snapshot(&path)?;
        manifest::write(&path, &snapshot)
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), WorkspaceError> {
    std::fs::create_dir_all(dst).map_err(|source| WorkspaceError::Io {
        path: dst.to_path_buf(),
        source,
    })?;
    let entries = std::fs::read_dir(src).map_err(|source| WorkspaceError::Io {
        path: src.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| WorkspaceError::Io {
            path: src.to_path_buf(),
            source,
        })?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|source| WorkspaceError::Io {
            path: from.clone(),
            source,
        })?;
        if file_type.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else if file_type.is_file() {
            std::fs::copy(&from, &to).map_err(|source| WorkspaceError::Io {
                path: from.clone(),
                source,
            })?;
        }
    }
    Ok(())
}
