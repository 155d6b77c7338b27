use std::path::Path;

use hiveguard_core::ProjectionView;

use crate::error::ProjectorError;

/// Load the persisted view, or the default (paused, empty) view if the file
/// does not exist yet (spec.md §4.7 step 1).
pub fn load_view(path: &Path) -> Result<ProjectionView, ProjectorError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ProjectionView::default()),
        Err(source) => Err(ProjectorError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}

/// Write `view` atomically: serialize to a sibling temp file, then rename
/// over `path` (spec.md §4.7 step 6, §6 "atomic replace").
pub fn write_view_atomic(path: &Path, view: &ProjectionView) -> Result<(), ProjectorError> {
    let bytes = serde_json::to_vec_pretty(view)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &bytes).map_err(|source| ProjectorError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| ProjectorError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(())
}
