use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Patterns;
use crate::error::{Error, Result};

/// Audio files directly inside `folder`, sorted by file name.
pub fn audio_files(folder: &Path, patterns: &Patterns) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Listing {
            path: folder.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() && patterns.is_audio(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Final path component as UTF-8, empty if it is not representable.
pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}
