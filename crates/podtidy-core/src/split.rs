use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::listing::file_name;
use crate::store::FileStore;

/// Where the current year's episodes ended up.
#[derive(Debug, Clone, Serialize)]
pub struct SplitOutcome {
    pub folder: PathBuf,
    pub moved: Vec<PathBuf>,
}

/// Whether the timeline spans several years and reaches into `current_year`.
pub fn needs_split(store: &FileStore, current_year: i32) -> bool {
    let timeline = store.timeline();
    let (Some(start), Some(last)) = (timeline.earliest_year(), timeline.last_date().and_then(|d| d.year())) else {
        return false;
    };
    start != last && last == current_year
}

/// Move every file dated in `current_year` into a sibling folder named
/// `<name><suffix>`. Returns `None` when no split was needed or the folder
/// already exists.
pub fn split_current_year(
    folder: &Path,
    store: &mut FileStore,
    name: &str,
    suffix: &str,
    current_year: i32,
) -> Result<Option<SplitOutcome>> {
    if !needs_split(store, current_year) {
        tracing::debug!("podcast does not span multiple years, no split");
        return Ok(None);
    }

    let target = folder
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}{}", name, suffix));
    if target.exists() {
        tracing::warn!(folder = %target.display(), "current year folder already exists, skipping split");
        return Ok(None);
    }
    fs::create_dir(&target).map_err(|source| Error::CreateFolder { path: target.clone(), source })?;

    let to_move: Vec<PathBuf> = store
        .timeline()
        .dates()
        .filter(|(date, _)| date.year() == Some(current_year))
        .flat_map(|(_, files)| files.iter().cloned())
        .collect();

    let mut moved = Vec::new();
    for path in to_move {
        if !path.exists() {
            tracing::debug!(file = %path.display(), "file does not exist, not moved");
            continue;
        }
        let dest = target.join(file_name(&path));
        match store.move_out(&path, &dest) {
            Ok(()) => moved.push(dest),
            Err(e) => tracing::warn!(error = %e, "file not moved"),
        }
    }
    tracing::info!(folder = %target.display(), moved = moved.len(), "current year split into its own folder");
    Ok(Some(SplitOutcome { folder: target, moved }))
}
