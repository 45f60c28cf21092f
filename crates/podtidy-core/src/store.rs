use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::timeline::Timeline;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to overwrite existing file {}", .0.display())]
    Exists(PathBuf),

    #[error("cannot remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The only way files of a podcast are renamed, moved or deleted.
///
/// Every entry point performs the file-system operation and then the matching
/// timeline update. If the operation succeeds the update always follows; if it
/// fails the timeline is left as it was. There is no rollback of a completed
/// rename.
#[derive(Debug, Default)]
pub struct FileStore {
    timeline: Timeline,
}

impl FileStore {
    pub fn new(timeline: Timeline) -> Self {
        Self { timeline }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub(crate) fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// Rename within the podcast folder and keep every bucket in sync.
    pub fn rename(&mut self, old: &Path, new: &Path) -> Result<(), StoreError> {
        if old == new {
            return Ok(());
        }
        if new.exists() {
            return Err(StoreError::Exists(new.to_path_buf()));
        }
        fs::rename(old, new).map_err(|source| StoreError::Rename {
            from: old.to_path_buf(),
            to: new.to_path_buf(),
            source,
        })?;
        tracing::debug!(from = %old.display(), to = %new.display(), "renamed");
        self.timeline.update_file_path(old, new);
        Ok(())
    }

    /// Delete a file and drop it from the timeline.
    pub fn remove(&mut self, path: &Path) -> Result<(), StoreError> {
        fs::remove_file(path).map_err(|source| StoreError::Remove {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(file = %path.display(), "removed");
        self.timeline.remove_file(path);
        Ok(())
    }

    /// Move a file out of the podcast (e.g. into another folder). It stops
    /// being tracked here.
    pub fn move_out(&mut self, path: &Path, dest: &Path) -> Result<(), StoreError> {
        if dest.exists() {
            return Err(StoreError::Exists(dest.to_path_buf()));
        }
        fs::rename(path, dest).map_err(|source| StoreError::Rename {
            from: path.to_path_buf(),
            to: dest.to_path_buf(),
            source,
        })?;
        tracing::debug!(from = %path.display(), to = %dest.display(), "moved out");
        self.timeline.remove_file(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioMetadata, BitrateMode, ContainerFormat};
    use crate::date::CanonicalDate;

    fn tracked(dir: &Path, names: &[(&str, &str)]) -> FileStore {
        let meta = AudioMetadata {
            recording_date: None,
            bitrate_kbps: Some(96),
            bitrate_mode: BitrateMode::Cbr,
            duration_secs: Some(100.0),
            format: ContainerFormat::Mp3,
        };
        let mut timeline = Timeline::new();
        for (name, date) in names {
            let path = dir.join(name);
            fs::write(&path, b"x").unwrap();
            timeline.record(&path, CanonicalDate::from_stored(*date), &meta, false);
        }
        timeline.recompute_bounds();
        FileStore::new(timeline)
    }

    #[test]
    fn test_rename_updates_disk_and_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = tracked(dir.path(), &[("a.mp3", "2023-01-05")]);
        let old = dir.path().join("a.mp3");
        let new = dir.path().join("b.mp3");

        store.rename(&old, &new).unwrap();
        assert!(new.exists() && !old.exists());
        assert!(store.timeline().contains(&new));
        assert!(!store.timeline().contains(&old));
    }

    #[test]
    fn test_failed_rename_leaves_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = tracked(dir.path(), &[("a.mp3", "2023-01-05")]);
        let missing = dir.path().join("missing.mp3");
        let err = store.rename(&missing, &dir.path().join("c.mp3")).unwrap_err();
        assert!(matches!(err, StoreError::Rename { .. }));
        assert!(store.timeline().contains(&dir.path().join("a.mp3")));
    }

    #[test]
    fn test_rename_onto_existing_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = tracked(dir.path(), &[("a.mp3", "2023-01-05"), ("b.mp3", "2023-01-06")]);
        let err = store.rename(&dir.path().join("a.mp3"), &dir.path().join("b.mp3")).unwrap_err();
        assert!(matches!(err, StoreError::Exists(_)));
        assert_eq!(store.timeline().file_count(), 2);
    }

    #[test]
    fn test_remove_and_move_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = tracked(dir.path(), &[("a.mp3", "2022-01-01"), ("b.mp3", "2023-01-01")]);

        store.remove(&dir.path().join("a.mp3")).unwrap();
        assert!(!dir.path().join("a.mp3").exists());
        assert_eq!(store.timeline().first_date().map(|d| d.as_str()), Some("2023-01-01"));

        let elsewhere = tempfile::tempdir().unwrap();
        let dest = elsewhere.path().join("b.mp3");
        store.move_out(&dir.path().join("b.mp3"), &dest).unwrap();
        assert!(dest.exists());
        assert_eq!(store.timeline().file_count(), 0);
        assert_eq!(store.timeline().first_date(), None);
    }
}
