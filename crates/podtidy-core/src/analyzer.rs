use std::path::Path;

use serde::Serialize;

use crate::audio::{extract_metadata, TagReader};
use crate::config::Patterns;
use crate::date::{resolve_date, DateSource};
use crate::error::{Error, Result};
use crate::listing::{audio_files, file_name};
use crate::store::FileStore;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AnalysisSummary {
    pub analyzed: usize,
    pub skipped: usize,
    pub unknown_dates: usize,
}

/// Rebuild the timeline from the audio files in `folder`.
///
/// Unreadable files are skipped with a warning. If no file at all yields
/// metadata the podcast cannot be processed and [`Error::NoValidAudio`] is
/// returned.
pub fn analyze(folder: &Path, store: &mut FileStore, patterns: &Patterns, reader: &dyn TagReader) -> Result<AnalysisSummary> {
    let files = audio_files(folder, patterns)?;
    let timeline = store.timeline_mut();
    timeline.begin_rebuild();

    let mut summary = AnalysisSummary::default();
    for path in &files {
        let meta = match extract_metadata(reader, path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(error = %e, "skipping file");
                summary.skipped += 1;
                continue;
            }
        };
        let resolved = resolve_date(meta.recording_date.as_deref(), path, &patterns.date);
        if resolved.source == DateSource::Unresolved {
            summary.unknown_dates += 1;
        }
        let is_trailer = patterns.is_trailer(file_name(path));
        timeline.record(path, resolved.date, &meta, is_trailer);
        summary.analyzed += 1;
    }
    timeline.recompute_bounds();

    if summary.analyzed == 0 {
        tracing::error!(folder = %folder.display(), files = files.len(), "no valid audio files found");
        return Err(Error::NoValidAudio(folder.to_path_buf()));
    }
    tracing::info!(
        analyzed = summary.analyzed,
        skipped = summary.skipped,
        first = ?timeline.first_date().map(|d| d.as_str()),
        last = ?timeline.last_date().map(|d| d.as_str()),
        "analysis finished"
    );
    Ok(summary)
}
