use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::audio::{AudioMetadata, BitrateMode};
use crate::date::CanonicalDate;

type DateBuckets = BTreeMap<CanonicalDate, Vec<PathBuf>>;

/// Average, shortest and longest episode length in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// Podcast-wide date -> files mapping plus the figures derived from it.
///
/// `current` holds the latest scan. `all_time` is a copy of whatever
/// `current` held before the first rebuild and is never cleared, so the
/// all-time bounds can only widen.
#[derive(Debug, Clone)]
pub struct Timeline {
    current: DateBuckets,
    all_time: Option<DateBuckets>,
    bitrates: BTreeMap<String, Vec<PathBuf>>,
    formats: BTreeMap<String, Vec<PathBuf>>,
    durations: Vec<(f64, Vec<PathBuf>)>,
    all_vbr: bool,
    earliest_year: Option<i32>,
    first_date: Option<CanonicalDate>,
    last_date: Option<CanonicalDate>,
    all_time_first: Option<CanonicalDate>,
    all_time_last: Option<CanonicalDate>,
    /// Keys without a numeric year that were already reported.
    malformed: BTreeSet<CanonicalDate>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            current: DateBuckets::new(),
            all_time: None,
            bitrates: BTreeMap::new(),
            formats: BTreeMap::new(),
            durations: Vec::new(),
            all_vbr: true,
            earliest_year: None,
            first_date: None,
            last_date: None,
            all_time_first: None,
            all_time_last: None,
            malformed: BTreeSet::new(),
        }
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a previously persisted path -> date mapping.
    pub fn from_prior(files: &BTreeMap<String, String>) -> Self {
        let mut timeline = Self::new();
        for (path, date) in files {
            let date = CanonicalDate::from_stored(date.as_str());
            timeline.report_malformed(&date);
            timeline.current.entry(date).or_default().push(PathBuf::from(path));
        }
        timeline.recompute_bounds();
        timeline
    }

    /// Start a full re-analysis.
    ///
    /// The first call preserves the current mapping as the all-time basis;
    /// later calls only clear.
    pub fn begin_rebuild(&mut self) {
        if self.all_time.is_none() {
            self.all_time = Some(self.current.clone());
        }
        self.current.clear();
        self.bitrates.clear();
        self.formats.clear();
        self.durations.clear();
        self.all_vbr = true;
    }

    /// Add one analyzed file. Trailers count for dates but not for durations.
    pub fn record(&mut self, path: &Path, date: CanonicalDate, meta: &AudioMetadata, is_trailer: bool) {
        self.detach(path);
        self.report_malformed(&date);
        let path = path.to_path_buf();

        self.current.entry(date).or_default().push(path.clone());
        self.bitrates.entry(meta.bitrate_label()).or_default().push(path.clone());
        self.formats.entry(meta.format.as_str().to_string()).or_default().push(path.clone());

        if meta.bitrate_mode == BitrateMode::Cbr {
            self.all_vbr = false;
        }
        if let Some(secs) = meta.duration_secs.filter(|_| !is_trailer) {
            match self.durations.iter_mut().find(|(d, _)| *d == secs) {
                Some((_, files)) => files.push(path),
                None => self.durations.push((secs, vec![path])),
            }
        }
    }

    /// Prune empty buckets and derive current and all-time bounds.
    pub fn recompute_bounds(&mut self) {
        self.current.retain(|_, files| !files.is_empty());
        self.bitrates.retain(|_, files| !files.is_empty());
        self.formats.retain(|_, files| !files.is_empty());
        self.durations.retain(|(_, files)| !files.is_empty());

        let dated: Vec<&CanonicalDate> = self.current.keys().filter(|d| comparable(d)).collect();
        self.earliest_year = dated.iter().filter_map(|d| d.year()).min();
        self.first_date = dated.first().map(|d| (*d).clone());
        self.last_date = dated.last().map(|d| (*d).clone());

        let preserved = self.all_time.iter().flat_map(|m| m.keys()).filter(|d| comparable(d));
        let mut first = self.all_time_first.take();
        let mut last = self.all_time_last.take();
        for date in dated.into_iter().chain(preserved) {
            if first.as_ref().map_or(true, |f| date < f) {
                first = Some(date.clone());
            }
            if last.as_ref().map_or(true, |l| date > l) {
                last = Some(date.clone());
            }
        }
        self.all_time_first = first;
        self.all_time_last = last;
    }

    /// Drop `path` from every bucket, then recompute bounds.
    pub(crate) fn remove_file(&mut self, path: &Path) {
        if !self.detach(path) {
            tracing::debug!(file = %path.display(), "removed file was not tracked");
        }
        self.recompute_bounds();
    }

    /// Swap `old` for `new` in every bucket that held `old`, keeping its position.
    pub(crate) fn update_file_path(&mut self, old: &Path, new: &Path) {
        let mut found = false;
        let buckets = self
            .current
            .values_mut()
            .chain(self.bitrates.values_mut())
            .chain(self.formats.values_mut())
            .chain(self.durations.iter_mut().map(|(_, files)| files));
        for files in buckets {
            for slot in files.iter_mut().filter(|p| p.as_path() == old) {
                *slot = new.to_path_buf();
                found = true;
            }
        }
        if !found {
            tracing::debug!(old = %old.display(), new = %new.display(), "renamed file was not tracked");
        }
        self.recompute_bounds();
    }

    /// Warn about a key that cannot take part in bounds, once per key.
    /// Returns whether a warning was emitted.
    fn report_malformed(&mut self, date: &CanonicalDate) -> bool {
        if date.is_unknown() || date.year().is_some() || self.malformed.contains(date) {
            return false;
        }
        tracing::warn!(date = %date, "date key has no numeric year, excluded from bounds");
        self.malformed.insert(date.clone());
        true
    }

    fn detach(&mut self, path: &Path) -> bool {
        let before = self.file_count();
        let buckets = self
            .current
            .values_mut()
            .chain(self.bitrates.values_mut())
            .chain(self.formats.values_mut())
            .chain(self.durations.iter_mut().map(|(_, files)| files));
        for files in buckets {
            files.retain(|p| p != path);
        }
        self.file_count() != before
    }

    pub fn earliest_year(&self) -> Option<i32> {
        self.earliest_year
    }

    pub fn first_date(&self) -> Option<&CanonicalDate> {
        self.first_date.as_ref()
    }

    pub fn last_date(&self) -> Option<&CanonicalDate> {
        self.last_date.as_ref()
    }

    pub fn all_time_first(&self) -> Option<&CanonicalDate> {
        self.all_time_first.as_ref()
    }

    pub fn all_time_last(&self) -> Option<&CanonicalDate> {
        self.all_time_last.as_ref()
    }

    /// False as soon as any file of the scan was CBR.
    pub fn all_vbr(&self) -> bool {
        self.all_vbr
    }

    pub fn dates(&self) -> impl Iterator<Item = (&CanonicalDate, &[PathBuf])> {
        self.current.iter().map(|(d, files)| (d, files.as_slice()))
    }

    pub fn files_on(&self, date: &CanonicalDate) -> &[PathBuf] {
        self.current.get(date).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn bitrates(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.bitrates.iter().map(|(k, files)| (k.as_str(), files.as_slice()))
    }

    pub fn formats(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.formats.iter().map(|(k, files)| (k.as_str(), files.as_slice()))
    }

    pub fn file_count(&self) -> usize {
        self.current.values().map(Vec::len).sum()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.current.values().flatten().any(|p| p == path)
    }

    /// Statistics over the distinct durations seen. `None` without durations.
    pub fn duration_stats(&self) -> Option<DurationStats> {
        let values: Vec<f64> = self.durations.iter().map(|(d, _)| *d).collect();
        if values.is_empty() {
            return None;
        }
        let sum: f64 = values.iter().sum();
        Some(DurationStats {
            average: sum / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// Path -> date mapping for the ledger.
    pub fn to_persisted(&self) -> BTreeMap<String, String> {
        self.current
            .iter()
            .flat_map(|(date, files)| files.iter().map(move |p| (p.to_string_lossy().into_owned(), date.to_string())))
            .collect()
    }
}

/// Whether a key takes part in min/max computations.
fn comparable(date: &CanonicalDate) -> bool {
    !date.is_unknown() && date.year().is_some()
}
