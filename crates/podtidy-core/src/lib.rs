pub mod analyzer;
pub mod audio;
pub mod config;
pub mod date;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod listing;
pub mod normalize;
pub mod reconcile;
pub mod split;
pub mod store;
pub mod timeline;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

pub use config::{Config, Patterns};
pub use error::{Error, Result};

use analyzer::AnalysisSummary;
use audio::TagReader;
use reconcile::{NumberingReport, ReferenceTitles};
use split::SplitOutcome;
use store::FileStore;
use timeline::{DurationStats, Timeline};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub folder: PathBuf,
    /// Podcast name; defaults to the folder name without its "(...)" part.
    #[serde(default)]
    pub name: Option<String>,
    /// Saved RSS/Atom feed used to number episodes.
    #[serde(default)]
    pub rss: Option<PathBuf>,
    /// Overrides `ledger_file` from the config.
    #[serde(default)]
    pub ledger: Option<PathBuf>,
    /// Ignore what the ledger remembers about this podcast.
    #[serde(default)]
    pub refresh: bool,
    #[serde(default)]
    pub split: bool,
    #[serde(default)]
    pub skip_numbering: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub name: String,
    pub analysis: AnalysisSummary,
    pub earliest_year: Option<i32>,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub all_time_first: Option<String>,
    pub all_time_last: Option<String>,
    pub durations: Option<DurationStats>,
    pub all_vbr: bool,
    /// Bucket label -> number of files.
    pub bitrates: BTreeMap<String, usize>,
    pub formats: BTreeMap<String, usize>,
    pub split: Option<SplitOutcome>,
    pub numbering: Option<NumberingReport>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One podcast folder and the timeline of its episodes.
#[derive(Debug)]
pub struct Podcast {
    pub name: String,
    pub folder: PathBuf,
    store: FileStore,
}

impl Podcast {
    pub fn new(name: impl Into<String>, folder: impl Into<PathBuf>, timeline: Timeline) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            store: FileStore::new(timeline),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        self.store.timeline()
    }

    pub fn analyze(&mut self, patterns: &Patterns, reader: &dyn TagReader) -> Result<AnalysisSummary> {
        analyzer::analyze(&self.folder, &mut self.store, patterns, reader)
    }

    pub fn split(&mut self, patterns: &Patterns, current_year: i32) -> Result<Option<SplitOutcome>> {
        split::split_current_year(&self.folder, &mut self.store, &self.name, &patterns.current_folder_suffix, current_year)
    }

    pub fn reconcile(&mut self, patterns: &Patterns, titles: Option<&ReferenceTitles>) -> Result<NumberingReport> {
        reconcile::reconcile(&self.folder, &mut self.store, patterns, titles)
    }
}

/// Podcast name for a folder: its last component, cleaned.
pub fn podcast_name(folder: &Path, patterns: &Patterns) -> String {
    let raw = folder.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    patterns.clean_name(&raw)
}

/// Run the whole pipeline for one podcast folder.
pub fn process(options: &ProcessOptions, config: &Config) -> anyhow::Result<ProcessResult> {
    process_with_reader(options, config, &audio::FileTagReader)
}

pub fn process_with_reader(options: &ProcessOptions, config: &Config, reader: &dyn TagReader) -> anyhow::Result<ProcessResult> {
    let patterns = config.compile().map_err(Error::from)?;
    let name = match &options.name {
        Some(name) => name.clone(),
        None => podcast_name(&options.folder, &patterns),
    };
    let mut warnings = Vec::new();

    let ledger_path = options.ledger.clone().unwrap_or_else(|| config.ledger_file.clone());
    let mut ledger = ledger::Ledger::load(&ledger_path).map_err(Error::from)?;
    let timeline = match ledger.get(&name) {
        Some(entry) if !options.refresh => {
            tracing::debug!(files = entry.files.len(), "seeding timeline from ledger");
            Timeline::from_prior(&entry.files)
        }
        _ => Timeline::new(),
    };
    let mut podcast = Podcast::new(name.clone(), options.folder.clone(), timeline);

    tracing::info!(podcast = %name, "analyzing episodes");
    let mut analysis = podcast.analyze(&patterns, reader)?;

    let mut split = None;
    if options.split {
        let current_year = chrono::Local::now().year();
        split = podcast.split(&patterns, current_year)?;
        if split.as_ref().is_some_and(|s| !s.moved.is_empty()) {
            analysis = podcast.analyze(&patterns, reader)?;
        }
    }

    let mut numbering = None;
    if !options.skip_numbering {
        tracing::info!("checking episode numbers");
        let titles = options.rss.as_deref().and_then(|path| match feed::load_episode_titles(path) {
            Ok(titles) => Some(ReferenceTitles::from_feed_order(titles, &patterns)),
            Err(e) => {
                tracing::warn!(error = %e, "feed unavailable, episode numbers not filled in");
                warnings.push(e.to_string());
                None
            }
        });
        let report = podcast.reconcile(&patterns, titles.as_ref())?;
        warnings.extend(report.unnumbered.iter().map(|p| format!("episode number missing: {}", p.display())));
        numbering = Some(report);
    }

    let timeline = podcast.timeline();
    ledger.upsert(&name, timeline.to_persisted());
    ledger.save(&ledger_path).map_err(Error::from)?;

    let as_string = |d: Option<&date::CanonicalDate>| d.map(|d| d.to_string());
    Ok(ProcessResult {
        name,
        analysis,
        earliest_year: timeline.earliest_year(),
        first_date: as_string(timeline.first_date()),
        last_date: as_string(timeline.last_date()),
        all_time_first: as_string(timeline.all_time_first()),
        all_time_last: as_string(timeline.all_time_last()),
        durations: timeline.duration_stats(),
        all_vbr: timeline.all_vbr(),
        bitrates: timeline.bitrates().map(|(k, files)| (k.to_string(), files.len())).collect(),
        formats: timeline.formats().map(|(k, files)| (k.to_string(), files.len())).collect(),
        split,
        numbering,
        warnings,
    })
}
