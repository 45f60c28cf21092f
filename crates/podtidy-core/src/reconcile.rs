//! Episode number clean-up.
//!
//! Runs in order:
//! - move a trailing "- Ep 5" next to the date,
//! - zero-pad every episode number to the widest one in the folder,
//! - number files that share a date with other files by matching their
//!   names against the feed's chronological title list,
//! - report audio files that still lack the "<date> <n>. <title>" form
//!   when other files already have it.
//!
//! All renames go through [`FileStore`], so the timeline follows along.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Patterns;
use crate::error::Result;
use crate::listing::{audio_files, file_name};
use crate::normalize::normalize_title;
use crate::store::FileStore;

/// Episode titles, oldest first, as used for numbering.
#[derive(Debug, Clone)]
pub struct ReferenceTitles {
    titles: Vec<(String, String)>,
    has_trailer: bool,
}

impl ReferenceTitles {
    /// Build from titles in feed order (newest first).
    pub fn from_feed_order(mut titles: Vec<String>, patterns: &Patterns) -> Self {
        titles.reverse();
        let has_trailer = titles.first().is_some_and(|t| patterns.is_trailer(t));
        if has_trailer {
            tracing::debug!(title = %titles[0], "first episode is a trailer, numbering shifted by one");
        }
        let titles = titles
            .into_iter()
            .map(|t| {
                let normalized = normalize_title(&t);
                (t, normalized)
            })
            .collect();
        Self { titles, has_trailer }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn has_trailer(&self) -> bool {
        self.has_trailer
    }

    /// Digits needed for the highest number this list can hand out.
    pub fn pad_width(&self) -> usize {
        let highest = self.len() - usize::from(self.has_trailer);
        digits(highest as u64)
    }

    /// First title, oldest to newest, contained in the normalized file name.
    pub fn find_number(&self, name: &str) -> Option<(u64, &str)> {
        let normalized_name = normalize_title(name);
        self.titles
            .iter()
            .enumerate()
            .filter(|(_, (_, normalized))| !normalized.is_empty())
            .find(|(_, (_, normalized))| normalized_name.contains(normalized.as_str()))
            .map(|(index, (title, _))| ((index + 1 - usize::from(self.has_trailer)) as u64, title.as_str()))
    }
}

/// A number handed out to one file from the reference titles.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeNumberAssignment {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub title: String,
    pub number: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NumberingReport {
    /// Files whose trailing episode number was moved next to the date.
    pub reordered: usize,
    /// Files whose episode number was zero-padded.
    pub padded: usize,
    pub assignments: Vec<EpisodeNumberAssignment>,
    /// Audio files lacking the numbered form while others have it.
    pub unnumbered: Vec<PathBuf>,
}

/// Run every numbering pass over `folder`.
pub fn reconcile(
    folder: &Path,
    store: &mut FileStore,
    patterns: &Patterns,
    titles: Option<&ReferenceTitles>,
) -> Result<NumberingReport> {
    let mut report = NumberingReport {
        reordered: move_trailing_numbers(folder, store, patterns)?,
        padded: pad_episode_numbers(folder, store, patterns)?,
        ..Default::default()
    };

    match titles {
        Some(titles) if !titles.is_empty() => {
            let candidates = find_unnumbered_by_date(&audio_files(folder, patterns)?, patterns);
            if !candidates.is_empty() {
                report.assignments = assign_from_titles(&candidates, titles, store, patterns);
            }
        }
        _ => tracing::debug!("no reference titles, skipping gap filling"),
    }

    report.unnumbered = check_numbering(folder, patterns)?;
    Ok(report)
}

/// `<prefix><date> <title> - Ep 5.ext` becomes `<prefix><date> Ep 5 - <title>.ext`.
pub fn move_trailing_numbers(folder: &Path, store: &mut FileStore, patterns: &Patterns) -> Result<usize> {
    let mut count = 0;
    for path in audio_files(folder, patterns)? {
        let Some(caps) = patterns.trailing.captures(file_name(&path)) else {
            continue;
        };
        let title = caps["title"].trim_end_matches([' ', '-']).trim();
        let new_name = format!("{}{} {} - {}{}", &caps["prefix"], &caps["date"], caps["episode"].trim(), title, &caps["ext"]);
        if rename_logged(store, &path, &new_name) {
            count += 1;
        }
    }
    Ok(count)
}

/// Zero-pad the first episode number in each name to the widest in the folder.
/// Running it twice renames nothing the second time.
pub fn pad_episode_numbers(folder: &Path, store: &mut FileStore, patterns: &Patterns) -> Result<usize> {
    let numbered: Vec<(PathBuf, u64)> = audio_files(folder, patterns)?
        .into_iter()
        .filter_map(|path| {
            let number = patterns.episode.captures(file_name(&path))?.name("number")?.as_str().parse().ok()?;
            Some((path, number))
        })
        .collect();

    let Some(max) = numbered.iter().map(|(_, n)| *n).max() else {
        tracing::debug!("no files with episode numbers found");
        return Ok(0);
    };
    let width = digits(max);

    let mut count = 0;
    for (path, number) in numbered {
        let name = file_name(&path);
        let Some(range) = patterns.episode.captures(name).and_then(|c| c.name("number")).map(|m| m.range()) else {
            continue;
        };
        let new_name = format!("{}{:0width$}{}", &name[..range.start], number, &name[range.end..], width = width);
        if new_name != name && rename_logged(store, &path, &new_name) {
            count += 1;
        }
    }
    Ok(count)
}

/// Files without an episode number that share their date with other files.
/// Keys are dates; files keep listing order.
pub fn find_unnumbered_by_date(files: &[PathBuf], patterns: &Patterns) -> BTreeMap<String, Vec<PathBuf>> {
    let mut by_date: BTreeMap<String, Vec<&PathBuf>> = BTreeMap::new();
    for path in files {
        if let Some(date) = patterns.find_date(file_name(path)) {
            by_date.entry(date.to_string()).or_default().push(path);
        }
    }

    let candidates: BTreeMap<String, Vec<PathBuf>> = by_date
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .filter_map(|(date, files)| {
            let missing: Vec<PathBuf> = files
                .into_iter()
                .filter(|p| !patterns.episode.is_match(file_name(p)))
                .cloned()
                .collect();
            (!missing.is_empty()).then_some((date, missing))
        })
        .collect();
    tracing::debug!(dates = candidates.len(), "dates with files lacking episode numbers");
    candidates
}

/// Number each candidate from the reference titles and rename it.
pub fn assign_from_titles(
    candidates: &BTreeMap<String, Vec<PathBuf>>,
    titles: &ReferenceTitles,
    store: &mut FileStore,
    patterns: &Patterns,
) -> Vec<EpisodeNumberAssignment> {
    let width = titles.pad_width();
    let mut assignments = Vec::new();

    for (date, files) in candidates {
        for path in files {
            let name = file_name(path);
            let Some((number, title)) = titles.find_number(name) else {
                tracing::debug!(file = name, "no reference title matches");
                continue;
            };

            let undated = name.replace(&format!("{} ", date), "");
            let undated = undated.trim();
            let Some(split) = patterns.title_split.find_iter(undated).last() else {
                tracing::debug!(file = name, "no title delimiter, leaving as is");
                continue;
            };
            let prefix = undated[..split.start()].trim();
            let suffix = undated[split.end()..].trim();
            let padded = format!("{:0width$}", number, width = width);
            let new_name = patterns.render_template(prefix, date, &padded, suffix);

            let new_path = path.with_file_name(&new_name);
            if rename_logged(store, path, &new_name) {
                assignments.push(EpisodeNumberAssignment {
                    old_path: path.clone(),
                    new_path,
                    title: title.to_string(),
                    number,
                });
            }
        }
    }
    assignments
}

/// Audio files not in the numbered form, if at least one file is.
pub fn check_numbering(folder: &Path, patterns: &Patterns) -> Result<Vec<PathBuf>> {
    let files = audio_files(folder, patterns)?;
    if !files.iter().any(|p| patterns.numbered.is_match(file_name(p))) {
        return Ok(Vec::new());
    }
    let missing: Vec<PathBuf> = files.into_iter().filter(|p| !patterns.numbered.is_match(file_name(p))).collect();
    for path in &missing {
        tracing::warn!(file = %path.display(), "episode number missing");
    }
    Ok(missing)
}

fn rename_logged(store: &mut FileStore, path: &Path, new_name: &str) -> bool {
    let new_path = path.with_file_name(new_name);
    match store.rename(path, &new_path) {
        Ok(()) => {
            tracing::debug!(from = file_name(path), to = new_name, "renamed");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "rename failed, file skipped");
            false
        }
    }
}

fn digits(n: u64) -> usize {
    n.max(1).to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::timeline::Timeline;
    use std::fs;

    fn patterns() -> Patterns {
        Config::default().compile().unwrap()
    }

    fn folder_with(names: &[&str]) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        (dir, FileStore::new(Timeline::new()))
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn titles(feed_order: &[&str]) -> ReferenceTitles {
        ReferenceTitles::from_feed_order(feed_order.iter().map(|s| s.to_string()).collect(), &patterns())
    }

    #[test]
    fn test_trailer_shifts_numbers() {
        // Feed order is newest first
        let refs = titles(&["Ep 2 Growth", "Ep 1 Launch", "Trailer"]);
        assert!(refs.has_trailer());
        assert_eq!(refs.find_number("Show - 2023-01-05 Ep 1 Launch.mp3"), Some((1, "Ep 1 Launch")));
        assert_eq!(refs.pad_width(), 1);

        let refs = titles(&["Growth", "Launch"]);
        assert!(!refs.has_trailer());
        assert_eq!(refs.find_number("launch!.mp3"), Some((1, "Launch")));
        assert_eq!(refs.find_number("Something else.mp3"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let refs = titles(&["Launch Party", "Launch"]);
        assert_eq!(refs.find_number("Show - Launch Party.mp3"), Some((1, "Launch")));
    }

    #[test]
    fn test_blank_titles_never_match() {
        let refs = titles(&["Real", "!!!"]);
        assert_eq!(refs.find_number("Show - Real.mp3"), Some((2, "Real")));
    }

    #[test]
    fn test_pad_width_from_title_count() {
        let many: Vec<String> = (1..=12).map(|i| format!("Title {}", i)).collect();
        let refs = ReferenceTitles::from_feed_order(many, &patterns());
        assert_eq!(refs.len(), 12);
        assert_eq!(refs.pad_width(), 2);
    }

    #[test]
    fn test_only_shared_dates_are_candidates() {
        let files: Vec<PathBuf> = [
            "Show - 2023-01-05 Launch Party.mp3",
            "Show - 2023-01-05 Growth Hacking.mp3",
            "Show - 2023-06-01 Solo.mp3",
            "Show - 2023-07-01 Ep 3 Numbered.mp3",
            "Show - 2023-07-01 Ep 4 Also Numbered.mp3",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        let candidates = find_unnumbered_by_date(&files, &patterns());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates["2023-01-05"], files[..2].to_vec());
    }

    #[test]
    fn test_gap_filling_renames_and_tracks() {
        let (dir, mut store) = folder_with(&[
            "Show - 2023-01-05 Launch Party.mp3",
            "Show - 2023-01-05 Growth Hacking.mp3",
            "Show - 2023-06-01 Solo.mp3",
        ]);
        let meta = crate::audio::AudioMetadata {
            recording_date: None,
            bitrate_kbps: Some(128),
            bitrate_mode: crate::audio::BitrateMode::Cbr,
            duration_secs: Some(60.0),
            format: crate::audio::ContainerFormat::Mp3,
        };
        let launch = dir.path().join("Show - 2023-01-05 Launch Party.mp3");
        store.timeline_mut().record(&launch, crate::date::CanonicalDate::from_stored("2023-01-05"), &meta, false);
        store.timeline_mut().recompute_bounds();

        let refs = titles(&["Solo", "Growth Hacking", "Launch Party", "Official Trailer"]);
        let report = reconcile(dir.path(), &mut store, &patterns(), Some(&refs)).unwrap();

        assert_eq!(report.assignments.len(), 2);
        assert_eq!(
            names(dir.path()),
            vec![
                "Show - 2023-01-05 Ep. 1 - Launch Party.mp3",
                "Show - 2023-01-05 Ep. 2 - Growth Hacking.mp3",
                "Show - 2023-06-01 Solo.mp3",
            ]
        );
        assert!(store.timeline().contains(&dir.path().join("Show - 2023-01-05 Ep. 1 - Launch Party.mp3")));
        assert!(!store.timeline().contains(&launch));
    }

    #[test]
    fn test_gap_filling_without_delimiter_is_skipped() {
        let (dir, mut store) = folder_with(&["2023-01-05 Launch.mp3", "2023-01-05 Growth.mp3"]);
        let refs = titles(&["Growth", "Launch"]);
        let report = reconcile(dir.path(), &mut store, &patterns(), Some(&refs)).unwrap();
        assert!(report.assignments.is_empty());
        assert_eq!(names(dir.path()), vec!["2023-01-05 Growth.mp3", "2023-01-05 Launch.mp3"]);
    }

    #[test]
    fn test_padding_is_idempotent() {
        let (dir, mut store) = folder_with(&[
            "Show - 2023-01-01 Ep 7 - One.mp3",
            "Show - 2023-02-01 Ep 12 - Two.mp3",
            "Show - 2023-03-01 Episode 105 - Three.m4a",
            "cover.jpg",
        ]);
        let p = patterns();
        assert_eq!(pad_episode_numbers(dir.path(), &mut store, &p).unwrap(), 2);
        assert_eq!(
            names(dir.path()),
            vec![
                "Show - 2023-01-01 Ep 007 - One.mp3",
                "Show - 2023-02-01 Ep 012 - Two.mp3",
                "Show - 2023-03-01 Episode 105 - Three.m4a",
                "cover.jpg",
            ]
        );
        assert_eq!(pad_episode_numbers(dir.path(), &mut store, &p).unwrap(), 0);
    }

    #[test]
    fn test_trailing_number_moved_forward() {
        let (dir, mut store) = folder_with(&["Show - 2023-01-05 Launch Party - Ep 5.mp3", "Show - 2023-01-06 Plain.mp3"]);
        assert_eq!(move_trailing_numbers(dir.path(), &mut store, &patterns()).unwrap(), 1);
        assert_eq!(names(dir.path()), vec!["Show - 2023-01-05 Ep 5 - Launch Party.mp3", "Show - 2023-01-06 Plain.mp3"]);
    }

    #[test]
    fn test_check_numbering_reports_stragglers() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Show - 2023-01-05 1. Launch.mp3", "Show - 2023-01-12 Growth.mp3", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let missing = check_numbering(dir.path(), &patterns()).unwrap();
        assert_eq!(missing, vec![dir.path().join("Show - 2023-01-12 Growth.mp3")]);

        fs::remove_file(dir.path().join("Show - 2023-01-05 1. Launch.mp3")).unwrap();
        assert!(check_numbering(dir.path(), &patterns()).unwrap().is_empty());
    }
}
