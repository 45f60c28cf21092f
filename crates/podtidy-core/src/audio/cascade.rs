//! Ordered fallback lookups for the recording date tag.
//!
//! Each step is a pure function over a [`TagSnapshot`]. The first step that
//! yields a non-empty value wins; later steps are never consulted.

use super::{ContainerFormat, TagSnapshot};

pub type DateProbe = fn(&TagSnapshot) -> Option<String>;

/// A named lookup step, the name is only used for logging.
pub struct CascadeStep {
    pub name: &'static str,
    pub probe: DateProbe,
}

static MP3_CASCADE: &[CascadeStep] = &[
    CascadeStep { name: "TDRC", probe: recording_time },
    CascadeStep { name: "date", probe: release_time },
    CascadeStep { name: "originaldate", probe: original_date },
    CascadeStep { name: "year", probe: year },
    CascadeStep { name: "TXXX release date", probe: user_release_date },
];

static MP4_CASCADE: &[CascadeStep] = &[CascadeStep { name: "\u{a9}day", probe: mp4_day }];

pub fn steps_for(format: ContainerFormat) -> &'static [CascadeStep] {
    match format {
        ContainerFormat::Mp3 => MP3_CASCADE,
        ContainerFormat::M4a => MP4_CASCADE,
    }
}

/// Run the cascade for the snapshot's format.
pub fn find_date_token(tags: &TagSnapshot) -> Option<String> {
    for step in steps_for(tags.format) {
        if let Some(value) = (step.probe)(tags) {
            tracing::debug!(step = step.name, value = %value, "found date tag");
            return Some(value);
        }
    }
    None
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// TDRC, or for ID3v2.3 tags the TYER year joined with the TDAT `DDMM` day.
fn recording_time(tags: &TagSnapshot) -> Option<String> {
    non_empty(tags.frame("TDRC")).or_else(|| v23_recording_date(tags))
}

fn v23_recording_date(tags: &TagSnapshot) -> Option<String> {
    let year = non_empty(tags.frame("TYER"))?;
    let day_month = non_empty(tags.frame("TDAT"))?;
    let all_digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(&year, 4) || !all_digits(&day_month, 4) {
        tracing::debug!(year = %year, day_month = %day_month, "unusable TYER/TDAT pair");
        return None;
    }
    Some(format!("{}-{}-{}", year, &day_month[2..], &day_month[..2]))
}

fn release_time(tags: &TagSnapshot) -> Option<String> {
    non_empty(tags.frame("TDRL"))
}

fn original_date(tags: &TagSnapshot) -> Option<String> {
    non_empty(tags.frame("TDOR")).or_else(|| non_empty(tags.frame("TORY")))
}

fn year(tags: &TagSnapshot) -> Option<String> {
    non_empty(tags.frame("TYER"))
}

fn user_release_date(tags: &TagSnapshot) -> Option<String> {
    tags.user_texts
        .iter()
        .find(|(desc, _)| {
            let folded: String = desc.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
            folded.contains("releasedate")
        })
        .and_then(|(_, text)| non_empty(Some(text.as_str())))
}

fn mp4_day(tags: &TagSnapshot) -> Option<String> {
    non_empty(tags.frame("\u{a9}day"))
}
