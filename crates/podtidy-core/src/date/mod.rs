pub mod formats;

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel stored for files whose date could not be resolved.
pub const UNKNOWN_DATE: &str = "Unknown";

/// A `YYYY-MM-DD` date string, or the [`UNKNOWN_DATE`] sentinel.
///
/// Ordering is lexical on the string form, which matches calendar order for
/// well-formed keys. Keys read back from a ledger are not re-validated, so a
/// malformed key is possible and is handled by [`CanonicalDate::year`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalDate(String);

impl CanonicalDate {
    pub fn unknown() -> Self {
        Self(UNKNOWN_DATE.to_string())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    /// Wrap a stored key without validation.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_DATE
    }

    /// Year used for bucketing: the first four characters as an integer.
    pub fn year(&self) -> Option<i32> {
        if self.is_unknown() {
            return None;
        }
        self.0.get(..4)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which step of the resolution cascade produced the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    TagStrict,
    TagLenient,
    TagRfc2822,
    FileName,
    ModifiedTime,
    Unresolved,
}

/// Result of date resolution: date + where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateResult {
    pub date: CanonicalDate,
    pub source: DateSource,
}

impl DateResult {
    fn found(date: NaiveDate, source: DateSource) -> Self {
        Self { date: CanonicalDate::from_date(date), source }
    }

    fn unresolved() -> Self {
        Self { date: CanonicalDate::unknown(), source: DateSource::Unresolved }
    }
}

/// Resolve a file's canonical date.
///
/// A tag token, when present, is the only source consulted: if none of the
/// parsers accept it the result is unknown. Without a token the file name and
/// then the modification time are tried.
pub fn resolve_date(token: Option<&str>, path: &Path, date_pattern: &Regex) -> DateResult {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    if let Some(raw) = token.map(str::trim).filter(|t| !t.is_empty()) {
        tracing::debug!(token = raw, file = name, "processing recording date");

        // 1. Fixed formats
        if let Some(d) = formats::parse_strict(raw) {
            return DateResult::found(d, DateSource::TagStrict);
        }
        // 2. Lenient parsing
        if let Some(d) = formats::parse_lenient(raw) {
            return DateResult::found(d, DateSource::TagLenient);
        }
        // 3. Feed-style mailbox dates
        if let Some(d) = formats::parse_rfc2822(raw) {
            return DateResult::found(d, DateSource::TagRfc2822);
        }
        tracing::warn!(token = raw, file = name, "invalid recording date format");
        return DateResult::unresolved();
    }

    // 4. Date embedded in the file name
    if let Some(m) = date_pattern.captures(name).and_then(|c| c.get(1)) {
        return match NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            Ok(d) => DateResult::found(d, DateSource::FileName),
            Err(_) => {
                tracing::warn!(date = m.as_str(), file = %path.display(), "invalid date in file name");
                DateResult::unresolved()
            }
        };
    }

    // 5. Modification time
    match modified_date(path) {
        Some(d) => {
            tracing::info!(file = %path.display(), date = %d, "using file modification date");
            DateResult::found(d, DateSource::ModifiedTime)
        }
        None => {
            tracing::warn!(file = %path.display(), "no date found, filing under Unknown");
            DateResult::unresolved()
        }
    }
}

fn modified_date(path: &Path) -> Option<NaiveDate> {
    let meta = fs::metadata(path).ok()?;
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    let utc = chrono::DateTime::from_timestamp(mtime.unix_seconds(), 0)?;
    Some(utc.with_timezone(&chrono::Local).date_naive())
}
