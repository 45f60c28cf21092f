use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// One entry of the strict format list.
enum Layout {
    /// Plain calendar date.
    Date(&'static str),
    /// Four-digit year on its own, meaning January 1st.
    Year,
    /// Date-time with a numeric offset; the date is taken in that offset.
    Offset(&'static str),
    /// Date-time followed by a named zone such as `GMT` or `UTC`.
    Named(&'static str),
}

static STRICT_FORMATS: &[Layout] = &[
    Layout::Date("%Y-%m-%d"),
    Layout::Year,
    Layout::Offset("%a, %d %b %Y %H:%M:%S %z"), // Thu, 02 Nov 2023 16:31:53 -0000
    Layout::Named("%a, %d %b %Y %H:%M:%S"),
    Layout::Offset("%d %b %Y %H:%M:%S %z"),
    Layout::Named("%d %b %Y %H:%M:%S"),
];

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());
static ZONE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?P<rest>.*\S)\s+[A-Za-z]{1,5}$").unwrap());
static DIGIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static NUMERIC_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?P<y>\d{4})[-/.](?P<m>\d{1,2})$").unwrap());
static NAMED_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<m>[A-Za-z]{3,9})\.?,?\s+(?P<y>\d{4})$").unwrap());
static EMBEDDED_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<y>(?:19|20)\d{2})[-/.](?P<m>\d{1,2})[-/.](?P<d>\d{1,2})").unwrap()
});

const LENIENT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
];

const LENIENT_DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y%m%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a, %d %b %Y",
    "%a %d %b %Y",
];

/// Try the fixed format list in order. First format that parses wins.
pub fn parse_strict(token: &str) -> Option<NaiveDate> {
    STRICT_FORMATS.iter().find_map(|layout| match layout {
        Layout::Date(fmt) => NaiveDate::parse_from_str(token, fmt).ok(),
        Layout::Year => {
            if YEAR_RE.is_match(token) {
                NaiveDate::from_ymd_opt(token.parse().ok()?, 1, 1)
            } else {
                None
            }
        }
        Layout::Offset(fmt) => DateTime::parse_from_str(token, fmt)
            .ok()
            .map(|dt| dt.naive_local().date()),
        Layout::Named(fmt) => {
            let caps = ZONE_NAME_RE.captures(token)?;
            NaiveDateTime::parse_from_str(&caps["rest"], fmt).ok().map(|dt| dt.date())
        }
    })
}

/// General-purpose parsing for anything the strict list rejected.
pub fn parse_lenient(token: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.naive_local().date());
    }
    for fmt in LENIENT_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(token, fmt) {
            if has_whole_year(token, dt.date()) {
                return Some(dt.date());
            }
        }
    }
    for fmt in LENIENT_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(token, fmt) {
            if has_whole_year(token, d) {
                return Some(d);
            }
        }
    }
    if let Some(d) = parse_month_precision(token) {
        return Some(d);
    }

    // Last chance: a date somewhere inside free text, e.g. "recorded 2021/03/04 live"
    let caps = EMBEDDED_DATE_RE.captures(token)?;
    NaiveDate::from_ymd_opt(caps["y"].parse().ok()?, caps["m"].parse().ok()?, caps["d"].parse().ok()?)
}

/// `%d` happily eats two digits of a bare year ("May 2019" parses as the
/// 20th of May, year 19). Accept a parse only if its year appears in the
/// token as a full four-digit run, or as the head of a `YYYYMMDD` run.
fn has_whole_year(token: &str, date: NaiveDate) -> bool {
    let year = format!("{:04}", date.year());
    DIGIT_RUN_RE
        .find_iter(token)
        .any(|run| run.as_str() == year || (run.as_str().len() == 8 && run.as_str().starts_with(&year)))
}

/// Year and month only ("2019-05", "May 2019"). The day is the 1st.
fn parse_month_precision(token: &str) -> Option<NaiveDate> {
    if let Some(caps) = NUMERIC_MONTH_RE.captures(token) {
        return NaiveDate::from_ymd_opt(caps["y"].parse().ok()?, caps["m"].parse().ok()?, 1);
    }
    let caps = NAMED_MONTH_RE.captures(token)?;
    NaiveDate::parse_from_str(&format!("1 {} {}", &caps["m"], &caps["y"]), "%d %B %Y").ok()
}

/// RFC 2822 mailbox dates, as found in feeds.
pub fn parse_rfc2822(token: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc2822(token)
        .ok()
        .map(|dt| dt.naive_local().date())
}
