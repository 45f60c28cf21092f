use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholders recognized in `conflicting_dates_template`.
pub const TEMPLATE_PLACEHOLDERS: &[&str] = &["{prefix}", "{date}", "{episode}", "{suffix}"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid `{key}` pattern: {source}")]
    Pattern {
        key: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("`{key}` must define capture group `{group}`")]
    MissingGroup { key: &'static str, group: &'static str },

    #[error("invalid `conflicting_dates_template`: {0}")]
    Template(String),
}

/// User configuration, loaded from TOML. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File suffixes (without the dot) treated as episodes.
    pub audio_extensions: Vec<String>,
    /// Case-insensitive substrings marking a trailer/promo episode.
    pub trailer_patterns: Vec<String>,
    pub episode_pattern: String,
    pub date_pattern: String,
    pub numbered_episode_pattern: String,
    pub trailing_episode_pattern: String,
    /// The last match splits a file name into prefix and suffix.
    pub title_split_pattern: String,
    pub conflicting_dates_template: String,
    pub clean_name_pattern: String,
    pub current_folder_suffix: String,
    pub ledger_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_extensions: vec!["mp3".to_string(), "m4a".to_string()],
            trailer_patterns: vec!["trailer".to_string()],
            episode_pattern: r"(?P<label>Ep\.?|Episode|E|Part)(?P<space>\s*)(?P<number>\d+)".to_string(),
            date_pattern: r"\b(\d{4}-\d{2}-\d{2})\b".to_string(),
            numbered_episode_pattern: r"^(.* - )(\d{4}-\d{2}-\d{2}) (\d+)\. (.*)(\.\w+)".to_string(),
            trailing_episode_pattern: r"^(?P<prefix>.* - )(?P<date>\d{4}-\d{2}-\d{2}) (?P<title>.*?) - (?P<episode>(?:Ep\.?|Episode|E)?\s*\d+)(?P<ext>\.\w+)$".to_string(),
            title_split_pattern: " - ".to_string(),
            conflicting_dates_template: "{prefix} - {date} Ep. {episode} - {suffix}".to_string(),
            clean_name_pattern: r"^(.*?)\s*\(".to_string(),
            current_folder_suffix: " --CURRENT--".to_string(),
            ledger_file: PathBuf::from("podcasts.json"),
        }
    }
}

impl Config {
    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate and compile all patterns.
    pub fn compile(&self) -> Result<Patterns, ConfigError> {
        let episode = build("episode_pattern", &self.episode_pattern, true)?;
        require_group(&episode, "episode_pattern", "number")?;
        let date = build("date_pattern", &self.date_pattern, false)?;
        if date.captures_len() < 2 {
            return Err(ConfigError::MissingGroup { key: "date_pattern", group: "1" });
        }
        let trailing = build("trailing_episode_pattern", &self.trailing_episode_pattern, false)?;
        for group in ["prefix", "date", "title", "episode", "ext"] {
            require_group(&trailing, "trailing_episode_pattern", group)?;
        }
        let clean_name = build("clean_name_pattern", &self.clean_name_pattern, false)?;
        if clean_name.captures_len() < 2 {
            return Err(ConfigError::MissingGroup { key: "clean_name_pattern", group: "1" });
        }
        validate_template(&self.conflicting_dates_template)?;

        let trailer = if self.trailer_patterns.iter().all(|p| p.is_empty()) {
            None
        } else {
            let alternation = self
                .trailer_patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            Some(build("trailer_patterns", &alternation, true)?)
        };

        Ok(Patterns {
            episode,
            date,
            numbered: build("numbered_episode_pattern", &self.numbered_episode_pattern, false)?,
            trailing,
            title_split: build("title_split_pattern", &self.title_split_pattern, false)?,
            clean_name,
            trailer,
            template: self.conflicting_dates_template.clone(),
            audio_extensions: self.audio_extensions.iter().map(|e| e.to_lowercase()).collect(),
            current_folder_suffix: self.current_folder_suffix.clone(),
        })
    }
}

/// Compiled form of [`Config`], shared by the engine modules.
#[derive(Debug, Clone)]
pub struct Patterns {
    pub episode: Regex,
    pub date: Regex,
    pub numbered: Regex,
    pub trailing: Regex,
    pub title_split: Regex,
    pub clean_name: Regex,
    trailer: Option<Regex>,
    pub template: String,
    pub audio_extensions: Vec<String>,
    pub current_folder_suffix: String,
}

impl Patterns {
    /// True if `name` contains one of the trailer substrings (case-insensitive).
    pub fn is_trailer(&self, name: &str) -> bool {
        match &self.trailer {
            Some(re) => re.is_match(name),
            None => false,
        }
    }

    pub fn is_audio(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.audio_extensions.iter().any(|a| a.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// First `YYYY-MM-DD` style date embedded in a file name.
    pub fn find_date<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.date.captures(name).and_then(|c| c.get(1)).map(|m| m.as_str())
    }

    /// Render the reconciled file name template.
    pub fn render_template(&self, prefix: &str, date: &str, episode: &str, suffix: &str) -> String {
        self.template
            .replace("{prefix}", prefix)
            .replace("{date}", date)
            .replace("{episode}", episode)
            .replace("{suffix}", suffix)
    }

    /// Podcast name without a trailing "(...)" qualifier or split-folder suffix.
    pub fn clean_name(&self, name: &str) -> String {
        let name = name.replace(self.current_folder_suffix.as_str(), "");
        match self.clean_name.captures(&name).and_then(|c| c.get(1)) {
            Some(m) => m.as_str().trim().to_string(),
            None => name.trim().to_string(),
        }
    }
}

fn build(key: &'static str, pattern: &str, case_insensitive: bool) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|source| ConfigError::Pattern { key, source })
}

fn require_group(re: &Regex, key: &'static str, group: &'static str) -> Result<(), ConfigError> {
    if re.capture_names().flatten().any(|n| n == group) {
        Ok(())
    } else {
        Err(ConfigError::MissingGroup { key, group })
    }
}

fn validate_template(template: &str) -> Result<(), ConfigError> {
    if !template.contains("{episode}") {
        return Err(ConfigError::Template("missing `{episode}` placeholder".to_string()));
    }
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            return Err(ConfigError::Template(format!("unclosed placeholder in `{}`", template)));
        };
        let placeholder = &rest[start..start + len + 1];
        if !TEMPLATE_PLACEHOLDERS.contains(&placeholder) {
            return Err(ConfigError::Template(format!("unknown placeholder `{}`", placeholder)));
        }
        rest = &rest[start + len + 1..];
    }
    Ok(())
}
