use std::fs;
use std::path::{Path, PathBuf};

use feed_rs::parser;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("cannot read feed {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse feed {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: parser::ParseFeedError,
    },
}

/// Episode titles of a saved RSS/Atom document, in feed order.
pub fn load_episode_titles(path: &Path) -> Result<Vec<String>, FeedError> {
    let bytes = fs::read(path).map_err(|source| FeedError::Read { path: path.to_path_buf(), source })?;
    parse_episode_titles(&bytes).map_err(|source| FeedError::Parse { path: path.to_path_buf(), source })
}

pub fn parse_episode_titles(xml: &[u8]) -> Result<Vec<String>, parser::ParseFeedError> {
    let feed = parser::parse(xml)?;
    let titles: Vec<String> = feed
        .entries
        .into_iter()
        .filter_map(|entry| entry.title.map(|t| t.content.trim().to_string()))
        .filter(|t| !t.is_empty())
        .collect();
    tracing::debug!(count = titles.len(), "episode titles loaded from feed");
    Ok(titles)
}
