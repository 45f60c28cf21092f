use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::feed::FeedError;
use crate::ledger::LedgerError;
use crate::store::StoreError;

/// Errors that stop processing of a podcast.
///
/// Per-file problems never surface here; they are logged and the file is
/// skipped or degraded instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Every file in the scan failed to yield metadata.
    #[error("no valid audio files found in {}", .0.display())]
    NoValidAudio(PathBuf),

    #[error("cannot list folder {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create folder {}: {source}", path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, Error>;
