use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Current ledger file format version
const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ledger {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported ledger version {found} in {}", path.display())]
    Version { path: PathBuf, found: u32 },
}

/// What we remember about one podcast between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub name: String,
    pub updated: DateTime<Utc>,
    /// Path -> canonical date of every file seen in the last scan.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Fields owned by other tools, kept as they are.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Per-podcast bookkeeping, stored as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub version: u32,
    #[serde(default)]
    pub podcasts: BTreeMap<String, LedgerEntry>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self { version: LEDGER_VERSION, podcasts: BTreeMap::new() }
    }
}

impl Ledger {
    /// Load the ledger. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).map_err(|source| LedgerError::Io { path: path.to_path_buf(), source })?;
        let ledger: Ledger = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| LedgerError::Json { path: path.to_path_buf(), source })?;
        if ledger.version != LEDGER_VERSION {
            return Err(LedgerError::Version { path: path.to_path_buf(), found: ledger.version });
        }
        Ok(ledger)
    }

    /// Write to a sibling temp file, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let temp_path = path.with_extension("tmp");

        let file = File::create(&temp_path).map_err(io_err)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|source| LedgerError::Json { path: path.to_path_buf(), source })?;

        fs::rename(&temp_path, path).map_err(io_err)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LedgerEntry> {
        self.podcasts.get(&podcast_key(name))
    }

    /// Replace the file mapping of `name`, keeping any other fields.
    pub fn upsert(&mut self, name: &str, files: BTreeMap<String, String>) -> &LedgerEntry {
        let entry = self.podcasts.entry(podcast_key(name)).or_insert_with(|| LedgerEntry {
            name: name.to_string(),
            updated: Utc::now(),
            files: BTreeMap::new(),
            extra: BTreeMap::new(),
        });
        entry.name = name.to_string();
        entry.files = files;
        entry.updated = Utc::now();
        entry
    }

    pub fn remove(&mut self, name: &str) -> Option<LedgerEntry> {
        self.podcasts.remove(&podcast_key(name))
    }
}

/// Ledger key of a podcast: SHA-256 of its clean name, hex encoded.
pub fn podcast_key(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}
