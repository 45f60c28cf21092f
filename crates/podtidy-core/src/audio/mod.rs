pub mod cascade;
pub mod reader;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use reader::FileTagReader;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Not a format we handle; skipped, not fatal.
    #[error("unsupported audio format: {}", .0.display())]
    Unsupported(PathBuf),

    /// The container could not be parsed at all.
    #[error("corrupt audio file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    Mp3,
    M4a,
}

impl ContainerFormat {
    /// Derive the container from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp3" => Some(Self::Mp3),
            "m4a" | "mp4" | "m4b" => Some(Self::M4a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateMode {
    Vbr,
    Cbr,
}

impl fmt::Display for BitrateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vbr => "VBR",
            Self::Cbr => "CBR",
        })
    }
}

/// Raw tag values and stream properties of one file, as read by a [`TagReader`].
#[derive(Debug, Clone)]
pub struct TagSnapshot {
    pub format: ContainerFormat,
    /// Text frames keyed by frame id (`TDRC`, `TYER`, `©day`, ...).
    pub frames: Vec<(String, String)>,
    /// Free-text user frames as (description, value).
    pub user_texts: Vec<(String, String)>,
    pub bitrate_kbps: Option<u32>,
    pub bitrate_mode: BitrateMode,
    pub duration_secs: Option<f64>,
}

impl TagSnapshot {
    pub fn frame(&self, id: &str) -> Option<&str> {
        self.frames.iter().find(|(k, _)| k == id).map(|(_, v)| v.as_str())
    }
}

/// Source of raw tags for a file.
pub trait TagReader {
    fn read_tags(&self, path: &Path) -> Result<TagSnapshot, ExtractError>;
}

/// Metadata the timeline needs from one audio file.
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    pub recording_date: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub bitrate_mode: BitrateMode,
    pub duration_secs: Option<f64>,
    pub format: ContainerFormat,
}

impl AudioMetadata {
    /// Bucket label: "VBR", "<n> kbps" or "Unknown".
    pub fn bitrate_label(&self) -> String {
        match (self.bitrate_mode, self.bitrate_kbps) {
            (BitrateMode::Vbr, _) => "VBR".to_string(),
            (BitrateMode::Cbr, Some(kbps)) if kbps > 0 => format!("{} kbps", kbps),
            _ => "Unknown".to_string(),
        }
    }
}

/// Read one file and pick its recording date token via the tag cascade.
pub fn extract_metadata(reader: &dyn TagReader, path: &Path) -> Result<AudioMetadata, ExtractError> {
    let tags = reader.read_tags(path)?;
    let recording_date = cascade::find_date_token(&tags);
    if recording_date.is_none() {
        tracing::debug!(file = %path.display(), "no date tag found");
    }
    Ok(AudioMetadata {
        recording_date,
        bitrate_kbps: tags.bitrate_kbps,
        bitrate_mode: tags.bitrate_mode,
        duration_secs: tags.duration_secs,
        format: tags.format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader(TagSnapshot);

    impl TagReader for FixedReader {
        fn read_tags(&self, _path: &Path) -> Result<TagSnapshot, ExtractError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ContainerFormat::from_path(Path::new("a/B.MP3")), Some(ContainerFormat::Mp3));
        assert_eq!(ContainerFormat::from_path(Path::new("b.m4a")), Some(ContainerFormat::M4a));
        assert_eq!(ContainerFormat::from_path(Path::new("c.ogg")), None);
        assert_eq!(ContainerFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_extract_metadata() {
        let reader = FixedReader(TagSnapshot {
            format: ContainerFormat::Mp3,
            frames: vec![("TYER".to_string(), "2015".to_string())],
            user_texts: vec![],
            bitrate_kbps: Some(64),
            bitrate_mode: BitrateMode::Cbr,
            duration_secs: Some(1800.5),
        });
        let meta = extract_metadata(&reader, Path::new("x.mp3")).unwrap();
        assert_eq!(meta.recording_date.as_deref(), Some("2015"));
        assert_eq!(meta.bitrate_label(), "64 kbps");
        assert_eq!(meta.duration_secs, Some(1800.5));
    }

    #[test]
    fn test_bitrate_labels() {
        let mut meta = AudioMetadata {
            recording_date: None,
            bitrate_kbps: Some(192),
            bitrate_mode: BitrateMode::Vbr,
            duration_secs: None,
            format: ContainerFormat::Mp3,
        };
        assert_eq!(meta.bitrate_label(), "VBR");
        meta.bitrate_mode = BitrateMode::Cbr;
        meta.bitrate_kbps = None;
        assert_eq!(meta.bitrate_label(), "Unknown");
    }
}
