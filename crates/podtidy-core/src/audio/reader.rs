use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use id3::TagLike;
use lofty::file::FileType;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::TagType;

use super::{BitrateMode, ContainerFormat, ExtractError, TagReader, TagSnapshot};

/// Bytes scanned after the ID3v2 header when looking for a VBR header.
const SNIFF_WINDOW: usize = 4096;

/// Reads tags from disk: stream properties via lofty, ID3 frames via id3.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTagReader;

impl TagReader for FileTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagSnapshot, ExtractError> {
        let format = ContainerFormat::from_path(path).ok_or_else(|| ExtractError::Unsupported(path.to_path_buf()))?;

        let tagged = Probe::open(path)
            .and_then(|p| p.read())
            .map_err(|e| ExtractError::Corrupt { path: path.to_path_buf(), reason: e.to_string() })?;

        let properties = tagged.properties();
        let bitrate_kbps = properties.audio_bitrate().filter(|b| *b > 0);
        let duration = properties.duration().as_secs_f64();
        let duration_secs = (duration > 0.0).then_some(duration);

        let mut snapshot = TagSnapshot {
            format,
            frames: Vec::new(),
            user_texts: Vec::new(),
            bitrate_kbps,
            bitrate_mode: BitrateMode::Cbr,
            duration_secs,
        };

        match (format, tagged.file_type()) {
            (ContainerFormat::Mp3, FileType::Mpeg) => {
                snapshot.bitrate_mode = mpeg_bitrate_mode(path)?;
                read_id3_frames(path, &mut snapshot);
            }
            (ContainerFormat::M4a, FileType::Mp4) => {
                // MP4 carries no VBR flag; a missing bitrate is reported as VBR
                snapshot.bitrate_mode = if bitrate_kbps.is_some() { BitrateMode::Cbr } else { BitrateMode::Vbr };
                if let Some(day) = tagged.tag(TagType::Mp4Ilst).and_then(|t| t.get_string(&ItemKey::RecordingDate)) {
                    snapshot.frames.push(("\u{a9}day".to_string(), day.to_string()));
                }
            }
            (_, other) => {
                tracing::debug!(file = %path.display(), detected = ?other, "extension does not match container");
                return Err(ExtractError::Unsupported(path.to_path_buf()));
            }
        }
        Ok(snapshot)
    }
}

/// Collect ID3v2 text frames. A broken tag leaves the snapshot without frames.
fn read_id3_frames(path: &Path, snapshot: &mut TagSnapshot) {
    let tag = match id3::Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => return,
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "failed to read ID3 tags");
            return;
        }
    };

    for frame in tag.frames() {
        if let Some(text) = frame.content().text() {
            // Multi-valued text frames are NUL separated; the first value counts
            let first = text.split('\0').next().unwrap_or_default();
            snapshot.frames.push((frame.id().to_string(), first.to_string()));
        }
    }
    for ext in tag.extended_texts() {
        snapshot.user_texts.push((ext.description.clone(), ext.value.clone()));
    }
}

fn mpeg_bitrate_mode(path: &Path) -> Result<BitrateMode, ExtractError> {
    let mut file = File::open(path).map_err(|source| ExtractError::Io { path: path.to_path_buf(), source })?;
    sniff_bitrate_mode(&mut file).map_err(|source| ExtractError::Io { path: path.to_path_buf(), source })
}

/// Look for a Xing/Info-style `Xing` or `VBRI` header in the first audio frame.
pub fn sniff_bitrate_mode<R: Read + Seek>(reader: &mut R) -> io::Result<BitrateMode> {
    let mut header = [0u8; 10];
    let read = read_up_to(reader, &mut header)?;
    let offset = id3v2_length(&header[..read]);
    reader.seek(SeekFrom::Start(offset))?;

    let mut window = vec![0u8; SNIFF_WINDOW];
    let read = read_up_to(reader, &mut window)?;
    let window = &window[..read];

    let vbr = window.windows(4).any(|w| w == b"Xing" || w == b"VBRI");
    Ok(if vbr { BitrateMode::Vbr } else { BitrateMode::Cbr })
}

/// Total size of a leading ID3v2 tag including header and footer, or 0.
fn id3v2_length(header: &[u8]) -> u64 {
    if header.len() < 10 || &header[..3] != b"ID3" {
        return 0;
    }
    let size = header[6..10].iter().fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7f));
    let footer = if header[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::cascade::find_date_token;
    use id3::frame::ExtendedText;
    use id3::{Frame, Tag, Version};
    use std::io::Cursor;
    use std::path::PathBuf;

    /// MPEG-1 Layer III, 128 kbps, 44.1 kHz, stereo, no padding.
    const FRAME_HEADER: [u8; 4] = [0xff, 0xfb, 0x90, 0x00];
    const FRAME_LEN: usize = 417;
    const FRAME_COUNT: usize = 40;

    /// A run of silent frames; with `xing` the first one carries a Xing header.
    fn mpeg_stream(xing: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_COUNT * FRAME_LEN);
        for i in 0..FRAME_COUNT {
            let mut frame = vec![0u8; FRAME_LEN];
            frame[..4].copy_from_slice(&FRAME_HEADER);
            if xing && i == 0 {
                // After 32 bytes of stereo side info
                frame[36..40].copy_from_slice(b"Xing");
                frame[40..44].copy_from_slice(&3u32.to_be_bytes());
                frame[44..48].copy_from_slice(&(FRAME_COUNT as u32).to_be_bytes());
                frame[48..52].copy_from_slice(&((FRAME_COUNT * FRAME_LEN) as u32).to_be_bytes());
            }
            out.extend(frame);
        }
        out
    }

    fn tagged_mp3(dir: &Path, name: &str, xing: bool, version: Version, frames: Vec<Frame>) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, mpeg_stream(xing)).unwrap();
        if !frames.is_empty() {
            let mut tag = Tag::new();
            for frame in frames {
                tag.add_frame(frame);
            }
            tag.write_to_path(&path, version).unwrap();
        }
        path
    }

    fn with_id3_header(size: u32, flags: u8, body: &[u8]) -> Vec<u8> {
        let mut out = b"ID3\x04\x00".to_vec();
        out.push(flags);
        out.extend([(size >> 21) as u8 & 0x7f, (size >> 14) as u8 & 0x7f, (size >> 7) as u8 & 0x7f, size as u8 & 0x7f]);
        out.extend(std::iter::repeat(0u8).take(size as usize + if flags & 0x10 != 0 { 10 } else { 0 }));
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_syncsafe_length() {
        let bytes = with_id3_header(300, 0, b"");
        assert_eq!(id3v2_length(&bytes[..10]), 310);
        let bytes = with_id3_header(300, 0x10, b"");
        assert_eq!(id3v2_length(&bytes[..10]), 320);
        assert_eq!(id3v2_length(b"\xff\xfb\x90\x00"), 0);
    }

    #[test]
    fn test_sniff_xing_after_tag() {
        let mut frame = vec![0xff, 0xfb, 0x90, 0x00];
        frame.extend([0u8; 32]);
        frame.extend_from_slice(b"Xing");
        let bytes = with_id3_header(1000, 0, &frame);
        assert_eq!(sniff_bitrate_mode(&mut Cursor::new(bytes)).unwrap(), BitrateMode::Vbr);
    }

    #[test]
    fn test_sniff_vbri_without_tag() {
        let mut bytes = vec![0xff, 0xfb, 0x90, 0x00];
        bytes.extend([0u8; 32]);
        bytes.extend_from_slice(b"VBRI");
        assert_eq!(sniff_bitrate_mode(&mut Cursor::new(bytes)).unwrap(), BitrateMode::Vbr);
    }

    #[test]
    fn test_sniff_constant_bitrate() {
        let bytes = with_id3_header(20, 0, &[0xff, 0xfb, 0x90, 0x00, 1, 2, 3]);
        assert_eq!(sniff_bitrate_mode(&mut Cursor::new(bytes)).unwrap(), BitrateMode::Cbr);
        assert_eq!(sniff_bitrate_mode(&mut Cursor::new(Vec::new())).unwrap(), BitrateMode::Cbr);
    }

    #[test]
    fn test_marker_inside_tag_is_ignored() {
        // "Xing" inside the skipped tag body must not count
        let mut bytes = with_id3_header(8, 0, &[0xff, 0xfb, 0x90, 0x00]);
        bytes[12..16].copy_from_slice(b"Xing");
        assert_eq!(sniff_bitrate_mode(&mut Cursor::new(bytes)).unwrap(), BitrateMode::Cbr);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = FileTagReader.read_tags(Path::new("/tmp/notes.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = FileTagReader.read_tags(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Corrupt { .. }));
    }

    #[test]
    fn test_reads_v24_recording_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = tagged_mp3(dir.path(), "ep.mp3", false, Version::Id3v24, vec![Frame::text("TDRC", "2023-01-05")]);

        let tags = FileTagReader.read_tags(&path).unwrap();
        assert_eq!(tags.format, ContainerFormat::Mp3);
        assert_eq!(tags.frame("TDRC"), Some("2023-01-05"));
        assert_eq!(tags.bitrate_mode, BitrateMode::Cbr);
        assert!(tags.duration_secs.is_some());
        assert_eq!(find_date_token(&tags).as_deref(), Some("2023-01-05"));
    }

    #[test]
    fn test_reads_v23_year_and_day_month() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![Frame::text("TYER", "2023"), Frame::text("TDAT", "0511")];
        let path = tagged_mp3(dir.path(), "ep.mp3", false, Version::Id3v23, frames);

        let tags = FileTagReader.read_tags(&path).unwrap();
        assert_eq!(tags.frame("TYER"), Some("2023"));
        assert_eq!(tags.frame("TDAT"), Some("0511"));
        assert_eq!(find_date_token(&tags).as_deref(), Some("2023-11-05"));
    }

    #[test]
    fn test_reads_user_release_date() {
        let dir = tempfile::tempdir().unwrap();
        let release = ExtendedText {
            description: "RELEASEDATE".to_string(),
            value: "Thu, 02 Nov 2023 16:31:53 -0000".to_string(),
        };
        let path = tagged_mp3(dir.path(), "ep.mp3", false, Version::Id3v23, vec![release.into()]);

        let tags = FileTagReader.read_tags(&path).unwrap();
        assert!(tags.user_texts.iter().any(|(desc, _)| desc == "RELEASEDATE"));
        assert_eq!(find_date_token(&tags).as_deref(), Some("Thu, 02 Nov 2023 16:31:53 -0000"));
    }

    #[test]
    fn test_untagged_file_has_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = tagged_mp3(dir.path(), "bare.mp3", false, Version::Id3v24, vec![]);

        let tags = FileTagReader.read_tags(&path).unwrap();
        assert!(tags.frames.is_empty() && tags.user_texts.is_empty());
        assert_eq!(find_date_token(&tags), None);
    }

    #[test]
    fn test_xing_stream_is_vbr() {
        let dir = tempfile::tempdir().unwrap();
        let path = tagged_mp3(dir.path(), "vbr.mp3", true, Version::Id3v24, vec![Frame::text("TDRC", "2023-01-05")]);

        let tags = FileTagReader.read_tags(&path).unwrap();
        assert_eq!(tags.bitrate_mode, BitrateMode::Vbr);
        assert_eq!(tags.frame("TDRC"), Some("2023-01-05"));
    }
}
