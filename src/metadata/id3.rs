// ID3 tag reading
//
// Reads the ID3v2 header tag (frames TIT2, TPE1, APIC) with an ID3v1
// trailer fallback, producing display metadata for one track. Extraction
// is a total function: malformed input degrades to partial or empty
// metadata and the title always falls back to the file name.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::library::track::TagSource;
use crate::metadata::text::{decode_text, find_terminator};

/// How much of the file head is materialized when looking for an ID3v2
/// tag. Tags larger than this are treated as truncated.
const MAX_HEADER_SCAN: u64 = 1_572_864;

/// Embedded artwork pulled from an APIC frame.
///
/// The holder owns the raw image bytes outright; dropping the value (or
/// replacing it in the session) releases everything derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub data: Vec<u8>,
    pub mime: String,
}

/// Display metadata for one track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMetadata {
    pub title: String,
    pub artist: String,
    pub artwork: Option<Artwork>,
}

/// Get the regex used to validate frame identifiers
fn frame_id_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Z0-9]{4}$").unwrap())
}

/// Extract title, artist and embedded artwork from a track.
///
/// Lookup order: ID3v2 frames, then the ID3v1 trailer (only when the v2
/// scan produced neither title nor artist), then the file name with its
/// `.mp3` extension removed. Never fails: an I/O error anywhere during
/// the scan drops back to the file-name title with no artist or artwork.
pub fn extract_metadata(source: &impl TagSource) -> TagMetadata {
    let mut meta = match read_tags(source) {
        Ok(meta) => meta,
        Err(e) => {
            debug!("tag read failed for {}: {}", source.display_name(), e);
            TagMetadata::default()
        }
    };

    if meta.title.is_empty() {
        meta.title = title_from_name(&source.display_name());
    }
    meta
}

fn read_tags(source: &impl TagSource) -> std::io::Result<TagMetadata> {
    let mut meta = TagMetadata::default();

    let file_len = source.byte_len()?;
    let header = source.read_range(0, MAX_HEADER_SCAN.min(file_len))?;
    parse_id3v2(&header, &mut meta);

    // The trailer tag only gets a look when the frame scan came up with
    // nothing at all
    if meta.title.is_empty() && meta.artist.is_empty() && file_len >= 128 {
        let tail = source.read_range(file_len - 128, file_len)?;
        parse_id3v1(&tail, &mut meta);
    }

    Ok(meta)
}

/// Scan ID3v2 frames for TIT2 / TPE1 / APIC
fn parse_id3v2(header: &[u8], meta: &mut TagMetadata) {
    if header.len() < 10 || &header[..3] != b"ID3" {
        return;
    }

    let version = header[3];
    // The tag size field is sync-safe in every ID3v2 version
    let tag_size = syncsafe_u32(&header[6..10]) as usize;
    let tag_end = (tag_size + 10).min(header.len());

    let mut offset = 10;
    while offset + 10 <= tag_end {
        let frame_id = match std::str::from_utf8(&header[offset..offset + 4]) {
            Ok(id) => id,
            Err(_) => break,
        };
        if !frame_id_regex().is_match(frame_id) {
            // Padding or garbage; nothing real follows
            break;
        }

        let size_bytes = [
            header[offset + 4],
            header[offset + 5],
            header[offset + 6],
            header[offset + 7],
        ];
        // Frame sizes are sync-safe only in v2.4; earlier versions use a
        // plain big-endian u32
        let frame_size = if version == 4 {
            syncsafe_u32(&size_bytes) as usize
        } else {
            u32::from_be_bytes(size_bytes) as usize
        };

        let data_start = offset + 10;
        let data_end = match data_start.checked_add(frame_size) {
            Some(end) if end <= tag_end => end,
            // Declared size runs past the scanned region: truncated or
            // corrupt tag, keep what was already extracted
            _ => break,
        };
        let payload = &header[data_start..data_end];

        match frame_id {
            "TIT2" if meta.title.is_empty() => {
                if let Some(text) = decode_text_frame(payload) {
                    meta.title = text;
                }
            }
            "TPE1" if meta.artist.is_empty() => {
                if let Some(text) = decode_text_frame(payload) {
                    meta.artist = text;
                }
            }
            "APIC" if meta.artwork.is_none() => {
                meta.artwork = parse_apic(payload);
            }
            _ => {}
        }

        offset = data_end;
    }
}

/// Decode a text frame payload: one encoding byte, then the string
fn decode_text_frame(payload: &[u8]) -> Option<String> {
    if payload.is_empty() {
        return None;
    }
    let encoding = payload[0];
    Some(decode_text(&payload[1..], encoding).trim().to_string())
}

/// Pull the image out of an APIC frame.
///
/// Layout: encoding byte, Latin-1 MIME string to a single NUL, one
/// picture-type byte, description terminated in the frame's text encoding,
/// then the raw image data. A frame that is too short, has no MIME
/// terminator, or whose payload the image probe rejects yields `None`.
fn parse_apic(payload: &[u8]) -> Option<Artwork> {
    if payload.is_empty() {
        return None;
    }
    let encoding = payload[0];

    // MIME is always single-byte text regardless of the frame encoding
    let mime_start = 1;
    let mime_end = payload[mime_start..]
        .iter()
        .position(|b| *b == 0x00)
        .map(|idx| mime_start + idx)?;
    let mime = decode_text(&payload[mime_start..mime_end], 0);

    let mut pos = mime_end + 1;
    if pos >= payload.len() {
        return None;
    }

    // One byte of picture type, not interpreted
    pos += 1;

    let desc_end = find_terminator(payload, pos.min(payload.len()), encoding);
    pos = desc_end + if encoding == 1 || encoding == 2 { 2 } else { 1 };
    if pos >= payload.len() {
        return None;
    }

    let data = payload[pos..].to_vec();
    // A payload the probe cannot identify as an image is dropped, not an
    // error
    if image::guess_format(&data).is_err() {
        return None;
    }

    let mime = if mime.is_empty() {
        "image/jpeg".to_string()
    } else {
        mime
    };
    Some(Artwork { data, mime })
}

/// Read the fixed-layout ID3v1 trailer: title at [3,33), artist at [33,63)
fn parse_id3v1(tail: &[u8], meta: &mut TagMetadata) {
    if tail.len() < 128 || &tail[..3] != b"TAG" {
        return;
    }

    let title = decode_text(&tail[3..33], 0).trim().to_string();
    let artist = decode_text(&tail[33..63], 0).trim().to_string();

    if meta.title.is_empty() && !title.is_empty() {
        meta.title = title;
    }
    if meta.artist.is_empty() && !artist.is_empty() {
        meta.artist = artist;
    }
}

/// Decode a 28-bit sync-safe integer: the low 7 bits of each byte,
/// most-significant byte first
fn syncsafe_u32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32 & 0x7f) << 21)
        | ((bytes[1] as u32 & 0x7f) << 14)
        | ((bytes[2] as u32 & 0x7f) << 7)
        | (bytes[3] as u32 & 0x7f)
}

/// Title fallback: the display name with a trailing `.mp3` removed
fn title_from_name(name: &str) -> String {
    if name.len() >= 4
        && name.is_char_boundary(name.len() - 4)
        && name[name.len() - 4..].eq_ignore_ascii_case(".mp3")
    {
        name[..name.len() - 4].to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory stand-in for a track file
    struct MemorySource {
        data: Vec<u8>,
        name: &'static str,
    }

    impl MemorySource {
        fn new(data: Vec<u8>, name: &'static str) -> Self {
            Self { data, name }
        }
    }

    impl TagSource for MemorySource {
        fn byte_len(&self) -> std::io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn read_range(&self, start: u64, end: u64) -> std::io::Result<Vec<u8>> {
            let len = self.data.len() as u64;
            let start = start.min(len) as usize;
            let end = end.min(len) as usize;
            Ok(self.data[start..end.max(start)].to_vec())
        }

        fn display_name(&self) -> String {
            self.name.to_string()
        }
    }

    /// Source whose reads always fail
    struct BrokenSource;

    impl TagSource for BrokenSource {
        fn byte_len(&self) -> std::io::Result<u64> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "gone"))
        }

        fn read_range(&self, _start: u64, _end: u64) -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "gone"))
        }

        fn display_name(&self) -> String {
            "Vanished Song.MP3".to_string()
        }
    }

    fn syncsafe_bytes(value: u32) -> [u8; 4] {
        [
            ((value >> 21) & 0x7f) as u8,
            ((value >> 14) & 0x7f) as u8,
            ((value >> 7) & 0x7f) as u8,
            (value & 0x7f) as u8,
        ]
    }

    /// Assemble an ID3v2 tag: header plus the given frame bytes
    fn id3v2_tag(version: u8, frames: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"ID3");
        buf.push(version);
        buf.push(0); // revision
        buf.push(0); // flags
        buf.extend_from_slice(&syncsafe_bytes(frames.len() as u32));
        buf.extend_from_slice(frames);
        buf
    }

    /// Assemble one frame with the version's size encoding
    fn frame(version: u8, id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(id);
        if version == 4 {
            buf.extend_from_slice(&syncsafe_bytes(payload.len() as u32));
        } else {
            buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        }
        buf.extend_from_slice(&[0, 0]); // frame flags
        buf.extend_from_slice(payload);
        buf
    }

    fn text_payload(encoding: u8, text: &[u8]) -> Vec<u8> {
        let mut payload = vec![encoding];
        payload.extend_from_slice(text);
        payload
    }

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    /// APIC payload with a PNG-looking image
    fn apic_payload(encoding: u8, mime: &[u8], terminated: bool) -> Vec<u8> {
        let mut payload = vec![encoding];
        payload.extend_from_slice(mime);
        if terminated {
            payload.push(0x00);
        }
        payload.push(3); // picture type: front cover
        if encoding == 1 || encoding == 2 {
            payload.extend_from_slice(&[0x00, 0x00]); // empty description
        } else {
            payload.push(0x00);
        }
        payload.extend_from_slice(PNG_MAGIC);
        payload.extend_from_slice(&[0u8; 8]);
        payload
    }

    fn id3v1_tail(title: &[u8], artist: &[u8]) -> Vec<u8> {
        let mut tail = vec![0u8; 128];
        tail[..3].copy_from_slice(b"TAG");
        tail[3..3 + title.len()].copy_from_slice(title);
        tail[33..33 + artist.len()].copy_from_slice(artist);
        tail
    }

    #[test]
    fn test_syncsafe_decoding() {
        assert_eq!(syncsafe_u32(&[0x00, 0x00, 0x02, 0x01]), 257);
        assert_eq!(syncsafe_u32(&[0x7f, 0x7f, 0x7f, 0x7f]), 0x0FFF_FFFF);
        // High bits are masked off
        assert_eq!(syncsafe_u32(&[0x80, 0x80, 0x82, 0x81]), 257);
    }

    #[test]
    fn test_v3_title_with_nul_padding() {
        let payload = text_payload(0, b"Hi\0\0");
        let tag = id3v2_tag(3, &frame(3, b"TIT2", &payload));
        let source = MemorySource::new(tag, "x.mp3");

        let meta = extract_metadata(&source);
        assert_eq!(meta.title, "Hi");
        assert_eq!(meta.artist, "");
        assert!(meta.artwork.is_none());
    }

    #[test]
    fn test_v4_syncsafe_sizes_match_v3_plain_sizes() {
        let title = text_payload(0, b"Same Song");
        let artist = text_payload(0, b"Same Artist");

        let mut v3_frames = frame(3, b"TIT2", &title);
        v3_frames.extend_from_slice(&frame(3, b"TPE1", &artist));
        let mut v4_frames = frame(4, b"TIT2", &title);
        v4_frames.extend_from_slice(&frame(4, b"TPE1", &artist));

        let v3 = extract_metadata(&MemorySource::new(id3v2_tag(3, &v3_frames), "a.mp3"));
        let v4 = extract_metadata(&MemorySource::new(id3v2_tag(4, &v4_frames), "a.mp3"));
        assert_eq!(v3, v4);
        assert_eq!(v3.title, "Same Song");
        assert_eq!(v3.artist, "Same Artist");
    }

    #[test]
    fn test_utf16_title_frame() {
        let mut text = vec![0xFF, 0xFE];
        for unit in "Übermut".encode_utf16() {
            text.extend_from_slice(&unit.to_le_bytes());
        }
        let payload = text_payload(1, &text);
        let tag = id3v2_tag(3, &frame(3, b"TIT2", &payload));

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert_eq!(meta.title, "Übermut");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut frames = frame(3, b"TIT2", &text_payload(0, b"First"));
        frames.extend_from_slice(&frame(3, b"TIT2", &text_payload(0, b"Second")));
        let tag = id3v2_tag(3, &frames);

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert_eq!(meta.title, "First");
    }

    #[test]
    fn test_empty_text_frame_does_not_block_later_one() {
        // A zero-length TIT2 is skipped; the next one still fills the field
        let mut frames = frame(3, b"TIT2", &[]);
        frames.extend_from_slice(&frame(3, b"TIT2", &text_payload(0, b"Real Title")));
        let tag = id3v2_tag(3, &frames);

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert_eq!(meta.title, "Real Title");
    }

    #[test]
    fn test_unknown_frames_are_skipped() {
        let mut frames = frame(3, b"TXXX", &text_payload(0, b"ignored"));
        frames.extend_from_slice(&frame(3, b"TPE1", &text_payload(0, b"Artist")));
        let tag = id3v2_tag(3, &frames);

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert_eq!(meta.artist, "Artist");
    }

    #[test]
    fn test_padding_terminates_scan() {
        // Zero padding after the first frame must stop the walk; the TPE1
        // hiding past it is unreachable
        let mut frames = frame(3, b"TIT2", &text_payload(0, b"Kept"));
        frames.extend_from_slice(&[0u8; 10]);
        frames.extend_from_slice(&frame(3, b"TPE1", &text_payload(0, b"Lost")));
        let tag = id3v2_tag(3, &frames);

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert_eq!(meta.title, "Kept");
        assert_eq!(meta.artist, "");
    }

    #[test]
    fn test_oversized_frame_keeps_partials() {
        let mut frames = frame(3, b"TIT2", &text_payload(0, b"Partial"));
        // Frame claiming far more data than the tag holds
        frames.extend_from_slice(b"TPE1");
        frames.extend_from_slice(&10_000u32.to_be_bytes());
        frames.extend_from_slice(&[0, 0, 0, b'x']);
        let tag = id3v2_tag(3, &frames);

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert_eq!(meta.title, "Partial");
        assert_eq!(meta.artist, "");
    }

    #[test]
    fn test_apic_extracts_artwork() {
        let payload = apic_payload(0, b"image/png", true);
        let tag = id3v2_tag(3, &frame(3, b"APIC", &payload));

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        let art = meta.artwork.expect("artwork");
        assert_eq!(art.mime, "image/png");
        assert!(art.data.starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_apic_utf16_description() {
        let payload = apic_payload(1, b"image/png", true);
        let tag = id3v2_tag(3, &frame(3, b"APIC", &payload));

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert!(meta.artwork.is_some());
    }

    #[test]
    fn test_apic_missing_mime_terminator_yields_no_artwork() {
        let mut frames = frame(3, b"APIC", &apic_payload(0, b"image/png", false));
        frames.extend_from_slice(&frame(3, b"TIT2", &text_payload(0, b"Still Here")));
        let tag = id3v2_tag(3, &frames);

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert!(meta.artwork.is_none());
        assert_eq!(meta.title, "Still Here");
    }

    #[test]
    fn test_apic_payload_failing_image_probe_is_dropped() {
        let mut payload = vec![0];
        payload.extend_from_slice(b"image/png\0");
        payload.push(3);
        payload.push(0x00);
        payload.extend_from_slice(b"this is not an image");
        let tag = id3v2_tag(3, &frame(3, b"APIC", &payload));

        let meta = extract_metadata(&MemorySource::new(tag, "x.mp3"));
        assert!(meta.artwork.is_none());
    }

    #[test]
    fn test_id3v1_fallback() {
        let data = id3v1_tail(b"Song ", b"Someone");
        let meta = extract_metadata(&MemorySource::new(data, "x.mp3"));
        assert_eq!(meta.title, "Song");
        assert_eq!(meta.artist, "Someone");
        assert!(meta.artwork.is_none());
    }

    #[test]
    fn test_id3v1_skipped_when_v2_found_either_field() {
        // TIT2 present, artist empty: the trailer must not get a look
        let tag = id3v2_tag(3, &frame(3, b"TIT2", &text_payload(0, b"From V2")));
        let mut data = tag;
        let pad = 128usize.saturating_sub(data.len()) + 16;
        data.extend(std::iter::repeat(0xAA).take(pad));
        let tail = id3v1_tail(b"V1 Title", b"V1 Artist");
        data.extend_from_slice(&tail);

        let meta = extract_metadata(&MemorySource::new(data, "x.mp3"));
        assert_eq!(meta.title, "From V2");
        assert_eq!(meta.artist, "");
    }

    #[test]
    fn test_short_file_skips_trailer_probe() {
        let meta = extract_metadata(&MemorySource::new(vec![0u8; 64], "tiny.mp3"));
        assert_eq!(meta.title, "tiny");
    }

    #[test]
    fn test_no_tags_falls_back_to_file_name() {
        let meta = extract_metadata(&MemorySource::new(vec![0u8; 256], "My Track.MP3"));
        assert_eq!(meta.title, "My Track");
        assert_eq!(meta.artist, "");
        assert!(meta.artwork.is_none());
    }

    #[test]
    fn test_read_failure_degrades_to_file_name() {
        let meta = extract_metadata(&BrokenSource);
        assert_eq!(meta.title, "Vanished Song");
        assert_eq!(meta.artist, "");
        assert!(meta.artwork.is_none());
    }

    #[test]
    fn test_title_from_name_without_extension() {
        assert_eq!(title_from_name("plain"), "plain");
        assert_eq!(title_from_name("song.ogg"), "song.ogg");
        assert_eq!(title_from_name("song.mp3"), "song");
        assert_eq!(title_from_name("song.MP3"), "song");
    }
}
