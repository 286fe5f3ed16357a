//! Minimal streaming Matroska writer for uncompressed RGBA video.
//!
//! The encoder pipe carries a Matroska stream instead of bare frames so each
//! frame keeps its own presentation timestamp. The segment has unknown size;
//! every frame is one cluster holding one keyframe `SimpleBlock`.

use crate::frame::Timestamp;

/// Nanoseconds per timestamp tick (1 µs).
pub const TIMESTAMP_SCALE_NS: u64 = 1_000;

const EBML: u32 = 0x1A45DFA3;
const EBML_VERSION: u32 = 0x4286;
const EBML_READ_VERSION: u32 = 0x42F7;
const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
const DOC_TYPE: u32 = 0x4282;
const DOC_TYPE_VERSION: u32 = 0x4287;
const DOC_TYPE_READ_VERSION: u32 = 0x4285;

const SEGMENT: u32 = 0x18538067;
const INFO: u32 = 0x1549A966;
const TIMESTAMP_SCALE: u32 = 0x2AD7B1;
const MUXING_APP: u32 = 0x4D80;
const WRITING_APP: u32 = 0x5741;

const TRACKS: u32 = 0x1654AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_UID: u32 = 0x73C5;
const TRACK_TYPE: u32 = 0x83;
const FLAG_LACING: u32 = 0x9C;
const DEFAULT_DURATION: u32 = 0x23E383;
const CODEC_ID: u32 = 0x86;
const VIDEO: u32 = 0xE0;
const PIXEL_WIDTH: u32 = 0xB0;
const PIXEL_HEIGHT: u32 = 0xBA;
const COLOUR_SPACE: u32 = 0x2EB524;

pub(crate) const CLUSTER: u32 = 0x1F43B675;
pub(crate) const CLUSTER_TIMESTAMP: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;

const VIDEO_TRACK: u64 = 1;
const TRACK_TYPE_VIDEO: u64 = 1;
const KEYFRAME: u8 = 0x80;

/// Unknown-size marker, 8 bytes wide.
const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Bytes needed for `value` as an EBML variable-size integer. The all-ones
/// pattern of each width is reserved.
fn vint_length(value: u64) -> usize {
    (1..8)
        .find(|&len| value < (1u64 << (7 * len)) - 1)
        .unwrap_or(8)
}

fn write_vint(out: &mut Vec<u8>, value: u64) {
    let len = vint_length(value);
    let bytes = value.to_be_bytes();
    let mut encoded = bytes[8 - len..].to_vec();
    encoded[0] |= 0x80 >> (len - 1);
    out.extend_from_slice(&encoded);
}

fn write_id(out: &mut Vec<u8>, id: u32) {
    let bytes = id.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    out.extend_from_slice(&bytes[start..]);
}

fn element(out: &mut Vec<u8>, id: u32, data: &[u8]) {
    write_id(out, id);
    write_vint(out, data.len() as u64);
    out.extend_from_slice(data);
}

fn uint_element(out: &mut Vec<u8>, id: u32, value: u64) {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    element(out, id, &bytes[start..]);
}

/// EBML header, open segment, segment info and the single video track.
pub fn stream_header(width: u32, height: u32, fps: f64) -> Vec<u8> {
    let mut ebml = Vec::new();
    uint_element(&mut ebml, EBML_VERSION, 1);
    uint_element(&mut ebml, EBML_READ_VERSION, 1);
    uint_element(&mut ebml, EBML_MAX_ID_LENGTH, 4);
    uint_element(&mut ebml, EBML_MAX_SIZE_LENGTH, 8);
    element(&mut ebml, DOC_TYPE, b"matroska");
    uint_element(&mut ebml, DOC_TYPE_VERSION, 4);
    uint_element(&mut ebml, DOC_TYPE_READ_VERSION, 2);

    let mut info = Vec::new();
    uint_element(&mut info, TIMESTAMP_SCALE, TIMESTAMP_SCALE_NS);
    element(&mut info, MUXING_APP, b"runstab");
    element(&mut info, WRITING_APP, b"runstab");

    let mut video = Vec::new();
    uint_element(&mut video, PIXEL_WIDTH, width as u64);
    uint_element(&mut video, PIXEL_HEIGHT, height as u64);
    element(&mut video, COLOUR_SPACE, b"RGBA");

    let mut track = Vec::new();
    uint_element(&mut track, TRACK_NUMBER, VIDEO_TRACK);
    uint_element(&mut track, TRACK_UID, VIDEO_TRACK);
    uint_element(&mut track, TRACK_TYPE, TRACK_TYPE_VIDEO);
    uint_element(&mut track, FLAG_LACING, 0);
    element(&mut track, CODEC_ID, b"V_UNCOMPRESSED");
    if fps.is_finite() && fps > 0.0 {
        // Frame-rate hint only; blocks carry the real timing.
        uint_element(&mut track, DEFAULT_DURATION, (1e9 / fps).round() as u64);
    }
    element(&mut track, VIDEO, &video);

    let mut tracks = Vec::new();
    element(&mut tracks, TRACK_ENTRY, &track);

    let mut out = Vec::new();
    element(&mut out, EBML, &ebml);
    write_id(&mut out, SEGMENT);
    out.extend_from_slice(&UNKNOWN_SIZE);
    element(&mut out, INFO, &info);
    element(&mut out, TRACKS, &tracks);
    out
}

/// Everything of one frame's cluster that precedes the `frame_len` pixel
/// bytes.
pub fn frame_prefix(ticks: u64, frame_len: usize) -> Vec<u8> {
    let mut timestamp = Vec::new();
    uint_element(&mut timestamp, CLUSTER_TIMESTAMP, ticks);

    let mut block_header = Vec::new();
    write_vint(&mut block_header, VIDEO_TRACK);
    block_header.extend_from_slice(&0i16.to_be_bytes());
    block_header.push(KEYFRAME);

    let block_len = (block_header.len() + frame_len) as u64;
    let mut block = Vec::new();
    write_id(&mut block, SIMPLE_BLOCK);
    write_vint(&mut block, block_len);
    block.extend_from_slice(&block_header);

    let cluster_len = (timestamp.len() + block.len() + frame_len) as u64;
    let mut out = Vec::new();
    write_id(&mut out, CLUSTER);
    write_vint(&mut out, cluster_len);
    out.extend_from_slice(&timestamp);
    out.extend_from_slice(&block);
    out
}

/// Maps presentation timestamps to block ticks.
///
/// Cluster timestamps are unsigned, so a stream starting before zero is
/// shifted to start at zero; otherwise timestamps are written unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickClock {
    origin: Option<f64>,
}

impl TickClock {
    pub fn ticks(&mut self, pts: Timestamp) -> u64 {
        let seconds = pts.as_secs_f64();
        let origin = *self.origin.get_or_insert(seconds.min(0.0));
        let ticks_per_second = 1e9 / TIMESTAMP_SCALE_NS as f64;
        ((seconds - origin).max(0.0) * ticks_per_second).round() as u64
    }
}

/// Cluster timestamps of a stream produced by this module.
#[cfg(test)]
pub(crate) fn cluster_timestamps(stream: &[u8]) -> Vec<u64> {
    fn read_id(data: &[u8], pos: &mut usize) -> u32 {
        let first = data[*pos];
        let len = first.leading_zeros() as usize + 1;
        let id = data[*pos..*pos + len]
            .iter()
            .fold(0u32, |acc, b| (acc << 8) | *b as u32);
        *pos += len;
        id
    }
    fn read_size(data: &[u8], pos: &mut usize) -> Option<u64> {
        let first = data[*pos];
        let len = first.leading_zeros() as usize + 1;
        let bytes = &data[*pos..*pos + len];
        *pos += len;
        if len == 8 && bytes == &UNKNOWN_SIZE[..] {
            return None;
        }
        let mut value = (first & (0xFFu16 >> len) as u8) as u64;
        for b in &bytes[1..] {
            value = (value << 8) | *b as u64;
        }
        Some(value)
    }

    let mut pos = 0;
    let mut found = Vec::new();
    while pos < stream.len() {
        let id = read_id(stream, &mut pos);
        let size = read_size(stream, &mut pos);
        match (id, size) {
            (SEGMENT, None) => continue,
            (CLUSTER, Some(size)) => {
                let end = pos + size as usize;
                let mut inner = pos;
                while inner < end {
                    let child = read_id(stream, &mut inner);
                    let child_size = read_size(stream, &mut inner).unwrap_or(0) as usize;
                    if child == CLUSTER_TIMESTAMP {
                        let value = stream[inner..inner + child_size]
                            .iter()
                            .fold(0u64, |acc, b| (acc << 8) | *b as u64);
                        found.push(value);
                    }
                    inner += child_size;
                }
                pos = end;
            }
            (_, Some(size)) => pos += size as usize,
            (_, None) => break,
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vint_widths() {
        let mut out = Vec::new();
        write_vint(&mut out, 1);
        assert_eq!(out, [0x81]);

        out.clear();
        write_vint(&mut out, 127);
        assert_eq!(out, [0x40, 0x7F]);

        out.clear();
        write_vint(&mut out, 1080 * 1920 * 4);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0] & 0xF0, 0x10);
    }

    #[test]
    fn test_header_declares_rgba_track() {
        let header = stream_header(1080, 1920, 30.0);
        assert_eq!(&header[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
        let contains = |needle: &[u8]| header.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"matroska"));
        assert!(contains(b"V_UNCOMPRESSED"));
        assert!(contains(b"RGBA"));
        assert!(contains(&UNKNOWN_SIZE));
    }

    #[test]
    fn test_frame_prefix_sizes() {
        let frame_len = 4 * 4 * 4;
        let prefix = frame_prefix(33_333, frame_len);

        let mut stream = stream_header(4, 4, 30.0);
        stream.extend_from_slice(&prefix);
        stream.extend(std::iter::repeat(0xA3).take(frame_len));
        stream.extend_from_slice(&frame_prefix(100_000, frame_len));
        stream.extend(std::iter::repeat(0x1F).take(frame_len));

        assert_eq!(cluster_timestamps(&stream), vec![33_333, 100_000]);
    }

    #[test]
    fn test_tick_clock_keeps_timestamps() {
        let mut clock = TickClock::default();
        assert_eq!(clock.ticks(Timestamp::from_seconds(10.0)), 10_000_000);
        assert_eq!(clock.ticks(Timestamp::from_seconds(10.1)), 10_100_000);
    }

    #[test]
    fn test_tick_clock_shifts_negative_start() {
        let mut clock = TickClock::default();
        assert_eq!(clock.ticks(Timestamp::from_seconds(-0.5)), 0);
        assert_eq!(clock.ticks(Timestamp::from_seconds(0.0)), 500_000);
    }
}
