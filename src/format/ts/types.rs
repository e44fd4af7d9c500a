use crate::av::CodecType;

// Constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const SYNC_BYTE: u8 = 0x47;
/// Base packet size plus the 192-byte (M2TS) and 204-byte (DVB FEC)
/// variants; the bytes past 188 are ignored.
pub const POTENTIAL_PACKET_SIZES: [usize; 3] = [188, 192, 204];

// PIDs
pub const PID_PAT: u16 = 0x0000;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary stream types
pub const STREAM_TYPE_MPEG1_VIDEO: u8 = 0x01;
pub const STREAM_TYPE_MPEG2_VIDEO: u8 = 0x02;
pub const STREAM_TYPE_MPEG1_AUDIO: u8 = 0x03;
pub const STREAM_TYPE_MPEG2_AUDIO: u8 = 0x04;
pub const STREAM_TYPE_AAC: u8 = 0x0F;
pub const STREAM_TYPE_H264: u8 = 0x1B;
pub const STREAM_TYPE_H265: u8 = 0x24;
pub const STREAM_TYPE_AC3: u8 = 0x81;

pub const PTS_HZ: u64 = 90_000;

/// Maps a PMT stream type to a codec and fourcc tag. Unknown types still
/// yield a track, just one nothing can be bound to.
pub fn codec_for_stream_type(stream_type: u8) -> (CodecType, [u8; 4]) {
    match stream_type {
        STREAM_TYPE_MPEG1_VIDEO | STREAM_TYPE_MPEG2_VIDEO => (CodecType::Mpeg12, *b"mpg2"),
        STREAM_TYPE_H264 => (CodecType::H264, *b"avc1"),
        STREAM_TYPE_H265 => (CodecType::H265, *b"hvc1"),
        STREAM_TYPE_MPEG1_AUDIO | STREAM_TYPE_MPEG2_AUDIO => (CodecType::MpegAudio, *b"mp2 "),
        STREAM_TYPE_AAC => (CodecType::AAC, *b"AAC "),
        STREAM_TYPE_AC3 => (CodecType::AC3, *b"AC3 "),
        _ => (CodecType::Unknown, *b"????"),
    }
}

#[derive(Debug)]
pub struct TsHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

#[derive(Debug)]
pub struct AdaptationField {
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
    pub pcr: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
}

#[derive(Debug, Clone, Default)]
pub struct Pat {
    pub version: u8,
    pub current_next: bool,
    pub entries: Vec<PatEntry>,
}

#[derive(Debug, Clone)]
pub struct EsInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub es_info: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Pmt {
    pub version: u8,
    pub current_next: bool,
    pub program_number: u16,
    pub pcr_pid: u16,
    pub streams: Vec<EsInfo>,
}

/// 90 kHz PTS to nanoseconds.
pub fn pts_to_ns(pts: u64) -> i64 {
    (pts as i64) * 1_000_000_000 / PTS_HZ as i64
}
