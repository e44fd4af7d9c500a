use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    Mpeg12,
    H264,
    H265,
    MpegAudio,
    AAC,
    AC3,
    Vorbis,
    PCM,
    Text,
    Unknown,
}

impl CodecType {
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecType::Mpeg12 | CodecType::H264 | CodecType::H265 => MediaKind::Video,
            CodecType::MpegAudio
            | CodecType::AAC
            | CodecType::AC3
            | CodecType::Vorbis
            | CodecType::PCM => MediaKind::Audio,
            CodecType::Text => MediaKind::Subtitle,
            CodecType::Unknown => MediaKind::Unknown,
        }
    }
}

/// One elementary stream discovered by a reader.
///
/// Created when a PMT entry or container stream header is first seen and
/// owned exclusively by the discovering reader until teardown.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: usize,
    pub kind: MediaKind,
    pub codec: CodecType,
    /// Codec tag forwarded to the muxer, e.g. b"avc1".
    pub fourcc: [u8; 4],
    /// Sub-stream identifier for TS sources.
    pub pid: Option<u16>,
    /// Set once the track's current unit has been forwarded.
    pub processed: bool,
    /// Index of the bound packetizer; set at most once.
    pub ptzr: Option<usize>,
    /// Last timecode seen for this track, in nanoseconds.
    pub timecode: i64,
    /// Out-of-band configuration bytes (e.g. parameter sets).
    pub codec_private: Option<Bytes>,

    // video parameters
    pub width: Option<u32>,
    pub height: Option<u32>,

    // audio parameters
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

impl Track {
    pub fn new(id: usize, codec: CodecType, fourcc: [u8; 4]) -> Self {
        Self {
            id,
            kind: codec.kind(),
            codec,
            fourcc,
            pid: None,
            processed: false,
            ptzr: None,
            timecode: 0,
            codec_private: None,
            width: None,
            height: None,
            sample_rate: None,
            channels: None,
        }
    }

    pub fn with_pid(mut self, pid: u16) -> Self {
        self.pid = Some(pid);
        self
    }
}

/// Identification output for one track, without constructing packetizers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub id: usize,
    pub kind: MediaKind,
    pub codec: CodecType,
    pub description: String,
}

/// The external container muxer this engine feeds.
///
/// Receives per-track codec configuration up front and a sequence of
/// (track, packet) pairs afterwards.
#[async_trait]
pub trait Muxer: Send {
    /// Write stream header information derived from the tracks.
    async fn write_header(&mut self, tracks: &[Track]) -> crate::Result<()>;

    /// Write one packet.
    async fn write_packet(&mut self, packet: Packet) -> crate::Result<()>;

    /// Write stream trailer information.
    async fn write_trailer(&mut self) -> crate::Result<()>;
}

mod packet;
pub use packet::*;
