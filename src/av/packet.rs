use bytes::Bytes;
use std::time::Duration;

/// Marker for a backward reference that has to be resolved by the
/// packetizer against the previously emitted frame's timecode.
pub const REF_AUTOMATIC: i64 = -2;

/// A muxer-ready unit of media data for one track.
///
/// Produced by a packetizer, consumed by the output scheduler. `bref` and
/// `fref` carry backward/forward reference timecodes for reordered codecs;
/// `None` marks a key unit.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    pub track_id: usize,
    /// Presentation timecode in nanoseconds.
    pub timecode: Option<i64>,
    pub duration: Option<Duration>,
    pub bref: Option<i64>,
    pub fref: Option<i64>,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            track_id: 0,
            timecode: None,
            duration: None,
            bref: None,
            fref: None,
        }
    }

    pub fn with_track_id(mut self, id: usize) -> Self {
        self.track_id = id;
        self
    }

    pub fn with_timecode(mut self, timecode: i64) -> Self {
        self.timecode = Some(timecode);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_bref(mut self, bref: i64) -> Self {
        self.bref = Some(bref);
        self
    }

    pub fn with_fref(mut self, fref: i64) -> Self {
        self.fref = Some(fref);
        self
    }

    /// Whether the unit references no other unit.
    pub fn is_key(&self) -> bool {
        self.bref.is_none() && self.fref.is_none()
    }
}
