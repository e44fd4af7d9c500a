//! Demuxer configuration.
//!
//! All knobs are passed explicitly into readers and packetizers at
//! construction time. Components that cache derived state record the
//! `version` they were built against; a bumped counter invalidates those
//! caches instead of mutating anything behind their back.

/// Options consumed by readers and packetizers at construction.
#[derive(Debug, Clone)]
pub struct DemuxOptions {
    /// Requested NALU size-field width in bytes (1-4) for AVC/HEVC output.
    /// `None` keeps the source's width.
    pub nalu_size_length: Option<usize>,
    /// Force the ADTS emphasis-field interpretation instead of auto-guessing.
    pub aac_emphasis: Option<bool>,
    /// Number of TS packets scanned while looking for PAT/PMT at open.
    pub probe_packets: usize,
    /// Incremented whenever the options change; lets components detect that
    /// cached derived state is stale.
    pub version: u32,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        Self {
            nalu_size_length: None,
            aac_emphasis: None,
            probe_packets: 2048,
            version: 0,
        }
    }
}

impl DemuxOptions {
    pub fn with_nalu_size_length(mut self, len: usize) -> Self {
        self.nalu_size_length = Some(len);
        self.version += 1;
        self
    }

    pub fn with_aac_emphasis(mut self, emphasis: bool) -> Self {
        self.aac_emphasis = Some(emphasis);
        self.version += 1;
        self
    }
}
