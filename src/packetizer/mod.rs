use crate::av::{CodecType, Packet};
use crate::error::Result;
use bytes::Bytes;

/// NALU size-field rewriting
pub mod nalu;

mod audio;
mod passthrough;
mod video;

pub use audio::AacPacketizer;
pub use nalu::NaluSizeRewriter;
pub use passthrough::PassthroughPacketizer;
pub use video::VideoPacketizer;

/// Outcome of checking whether two packetizers may feed one logical track
/// (used when appending input files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionResult {
    /// Compatible.
    Ok,
    /// Hard mismatch, the tracks cannot be appended.
    FormatMismatch(String),
    /// Warning-level mismatch the caller may override, e.g. codec-private
    /// data of equal length but different content.
    MaybeCodecPrivate(String),
}

/// Receives reassembled media units from a reader, normalizes them and
/// queues muxer-ready packets.
///
/// A packetizer is bound to exactly one track; readers drain the queue via
/// [`Packetizer::take_packets`] after every `process` or `flush` call.
pub trait Packetizer: Send {
    fn track_id(&self) -> usize;

    fn codec(&self) -> CodecType;

    /// Codec-private configuration bytes after any rewriting done at
    /// construction (e.g. patched NALU size length).
    fn codec_private(&self) -> Option<&Bytes>;

    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }

    /// Accepts one demuxed unit, assigns/propagates timecodes and reference
    /// markers and queues zero or more output packets.
    fn process(&mut self, unit: Packet) -> Result<()>;

    /// Drains any internal buffering at end of input.
    fn flush(&mut self) -> Result<()>;

    /// Removes and returns all queued output packets, in emission order.
    fn take_packets(&mut self) -> Vec<Packet>;

    fn can_connect_to(&self, other: &dyn Packetizer) -> ConnectionResult {
        if self.codec() != other.codec() {
            return ConnectionResult::FormatMismatch(format!(
                "codec mismatch: {:?} vs {:?}",
                self.codec(),
                other.codec()
            ));
        }
        if let (Some(mine), Some(theirs)) = (self.codec_private(), other.codec_private()) {
            if mine != theirs {
                if mine.len() == theirs.len() {
                    return ConnectionResult::MaybeCodecPrivate(format!(
                        "the codec's private data does not match: both have length {} but different content",
                        mine.len()
                    ));
                }
                return ConnectionResult::MaybeCodecPrivate(format!(
                    "the codec's private data does not match: lengths {} and {}",
                    mine.len(),
                    theirs.len()
                ));
            }
        }
        ConnectionResult::Ok
    }
}
