use super::{ConnectionResult, NaluSizeRewriter, Packetizer};
use crate::av::{CodecType, Packet, Track, REF_AUTOMATIC};
use crate::config::DemuxOptions;
use crate::error::{DemuxError, Result};
use bytes::{Bytes, BytesMut};
use log::debug;

/// Packetizer for length-prefixed video codecs (AVC/HEVC).
///
/// Propagates reference timecodes and, when the operator requests a NALU
/// size-field width differing from the one declared in the codec-private
/// data, rewrites every access unit and patches the codec-private blob.
pub struct VideoPacketizer {
    track_id: usize,
    codec: CodecType,
    width: Option<u32>,
    height: Option<u32>,
    codec_private: Option<Bytes>,
    rewriter: Option<NaluSizeRewriter>,
    ref_timecode: i64,
    queue: Vec<Packet>,
}

impl VideoPacketizer {
    pub fn new(track: &Track, options: &DemuxOptions) -> Result<Self> {
        let mut ptzr = Self {
            track_id: track.id,
            codec: track.codec,
            width: track.width,
            height: track.height,
            codec_private: track.codec_private.clone(),
            rewriter: None,
            ref_timecode: 0,
            queue: Vec::new(),
        };
        ptzr.setup_nalu_size_len_change(options)?;
        Ok(ptzr)
    }

    /// Derives the source NALU size length from codec-private byte 4 and,
    /// if the requested destination differs, installs the rewriter and
    /// patches the codec-private data to advertise the new width.
    fn setup_nalu_size_len_change(&mut self, options: &DemuxOptions) -> Result<()> {
        let private = match &self.codec_private {
            Some(p) if p.len() >= 5 => p,
            _ => return Ok(()),
        };

        let src_len = (private[4] & 0x03) as usize + 1;
        let dst_len = match options.nalu_size_length {
            Some(dst) if dst != src_len => dst,
            _ => return Ok(()),
        };

        let rewriter = NaluSizeRewriter::new(src_len, dst_len)?;

        let mut patched = BytesMut::from(&private[..]);
        patched[4] = (patched[4] & 0xFC) | (dst_len as u8 - 1);
        self.codec_private = Some(patched.freeze());
        self.rewriter = Some(rewriter);

        debug!(
            "track {}: adjusting NALU size length from {} to {}",
            self.track_id, src_len, dst_len
        );
        Ok(())
    }
}

impl Packetizer for VideoPacketizer {
    fn track_id(&self) -> usize {
        self.track_id
    }

    fn codec(&self) -> CodecType {
        self.codec
    }

    fn codec_private(&self) -> Option<&Bytes> {
        self.codec_private.as_ref()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    fn process(&mut self, mut unit: Packet) -> Result<()> {
        if unit.bref == Some(REF_AUTOMATIC) {
            unit.fref = None;
            unit.bref = Some(self.ref_timecode);
        }

        let timecode = unit.timecode.ok_or_else(|| {
            DemuxError::InvalidData(format!("track {}: video unit without timecode", self.track_id))
        })?;
        self.ref_timecode = timecode;

        if let Some(rewriter) = &self.rewriter {
            unit.data = rewriter.rewrite(&unit.data)?;
        }

        unit.track_id = self.track_id;
        self.queue.push(unit);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn take_packets(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.queue)
    }

    fn can_connect_to(&self, other: &dyn Packetizer) -> ConnectionResult {
        if self.codec() != other.codec() {
            return ConnectionResult::FormatMismatch(format!(
                "codec mismatch: {:?} vs {:?}",
                self.codec(),
                other.codec()
            ));
        }
        if self.dimensions() != other.dimensions() {
            return ConnectionResult::FormatMismatch(format!(
                "display dimensions differ: {:?} vs {:?}",
                self.dimensions(),
                other.dimensions()
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
