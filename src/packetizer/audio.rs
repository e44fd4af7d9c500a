use super::Packetizer;
use crate::av::{CodecType, Packet, Track};
use crate::codec::aac;
use crate::error::Result;
use bytes::{Bytes, BytesMut};
use log::warn;
use std::time::Duration;

const SAMPLES_PER_FRAME: u64 = 1024;

/// Packetizer for ADTS AAC.
///
/// Readers hand it raw byte chunks; it re-frames them on ADTS boundaries,
/// strips the headers and emits one packet per raw data block with a
/// derived timecode.
pub struct AacPacketizer {
    track_id: usize,
    sample_rate: u32,
    emphasis_present: bool,
    pending: BytesMut,
    timecode: i64,
    queue: Vec<Packet>,
}

impl AacPacketizer {
    pub fn new(track: &Track, emphasis_present: bool) -> Self {
        Self {
            track_id: track.id,
            sample_rate: track.sample_rate.unwrap_or(44100),
            emphasis_present,
            pending: BytesMut::new(),
            timecode: 0,
            queue: Vec::new(),
        }
    }

    fn frame_duration(&self) -> Duration {
        Duration::from_nanos(SAMPLES_PER_FRAME * 1_000_000_000 / self.sample_rate as u64)
    }

    fn emit_complete_frames(&mut self) {
        loop {
            let (pos, header) = match aac::find_frame(&self.pending, self.emphasis_present) {
                Some(found) => found,
                None => return,
            };

            if pos > 0 {
                warn!(
                    "track {}: skipping {} bytes of garbage before next ADTS header",
                    self.track_id, pos
                );
                let _ = self.pending.split_to(pos);
            }

            if self.pending.len() < header.frame_length {
                return;
            }

            let frame = self.pending.split_to(header.frame_length);
            let payload = Bytes::copy_from_slice(&frame[header.header_size..]);
            let duration = self.frame_duration();

            self.queue.push(
                Packet::new(payload)
                    .with_track_id(self.track_id)
                    .with_timecode(self.timecode)
                    .with_duration(duration),
            );
            self.timecode += duration.as_nanos() as i64;
        }
    }
}

impl Packetizer for AacPacketizer {
    fn track_id(&self) -> usize {
        self.track_id
    }

    fn codec(&self) -> CodecType {
        CodecType::AAC
    }

    fn codec_private(&self) -> Option<&Bytes> {
        None
    }

    fn process(&mut self, unit: Packet) -> Result<()> {
        self.pending.extend_from_slice(&unit.data);
        self.emit_complete_frames();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.emit_complete_frames();
        if !self.pending.is_empty() {
            warn!(
                "track {}: dropping {} trailing bytes not forming a complete ADTS frame",
                self.track_id,
                self.pending.len()
            );
            self.pending.clear();
        }
        Ok(())
    }

    fn take_packets(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::aac::build_frame;
    use pretty_assertions::assert_eq;

    fn aac_track() -> Track {
        let mut track = Track::new(0, CodecType::AAC, *b"AAC ");
        track.sample_rate = Some(44100);
        track.channels = Some(2);
        track
    }

    #[test]
    fn test_reframes_chunked_input() {
        let mut data = build_frame(40, false);
        data.extend(build_frame(25, false));

        let mut ptzr = AacPacketizer::new(&aac_track(), false);
        // Split mid-frame to force buffering across process calls.
        let (a, b) = data.split_at(50);
        ptzr.process(Packet::new(a.to_vec())).unwrap();
        ptzr.process(Packet::new(b.to_vec())).unwrap();

        let packets = ptzr.take_packets();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data.len(), 40);
        assert_eq!(packets[1].data.len(), 25);
        // Timecodes advance by one frame duration (1024 samples @ 44.1 kHz).
        assert_eq!(packets[0].timecode, Some(0));
        assert_eq!(packets[1].timecode, Some(23_219_954));
    }

    #[test]
    fn test_flush_drops_partial_tail() {
        let data = build_frame(40, false);
        let mut ptzr = AacPacketizer::new(&aac_track(), false);
        ptzr.process(Packet::new(data[..20].to_vec())).unwrap();
        ptzr.flush().unwrap();
        assert!(ptzr.take_packets().is_empty());
        assert!(ptzr.pending.is_empty());
    }

    #[test]
    fn test_emphasis_layout_header_stripped() {
        let data = build_frame(16, true);
        let mut ptzr = AacPacketizer::new(&aac_track(), true);
        ptzr.process(Packet::new(data)).unwrap();

        let packets = ptzr.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data.len(), 16);
    }
}
