use super::Packetizer;
use crate::av::{CodecType, Packet, Track};
use crate::error::Result;
use bytes::Bytes;

/// Packetizer for units that are already correctly framed by the reader
/// (e.g. OGG packets). Propagates timecodes and forwards everything as-is.
pub struct PassthroughPacketizer {
    track_id: usize,
    codec: CodecType,
    codec_private: Option<Bytes>,
    last_timecode: i64,
    queue: Vec<Packet>,
}

impl PassthroughPacketizer {
    pub fn new(track: &Track) -> Self {
        Self {
            track_id: track.id,
            codec: track.codec,
            codec_private: track.codec_private.clone(),
            last_timecode: 0,
            queue: Vec::new(),
        }
    }
}

impl Packetizer for PassthroughPacketizer {
    fn track_id(&self) -> usize {
        self.track_id
    }

    fn codec(&self) -> CodecType {
        self.codec
    }

    fn codec_private(&self) -> Option<&Bytes> {
        self.codec_private.as_ref()
    }

    fn process(&mut self, mut unit: Packet) -> Result<()> {
        // Units without their own timecode inherit the last seen one.
        match unit.timecode {
            Some(tc) => self.last_timecode = tc,
            None => unit.timecode = Some(self.last_timecode),
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timecode_inheritance() {
        let track = Track::new(2, CodecType::Vorbis, *b"vrbs");
        let mut ptzr = PassthroughPacketizer::new(&track);

        ptzr.process(Packet::new(vec![1]).with_timecode(500)).unwrap();
        ptzr.process(Packet::new(vec![2])).unwrap();

        let packets = ptzr.take_packets();
        assert_eq!(packets[0].timecode, Some(500));
        assert_eq!(packets[1].timecode, Some(500));
        assert_eq!(packets[1].track_id, 2);
    }
}
