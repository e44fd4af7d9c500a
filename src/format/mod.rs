//! Container format readers.
//!
//! Each reader follows the same lifecycle: a cheap non-destructive
//! `probe`, `open` (scan headers, enumerate tracks), `identify` without
//! side effects, `create_packetizers` exactly once, then `read` calls
//! until [`ReadStatus::Done`]. [`MediaReader::open`] runs the probes in
//! order of decreasing header strength and returns the first match.

use crate::av::{Packet, Track, TrackSummary};
use crate::config::DemuxOptions;
use crate::error::{DemuxError, Result};
use crate::packetizer::Packetizer;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek};

pub mod aac;
pub mod ogm;
pub mod ts;

/// Outcome of one bounded reading step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Progress was made and more input remains.
    MoreData,
    /// End of input; internal buffers have been flushed.
    Done,
}

/// A demultiplexing input source.
#[async_trait]
pub trait Reader: Send {
    /// Describes the discovered tracks without side effects.
    fn identify(&self) -> Vec<TrackSummary>;

    fn tracks(&self) -> &[Track];

    /// Binds a packetizer to every supported track. Idempotent: tracks
    /// that already have one are left alone.
    fn create_packetizers(&mut self) -> Result<()>;

    fn packetizers(&self) -> &[Box<dyn Packetizer>];

    /// Performs one bounded amount of demultiplexing work.
    async fn read(&mut self) -> Result<ReadStatus>;

    /// Drains muxer-ready packets queued by the bound packetizers.
    fn take_packets(&mut self) -> Vec<Packet>;

    /// Completion estimate in percent, if the input size is known.
    fn progress(&self) -> Option<u8>;

    fn is_done(&self) -> bool;
}

/// The set of supported readers, dispatched as a closed enum.
pub enum MediaReader<R> {
    MpegTs(ts::TsReader<R>),
    Ogm(ogm::OgmReader<R>),
    Aac(aac::AacReader<R>),
}

impl<R: AsyncRead + AsyncSeek + Unpin + Send> MediaReader<R> {
    /// Probes `io` against every known format and opens the first match.
    ///
    /// Strong-magic formats are tried before pattern-scanning ones so a
    /// weaker probe can never shadow a stronger one.
    pub async fn open(mut io: R, size: u64, options: DemuxOptions) -> Result<Self> {
        if ogm::OgmReader::probe(&mut io, size).await? {
            return Ok(Self::Ogm(ogm::OgmReader::open(io, size, options).await?));
        }
        if ts::TsReader::probe(&mut io, size).await? {
            return Ok(Self::MpegTs(ts::TsReader::open(io, size, options).await?));
        }
        if aac::AacReader::probe(&mut io, size).await? {
            return Ok(Self::Aac(aac::AacReader::open(io, size, options).await?));
        }
        Err(DemuxError::InvalidData(
            "the file type could not be recognized".into(),
        ))
    }
}

macro_rules! delegate {
    ($self:ident, $reader:ident => $body:expr) => {
        match $self {
            MediaReader::MpegTs($reader) => $body,
            MediaReader::Ogm($reader) => $body,
            MediaReader::Aac($reader) => $body,
        }
    };
}

#[async_trait]
impl<R: AsyncRead + AsyncSeek + Unpin + Send> Reader for MediaReader<R> {
    fn identify(&self) -> Vec<TrackSummary> {
        delegate!(self, r => r.identify())
    }

    fn tracks(&self) -> &[Track] {
        delegate!(self, r => r.tracks())
    }

    fn create_packetizers(&mut self) -> Result<()> {
        delegate!(self, r => r.create_packetizers())
    }

    fn packetizers(&self) -> &[Box<dyn Packetizer>] {
        delegate!(self, r => r.packetizers())
    }

    async fn read(&mut self) -> Result<ReadStatus> {
        delegate!(self, r => r.read().await)
    }

    fn take_packets(&mut self) -> Vec<Packet> {
        delegate!(self, r => r.take_packets())
    }

    fn progress(&self) -> Option<u8> {
        delegate!(self, r => r.progress())
    }

    fn is_done(&self) -> bool {
        delegate!(self, r => r.is_done())
    }
}

pub mod tests {
    use crate::av::{Muxer, Packet, Track};
    use crate::error::Result;
    use async_trait::async_trait;

    /// Muxer that records everything it is handed.
    #[derive(Debug, Default)]
    pub struct TestMuxer {
        pub tracks: Vec<Track>,
        pub packets: Vec<Packet>,
        pub header_written: bool,
        pub trailer_written: bool,
    }

    impl TestMuxer {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Muxer for TestMuxer {
        async fn write_header(&mut self, tracks: &[Track]) -> Result<()> {
            self.tracks = tracks.to_vec();
            self.header_written = true;
            Ok(())
        }

        async fn write_packet(&mut self, packet: Packet) -> Result<()> {
            self.packets.push(packet);
            Ok(())
        }

        async fn write_trailer(&mut self) -> Result<()> {
            self.trailer_written = true;
            Ok(())
        }
    }
}
