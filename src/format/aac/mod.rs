//! Raw ADTS AAC input.
//!
//! Probing requires several consecutive parsable frames so that a stray
//! sync pattern in other data is not mistaken for a stream. The older
//! MPEG-2 header layout with an emphasis field is guessed once per file
//! (or forced via [`DemuxOptions::aac_emphasis`]).

use crate::av::{CodecType, Packet, Track, TrackSummary};
use crate::codec::aac::{self, AdtsHeader};
use crate::config::DemuxOptions;
use crate::error::{DemuxError, Result};
use crate::format::{ReadStatus, Reader};
use crate::packetizer::{AacPacketizer, Packetizer};
use async_trait::async_trait;
use log::{debug, warn};
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

const PROBE_SIZE: usize = 8192;
const READ_CHUNK_SIZE: usize = 4096;
/// Consecutive frames required before a layout guess is trusted.
const MIN_CONSECUTIVE_FRAMES: usize = 3;

/// Raw AAC (ADTS) reader. One audio track, frames re-framed and stripped
/// of their headers by the packetizer.
pub struct AacReader<R> {
    io: R,
    size: u64,
    bytes_processed: u64,
    emphasis_present: bool,
    tracks: Vec<Track>,
    packetizers: Vec<Box<dyn Packetizer>>,
    done: bool,
}

impl<R: AsyncRead + AsyncSeek + Unpin + Send> AacReader<R> {
    /// Non-destructive format sniff. The input position is restored.
    pub async fn probe(io: &mut R, size: u64) -> Result<bool> {
        let pos = io.stream_position().await?;
        io.seek(SeekFrom::Start(0)).await?;
        let mut buf = vec![0u8; PROBE_SIZE.min(size as usize)];
        io.read_exact(&mut buf).await?;
        io.seek(SeekFrom::Start(pos)).await?;
        Ok(guess_adts_layout(&buf).is_some())
    }

    pub async fn open(mut io: R, size: u64, options: DemuxOptions) -> Result<Self> {
        io.seek(SeekFrom::Start(0)).await?;
        let mut buf = vec![0u8; PROBE_SIZE.min(size as usize)];
        io.read_exact(&mut buf).await?;
        io.seek(SeekFrom::Start(0)).await?;

        let (emphasis_present, header) = match options.aac_emphasis {
            Some(forced) => {
                let header = first_frame_header(&buf, forced).ok_or_else(|| {
                    DemuxError::InvalidData("no ADTS frames for the forced header layout".into())
                })?;
                (forced, header)
            }
            None => guess_adts_layout(&buf)
                .ok_or_else(|| DemuxError::InvalidData("no consecutive ADTS frames found".into()))?,
        };

        debug!(
            "ADTS stream: MPEG-{} header layout{}, {} Hz, {} channels, profile {}",
            if header.id == 0 { "4" } else { "2" },
            if emphasis_present { " with emphasis" } else { "" },
            header.sample_rate(),
            header.channel_configuration,
            header.profile
        );

        let mut track = Track::new(0, CodecType::AAC, *b"AAC ");
        track.sample_rate = Some(header.sample_rate());
        track.channels = Some(header.channel_configuration);

        Ok(Self {
            io,
            size,
            bytes_processed: 0,
            emphasis_present,
            tracks: vec![track],
            packetizers: Vec::new(),
            done: false,
        })
    }

    fn finish(&mut self) -> Result<()> {
        for ptzr in &mut self.packetizers {
            ptzr.flush()?;
        }
        self.done = true;
        Ok(())
    }
}

/// Guesses the header layout by demanding a run of back-to-back frames,
/// first with the standard layout, then with the emphasis variant.
fn guess_adts_layout(buf: &[u8]) -> Option<(bool, AdtsHeader)> {
    // ADIF is a different container entirely.
    if buf.starts_with(b"ADIF") {
        return None;
    }
    for emphasis in [false, true] {
        if let Some(header) = consecutive_frames(buf, emphasis) {
            return Some((emphasis, header));
        }
    }
    None
}

fn consecutive_frames(buf: &[u8], emphasis_present: bool) -> Option<AdtsHeader> {
    let (start, first) = aac::find_frame(buf, emphasis_present)?;
    let mut pos = start + first.frame_length;
    let mut confirmed = 1;
    while confirmed < MIN_CONSECUTIVE_FRAMES {
        if pos + 8 > buf.len() {
            // The stream ends inside the probe window; back-to-back frames
            // seen so far are still a confirmation.
            break;
        }
        let header = AdtsHeader::parse(&buf[pos..], emphasis_present).ok()?;
        if header.sample_rate_index != first.sample_rate_index {
            return None;
        }
        pos += header.frame_length;
        confirmed += 1;
    }
    if confirmed >= 2 {
        Some(first)
    } else {
        None
    }
}

fn first_frame_header(buf: &[u8], emphasis_present: bool) -> Option<AdtsHeader> {
    aac::find_frame(buf, emphasis_present).map(|(_, header)| header)
}

#[async_trait]
impl<R: AsyncRead + AsyncSeek + Unpin + Send> Reader for AacReader<R> {
    fn identify(&self) -> Vec<TrackSummary> {
        self.tracks
            .iter()
            .map(|t| TrackSummary {
                id: t.id,
                kind: t.kind,
                codec: t.codec,
                description: format!(
                    "AAC (ADTS), {} Hz, {} channels",
                    t.sample_rate.unwrap_or(0),
                    t.channels.unwrap_or(0)
                ),
            })
            .collect()
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn create_packetizers(&mut self) -> Result<()> {
        if self.tracks[0].ptzr.is_some() {
            return Ok(());
        }
        self.packetizers.push(Box::new(AacPacketizer::new(
            &self.tracks[0],
            self.emphasis_present,
        )));
        self.tracks[0].ptzr = Some(0);
        Ok(())
    }

    fn packetizers(&self) -> &[Box<dyn Packetizer>] {
        &self.packetizers
    }

    async fn read(&mut self) -> Result<ReadStatus> {
        if self.done {
            return Ok(ReadStatus::Done);
        }
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let n = self.io.read(&mut chunk).await?;
        if n == 0 {
            self.finish()?;
            return Ok(ReadStatus::Done);
        }
        chunk.truncate(n);
        self.bytes_processed += n as u64;

        match self.tracks[0].ptzr {
            Some(ptzr) => self.packetizers[ptzr].process(Packet::new(chunk))?,
            None => warn!("AAC data read before a packetizer was bound, dropping it"),
        }
        self.tracks[0].processed = true;
        Ok(ReadStatus::MoreData)
    }

    fn take_packets(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        for ptzr in &mut self.packetizers {
            packets.extend(ptzr.take_packets());
        }
        packets
    }

    fn progress(&self) -> Option<u8> {
        if self.size == 0 {
            return None;
        }
        Some(((self.bytes_processed * 100) / self.size).min(100) as u8)
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
