//! Output scheduling.
//!
//! Drives any number of readers round-robin, merges their per-reader
//! track numbering into one global space and forwards packets to the
//! muxer. A failing reader takes only its own tracks down; configuration
//! errors abort the whole run.

use crate::av::{Muxer, Packet, Track};
use crate::error::Result;
use crate::format::{ReadStatus, Reader};
use log::{debug, error, info};

/// Drives readers and feeds one muxer.
pub struct Scheduler<M> {
    readers: Vec<Box<dyn Reader>>,
    /// Global track-id offset per reader.
    offsets: Vec<usize>,
    failed: Vec<bool>,
    muxer: M,
}

impl<M: Muxer> Scheduler<M> {
    pub fn new(muxer: M) -> Self {
        Self {
            readers: Vec::new(),
            offsets: Vec::new(),
            failed: Vec::new(),
            muxer,
        }
    }

    pub fn add_reader(&mut self, reader: Box<dyn Reader>) {
        self.readers.push(reader);
        self.failed.push(false);
    }

    /// Runs the whole pipeline: bind packetizers, write the header, pump
    /// every reader until done, then write the trailer.
    ///
    /// Returns the muxer so callers can inspect or finalize it.
    pub async fn run(mut self) -> Result<M> {
        let tracks = self.prepare()?;
        info!(
            "muxing {} tracks from {} sources",
            tracks.len(),
            self.readers.len()
        );
        self.muxer.write_header(&tracks).await?;

        while self.pump().await? {}

        self.muxer.write_trailer().await?;
        Ok(self.muxer)
    }

    /// Binds packetizers everywhere and builds the global track list with
    /// per-reader id offsets applied.
    fn prepare(&mut self) -> Result<Vec<Track>> {
        self.offsets.clear();
        let mut tracks = Vec::new();
        for reader in &mut self.readers {
            reader.create_packetizers()?;
            let offset = tracks.len();
            self.offsets.push(offset);
            for track in reader.tracks() {
                let mut track = track.clone();
                track.id += offset;
                tracks.push(track);
            }
        }
        Ok(tracks)
    }

    /// One round over all readers. Returns false once every reader is
    /// done or failed.
    async fn pump(&mut self) -> Result<bool> {
        let mut active = false;
        for idx in 0..self.readers.len() {
            if self.failed[idx]
                || self.readers[idx].is_done()
                || self.readers[idx].packetizers().is_empty()
            {
                continue;
            }

            match self.readers[idx].read().await {
                Ok(ReadStatus::MoreData) => active = true,
                Ok(ReadStatus::Done) => {
                    debug!("source {} finished", idx);
                }
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    // The other sources keep going.
                    error!("source {} failed and is dropped: {}", idx, e);
                    self.failed[idx] = true;
                    continue;
                }
            }

            let offset = self.offsets[idx];
            for packet in self.readers[idx].take_packets() {
                self.forward(packet, offset).await?;
            }
        }
        Ok(active)
    }

    async fn forward(&mut self, mut packet: Packet, offset: usize) -> Result<()> {
        packet.track_id += offset;
        self.muxer.write_packet(packet).await
    }

    /// Overall completion estimate, averaged over sources that report one.
    pub fn progress(&self) -> Option<u8> {
        let reported: Vec<u8> = self.readers.iter().filter_map(|r| r.progress()).collect();
        if reported.is_empty() {
            return None;
        }
        Some((reported.iter().map(|&p| p as u32).sum::<u32>() / reported.len() as u32) as u8)
    }
}
