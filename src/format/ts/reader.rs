use super::parser::TsPacketParser;
use super::types::*;
use crate::av::{CodecType, MediaKind, Packet, Track, TrackSummary};
use crate::config::DemuxOptions;
use crate::error::{DemuxError, Result};
use crate::format::{ReadStatus, Reader};
use crate::packetizer::{AacPacketizer, Packetizer, PassthroughPacketizer, VideoPacketizer};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Number of sync-byte repetitions required to accept a packet size.
const PROBE_PACKET_COUNT: usize = 5;
/// Probe window: enough for the detection run at the largest stride.
const PROBE_BUFFER_SIZE: usize = 204 * (PROBE_PACKET_COUNT + 1);
/// Packets consumed per `read` call.
const PACKETS_PER_READ: usize = 64;
/// Bytes scanned forward before giving up on resynchronization.
const RESYNC_LIMIT: usize = TS_PACKET_SIZE * 5;

/// Reassembly state for one PID.
#[derive(Debug, Default)]
struct PidBuffer {
    payload: BytesMut,
    /// Declared unit size once known; None while idle or for PES packets
    /// with an unspecified length.
    expected: Option<usize>,
    /// Accumulating a unit whose length field says "until next start".
    unbounded: bool,
    active: bool,
    continuity: Option<u8>,
}

impl PidBuffer {
    fn reset(&mut self) {
        self.payload.clear();
        self.expected = None;
        self.unbounded = false;
        self.active = false;
    }
}

/// MPEG transport stream reader.
///
/// Auto-detects the packet size, reassembles per-PID payloads into PSI
/// sections and PES packets, derives tracks from PAT/PMT and feeds bound
/// packetizers.
pub struct TsReader<R> {
    io: R,
    size: u64,
    bytes_processed: u64,
    packet_size: usize,
    options: DemuxOptions,
    parser: TsPacketParser,

    tracks: Vec<Track>,
    pid_to_track: HashMap<u16, usize>,
    buffers: HashMap<u16, PidBuffer>,
    pmt_pid: Option<u16>,
    pat_version: Option<u8>,
    pmt_version: Option<u8>,

    packetizers: Vec<Box<dyn Packetizer>>,
    done: bool,
}

impl<R: AsyncRead + AsyncSeek + Unpin + Send> TsReader<R> {
    /// Non-destructive format sniff: succeeds if a packet size can be
    /// detected within the probe window. The input position is restored.
    pub async fn probe(io: &mut R, size: u64) -> Result<bool> {
        if (size as usize) < TS_PACKET_SIZE * 2 {
            return Ok(false);
        }
        let pos = io.stream_position().await?;
        io.seek(SeekFrom::Start(0)).await?;
        let mut buf = vec![0u8; PROBE_BUFFER_SIZE.min(size as usize)];
        io.read_exact(&mut buf).await?;
        io.seek(SeekFrom::Start(pos)).await?;
        Ok(detect_packet_size(&buf).is_some())
    }

    /// Opens the stream: detects the packet size and scans for PAT/PMT to
    /// enumerate tracks. Stops scanning as soon as the PMT is parsed or
    /// the configured probe window is exhausted.
    pub async fn open(mut io: R, size: u64, options: DemuxOptions) -> Result<Self> {
        io.seek(SeekFrom::Start(0)).await?;
        let mut buf = vec![0u8; PROBE_BUFFER_SIZE.min(size as usize)];
        io.read_exact(&mut buf).await?;
        let (offset, packet_size) = detect_packet_size(&buf)
            .ok_or_else(|| DemuxError::InvalidData("no TS packet size detected".into()))?;
        debug!("TS packet size {} detected at offset {}", packet_size, offset);

        io.seek(SeekFrom::Start(offset as u64)).await?;
        let mut reader = Self {
            io,
            size,
            bytes_processed: offset as u64,
            packet_size,
            options,
            parser: TsPacketParser::new(),
            tracks: Vec::new(),
            pid_to_track: HashMap::new(),
            buffers: HashMap::new(),
            pmt_pid: None,
            pat_version: None,
            pmt_version: None,
            packetizers: Vec::new(),
            done: false,
        };

        let probe_packets = reader.options.probe_packets;
        for _ in 0..probe_packets {
            if reader.pmt_version.is_some() {
                break;
            }
            if !reader.consume_packet().await? {
                break;
            }
        }

        if reader.tracks.is_empty() {
            return Err(DemuxError::InvalidData(
                "no program map table found while probing".into(),
            ));
        }
        Ok(reader)
    }

    /// Reads and parses one packet; false at end of input.
    async fn consume_packet(&mut self) -> Result<bool> {
        let mut packet = vec![0u8; self.packet_size];
        let mut filled = 0;
        while filled < packet.len() {
            let n = self.io.read(&mut packet[filled..]).await?;
            if n == 0 {
                if filled > 0 {
                    warn!("dropping {} trailing bytes of a truncated TS packet", filled);
                }
                return Ok(false);
            }
            filled += n;
        }
        self.bytes_processed += packet.len() as u64;

        if packet[0] != SYNC_BYTE {
            warn!("TS sync lost at byte {}, rescanning", self.bytes_processed);
            if !self.resync(&mut packet).await? {
                return Ok(false);
            }
        }

        self.parse_packet(&packet)?;
        Ok(true)
    }

    /// Scans forward byte-wise until a sync byte reappears, then refills
    /// the rest of the packet. Bounded by RESYNC_LIMIT.
    async fn resync(&mut self, packet: &mut Vec<u8>) -> Result<bool> {
        for skipped in 0..RESYNC_LIMIT {
            if let Some(pos) = packet.iter().position(|&b| b == SYNC_BYTE) {
                packet.drain(..pos);
                packet.resize(self.packet_size, 0);
                let mut filled = self.packet_size - pos;
                while filled < self.packet_size {
                    let n = self.io.read(&mut packet[filled..]).await?;
                    if n == 0 {
                        return Ok(false);
                    }
                    filled += n;
                }
                self.bytes_processed += pos as u64;
                return Ok(true);
            }
            // No sync byte in the buffered packet at all; slide one whole
            // packet forward.
            packet.clear();
            packet.resize(self.packet_size, 0);
            let mut filled = 0;
            while filled < self.packet_size {
                let n = self.io.read(&mut packet[filled..]).await?;
                if n == 0 {
                    return Ok(false);
                }
                filled += n;
            }
            self.bytes_processed += self.packet_size as u64;
            if skipped + 1 >= RESYNC_LIMIT / self.packet_size {
                break;
            }
        }
        Err(DemuxError::InvalidData(
            "unable to resynchronize to TS packet boundaries".into(),
        ))
    }

    fn parse_packet(&mut self, packet: &[u8]) -> Result<()> {
        let header = self.parser.parse_header(packet)?;

        if header.transport_error {
            warn!("skipping TS packet with transport error on PID {}", header.pid);
            return Ok(());
        }

        let mut payload_offset = TS_HEADER_SIZE;
        if header.adaptation_field_exists {
            match self.parser.parse_adaptation_field(packet, payload_offset) {
                Ok(Some(field)) => {
                    if field.discontinuity {
                        if let Some(buf) = self.buffers.get_mut(&header.pid) {
                            buf.reset();
                            buf.continuity = None;
                        }
                    }
                    payload_offset += field.length + 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("malformed adaptation field on PID {}: {}", header.pid, e);
                    return Ok(());
                }
            }
        }

        if !header.contains_payload || payload_offset >= TS_PACKET_SIZE {
            return Ok(());
        }
        // 192/204-byte variants carry their extra bytes after the base
        // packet; only the first 188 belong to the stream.
        let payload = &packet[payload_offset..TS_PACKET_SIZE];

        if header.pid == PID_PAT || Some(header.pid) == self.pmt_pid {
            self.handle_section_payload(&header, payload)
        } else if self.pid_to_track.contains_key(&header.pid) {
            self.handle_pes_payload(&header, payload)
        } else {
            Ok(())
        }
    }

    /// Continuity check shared by section and PES paths. Returns false if
    /// the in-flight unit had to be dropped.
    fn check_continuity(buf: &mut PidBuffer, header: &TsHeader) -> bool {
        let ok = match buf.continuity {
            Some(prev) => header.continuity_counter == (prev + 1) & 0x0F,
            None => true,
        };
        buf.continuity = Some(header.continuity_counter);
        if !ok {
            warn!(
                "continuity counter gap on PID {}, dropping the current unit",
                header.pid
            );
            buf.reset();
        }
        ok
    }

    fn handle_section_payload(&mut self, header: &TsHeader, payload: &[u8]) -> Result<()> {
        let buf = self.buffers.entry(header.pid).or_default();
        if !Self::check_continuity(buf, header) && !header.payload_unit_start {
            return Ok(());
        }

        let mut completed: Vec<Bytes> = Vec::new();

        if header.payload_unit_start {
            if payload.is_empty() {
                return Ok(());
            }
            let pointer = payload[0] as usize;
            if pointer + 1 > payload.len() {
                warn!("section pointer field past packet end on PID {}", header.pid);
                return Ok(());
            }

            // Bytes before the pointer boundary finish the in-flight section.
            if buf.active {
                buf.payload.extend_from_slice(&payload[1..1 + pointer]);
                match buf.expected {
                    Some(expected) if buf.payload.len() >= expected => {
                        completed.push(buf.payload.split_to(expected).freeze());
                    }
                    _ => warn!(
                        "incomplete section on PID {} discarded at new payload start",
                        header.pid
                    ),
                }
            }
            buf.reset();
            buf.active = true;
            buf.payload.extend_from_slice(&payload[1 + pointer..]);
        } else {
            if !buf.active {
                return Ok(());
            }
            buf.payload.extend_from_slice(payload);
        }

        if buf.expected.is_none() {
            buf.expected = TsPacketParser::section_total_length(&buf.payload);
        }
        if let Some(expected) = buf.expected {
            if buf.payload.len() >= expected {
                completed.push(buf.payload.split_to(expected).freeze());
                buf.reset();
            }
        }

        let is_pat = header.pid == PID_PAT;
        for section in completed {
            if is_pat {
                self.handle_pat(&section);
            } else {
                self.handle_pmt(&section);
            }
        }
        Ok(())
    }

    /// PAT/PMT are retransmitted periodically, so a corrupt instance only
    /// costs us this copy; previously known tables stay in effect.
    fn handle_pat(&mut self, section: &[u8]) {
        let pat = match self.parser.parse_pat(section) {
            Ok(pat) => pat,
            Err(e) => {
                warn!("discarding PAT: {}", e);
                return;
            }
        };
        if !pat.current_next || self.pat_version == Some(pat.version) {
            return;
        }

        if let Some(entry) = pat.entries.first() {
            debug!(
                "PAT version {}: program {} maps to PMT PID {:#06x}",
                pat.version, entry.program_number, entry.pmt_pid
            );
            self.pmt_pid = Some(entry.pmt_pid);
            self.pat_version = Some(pat.version);
        }
    }

    fn handle_pmt(&mut self, section: &[u8]) {
        let pmt = match self.parser.parse_pmt(section) {
            Ok(pmt) => pmt,
            Err(e) => {
                warn!("discarding PMT: {}", e);
                return;
            }
        };
        if !pmt.current_next || self.pmt_version == Some(pmt.version) {
            return;
        }

        debug!(
            "PMT version {} for program {}: {} elementary streams",
            pmt.version,
            pmt.program_number,
            pmt.streams.len()
        );

        for es in &pmt.streams {
            let (codec, fourcc) = codec_for_stream_type(es.stream_type);
            match self.pid_to_track.get(&es.elementary_pid) {
                Some(&idx) => {
                    let track = &mut self.tracks[idx];
                    if track.codec != codec {
                        track.codec = codec;
                        track.kind = codec.kind();
                        track.fourcc = fourcc;
                    }
                }
                None => {
                    let id = self.tracks.len();
                    let track = Track::new(id, codec, fourcc).with_pid(es.elementary_pid);
                    debug!(
                        "new {:?} track {} (stream type {:#04x}) on PID {:#06x}",
                        track.kind, id, es.stream_type, es.elementary_pid
                    );
                    self.pid_to_track.insert(es.elementary_pid, id);
                    self.tracks.push(track);
                }
            }
        }
        self.pmt_version = Some(pmt.version);
    }

    fn handle_pes_payload(&mut self, header: &TsHeader, payload: &[u8]) -> Result<()> {
        let buf = self.buffers.entry(header.pid).or_default();
        if !Self::check_continuity(buf, header) && !header.payload_unit_start {
            return Ok(());
        }

        let mut completed: Vec<Bytes> = Vec::new();

        if header.payload_unit_start {
            if buf.active {
                if buf.unbounded {
                    // Unspecified PES length: the new start closes the unit.
                    completed.push(buf.payload.split().freeze());
                } else if buf.expected.map_or(false, |e| buf.payload.len() == e) {
                    completed.push(buf.payload.split().freeze());
                } else {
                    warn!(
                        "incomplete PES packet on PID {} discarded at new payload start",
                        header.pid
                    );
                }
            }
            buf.reset();

            if payload.len() < 6 || payload[0] != 0 || payload[1] != 0 || payload[2] != 1 {
                warn!("PES start code missing on PID {}", header.pid);
            } else {
                let pes_length = ((payload[4] as usize) << 8) | payload[5] as usize;
                buf.active = true;
                if pes_length == 0 {
                    buf.unbounded = true;
                } else {
                    buf.expected = Some(pes_length + 6);
                }
                buf.payload.extend_from_slice(payload);
            }
        } else if buf.active {
            buf.payload.extend_from_slice(payload);
        }

        if let Some(expected) = buf.expected {
            if buf.payload.len() >= expected {
                completed.push(buf.payload.split_to(expected).freeze());
                buf.reset();
            }
        }

        for unit in completed {
            self.send_pes_unit(header.pid, unit)?;
        }
        Ok(())
    }

    /// Strips the PES header from a completed unit and forwards the
    /// elementary-stream bytes to the track's packetizer.
    fn send_pes_unit(&mut self, pid: u16, unit: Bytes) -> Result<()> {
        let idx = match self.pid_to_track.get(&pid) {
            Some(&idx) => idx,
            None => return Ok(()),
        };

        if unit.len() < 9 {
            warn!("PES packet on PID {} too short for its header", pid);
            return Ok(());
        }

        let header_data_length = unit[8] as usize;
        let payload_start = 9 + header_data_length;
        if payload_start > unit.len() {
            warn!("PES header length exceeds packet on PID {}", pid);
            return Ok(());
        }

        if let Some(pts) = parse_pts(&unit) {
            self.tracks[idx].timecode = pts_to_ns(pts);
        }

        let track = &mut self.tracks[idx];
        track.processed = true;
        let timecode = track.timecode;

        if let Some(ptzr) = track.ptzr {
            let packet = Packet::new(unit.slice(payload_start..)).with_timecode(timecode);
            self.packetizers[ptzr].process(packet)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for ptzr in &mut self.packetizers {
            ptzr.flush()?;
        }
        self.done = true;
        Ok(())
    }
}

/// Tests each candidate packet size for a run of sync bytes at that
/// stride; returns the start offset and the detected size.
pub fn detect_packet_size(buf: &[u8]) -> Option<(usize, usize)> {
    for &size in &POTENTIAL_PACKET_SIZES {
        for offset in 0..size.min(buf.len()) {
            if buf[offset] != SYNC_BYTE {
                continue;
            }
            // Short inputs get fewer confirmations but never fewer than two.
            let required = ((buf.len() - offset) / size).min(PROBE_PACKET_COUNT);
            if required < 2 {
                break;
            }
            if (1..required).all(|i| buf[offset + i * size] == SYNC_BYTE) {
                return Some((offset, size));
            }
        }
    }
    None
}

/// Parse the PTS field from a PES header, if flagged present.
fn parse_pts(data: &[u8]) -> Option<u64> {
    if data.len() < 14 || (data[7] & 0x80) == 0 {
        return None;
    }

    let pts = ((data[9] as u64 & 0x0E) << 29)
        | ((data[10] as u64) << 22)
        | ((data[11] as u64 & 0xFE) << 14)
        | ((data[12] as u64) << 7)
        | ((data[13] as u64 & 0xFE) >> 1);

    Some(pts)
}

#[async_trait]
impl<R: AsyncRead + AsyncSeek + Unpin + Send> Reader for TsReader<R> {
    fn identify(&self) -> Vec<TrackSummary> {
        self.tracks
            .iter()
            .map(|t| TrackSummary {
                id: t.id,
                kind: t.kind,
                codec: t.codec,
                description: format!("{:?} ({:?}) on PID {:#06x}", t.kind, t.codec, t.pid.unwrap_or(0)),
            })
            .collect()
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn create_packetizers(&mut self) -> Result<()> {
        for idx in 0..self.tracks.len() {
            if self.tracks[idx].ptzr.is_some() {
                continue;
            }
            let track = &self.tracks[idx];
            let ptzr: Box<dyn Packetizer> = match track.codec {
                CodecType::H264 | CodecType::H265 => {
                    Box::new(VideoPacketizer::new(track, &self.options)?)
                }
                CodecType::AAC => Box::new(AacPacketizer::new(
                    track,
                    self.options.aac_emphasis.unwrap_or(false),
                )),
                _ if track.kind != MediaKind::Unknown => {
                    Box::new(PassthroughPacketizer::new(track))
                }
                _ => continue,
            };
            self.packetizers.push(ptzr);
            self.tracks[idx].ptzr = Some(self.packetizers.len() - 1);
        }
        Ok(())
    }

    fn packetizers(&self) -> &[Box<dyn Packetizer>] {
        &self.packetizers
    }

    async fn read(&mut self) -> Result<ReadStatus> {
        if self.done {
            return Ok(ReadStatus::Done);
        }
        for _ in 0..PACKETS_PER_READ {
            if !self.consume_packet().await? {
                self.finish()?;
                return Ok(ReadStatus::Done);
            }
        }
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
