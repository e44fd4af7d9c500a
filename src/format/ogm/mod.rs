//! OGG/OGM input.
//!
//! Pages are located by their capture pattern and checked against the OGG
//! CRC before any lacing values are trusted. Packets are reassembled from
//! lacing runs, including continuation across pages. BOS packets type the
//! streams (Vorbis audio, OGM-style video and text).

use crate::av::{CodecType, Packet, Track, TrackSummary, REF_AUTOMATIC};
use crate::config::DemuxOptions;
use crate::error::{DemuxError, Result};
use crate::format::{ReadStatus, Reader};
use crate::packetizer::{Packetizer, PassthroughPacketizer};
use crate::utils::Crc32;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
const PAGE_HEADER_SIZE: usize = 27;
const READ_CHUNK_SIZE: usize = 4096;

const FLAG_CONTINUATION: u8 = 0x01;
const FLAG_BOS: u8 = 0x02;
const FLAG_EOS: u8 = 0x04;

/// OGM data-packet flag bits.
const OGM_PACKET_IS_HEADER: u8 = 0x01;
const OGM_PACKET_IS_KEYFRAME: u8 = 0x08;

/// One parsed OGG page header plus its segment payload boundaries.
#[derive(Debug)]
pub struct OggPage {
    pub header_type: u8,
    pub granule: i64,
    pub serial: u32,
    pub sequence: u32,
    /// Lacing values, one per segment.
    pub lacing: Vec<u8>,
    /// Byte length of the whole page, header included.
    pub total_size: usize,
    /// Offset of the payload within the page.
    pub payload_offset: usize,
}

impl OggPage {
    /// Total page size if `data` starts with a complete page header, or
    /// None if more bytes are needed to tell.
    pub fn required_size(data: &[u8]) -> Option<usize> {
        if data.len() < PAGE_HEADER_SIZE {
            return None;
        }
        let segments = data[26] as usize;
        if data.len() < PAGE_HEADER_SIZE + segments {
            return None;
        }
        let payload: usize = data[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + segments]
            .iter()
            .map(|&v| v as usize)
            .sum();
        Some(PAGE_HEADER_SIZE + segments + payload)
    }

    /// Parses and CRC-checks a complete page starting at `data[0]`.
    pub fn parse(data: &[u8], crc: &Crc32) -> Result<OggPage> {
        if !data.starts_with(CAPTURE_PATTERN) {
            return Err(DemuxError::InvalidData("missing OggS capture pattern".into()));
        }
        if data[4] != 0 {
            return Err(DemuxError::InvalidData(format!(
                "unsupported OGG stream structure version {}",
                data[4]
            )));
        }

        let total_size = Self::required_size(data)
            .ok_or_else(|| DemuxError::InvalidData("truncated OGG page".into()))?;
        if data.len() < total_size {
            return Err(DemuxError::InvalidData("truncated OGG page".into()));
        }

        let stored_crc = u32::from_le_bytes([data[22], data[23], data[24], data[25]]);
        let mut check = data[..total_size].to_vec();
        check[22..26].fill(0);
        if crc.calculate(&check) != stored_crc {
            return Err(DemuxError::InvalidData("OGG page CRC mismatch".into()));
        }

        let segments = data[26] as usize;
        Ok(OggPage {
            header_type: data[5],
            granule: i64::from_le_bytes(data[6..14].try_into().unwrap()),
            serial: u32::from_le_bytes(data[14..18].try_into().unwrap()),
            sequence: u32::from_le_bytes(data[18..22].try_into().unwrap()),
            lacing: data[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + segments].to_vec(),
            total_size,
            payload_offset: PAGE_HEADER_SIZE + segments,
        })
    }
}

/// How a stream's granule positions convert to nanoseconds.
#[derive(Debug, Clone, Copy)]
enum GranuleScale {
    /// Granule counts PCM samples at this rate.
    Samples(u32),
    /// Granule counts units of `time_unit` 100-nanosecond ticks (OGM).
    TimeUnits(i64),
    Unknown,
}

impl GranuleScale {
    fn to_ns(self, granule: i64) -> Option<i64> {
        if granule < 0 {
            return None;
        }
        match self {
            GranuleScale::Samples(rate) if rate > 0 => {
                Some(granule * 1_000_000_000 / rate as i64)
            }
            GranuleScale::TimeUnits(unit) => Some(granule * unit * 100),
            _ => None,
        }
    }
}

/// Per-serial demultiplexing state.
struct OggStream {
    track_idx: usize,
    pending: BytesMut,
    continued: bool,
    last_sequence: Option<u32>,
    /// Leading packets that carry codec configuration, not media data.
    headers_remaining: usize,
    scale: GranuleScale,
    ogm_style: bool,
    last_timecode: i64,
}

/// OGG/OGM reader. Supports Vorbis audio plus OGM-wrapped video and text
/// streams; other BOS types still become tracks nothing is bound to.
pub struct OgmReader<R> {
    io: R,
    size: u64,
    bytes_processed: u64,
    crc: Crc32,
    buffer: BytesMut,

    tracks: Vec<Track>,
    streams: HashMap<u32, OggStream>,
    /// Packets completed before packetizers exist, delivered on first read.
    staged: Vec<(usize, Packet)>,
    packetizers: Vec<Box<dyn Packetizer>>,
    track_to_ptzr: HashMap<usize, usize>,
    headers_done: bool,
    done: bool,
}

impl<R: AsyncRead + AsyncSeek + Unpin + Send> OgmReader<R> {
    /// Non-destructive format sniff. The input position is restored.
    pub async fn probe(io: &mut R, size: u64) -> Result<bool> {
        if size < 4 {
            return Ok(false);
        }
        let pos = io.stream_position().await?;
        io.seek(SeekFrom::Start(0)).await?;
        let mut magic = [0u8; 4];
        io.read_exact(&mut magic).await?;
        io.seek(SeekFrom::Start(pos)).await?;
        Ok(&magic == CAPTURE_PATTERN)
    }

    /// Opens the stream and consumes pages until the BOS group is over so
    /// all tracks are known. Data packets seen early are staged and
    /// delivered once packetizers exist.
    pub async fn open(mut io: R, size: u64, _options: DemuxOptions) -> Result<Self> {
        io.seek(SeekFrom::Start(0)).await?;
        let mut reader = Self {
            io,
            size,
            bytes_processed: 0,
            crc: Crc32::ogg(),
            buffer: BytesMut::new(),
            tracks: Vec::new(),
            streams: HashMap::new(),
            staged: Vec::new(),
            packetizers: Vec::new(),
            track_to_ptzr: HashMap::new(),
            headers_done: false,
            done: false,
        };

        while !reader.headers_done {
            if !reader.fill_buffer().await? {
                break;
            }
            reader.process_buffered_pages()?;
        }

        if reader.tracks.is_empty() {
            return Err(DemuxError::InvalidData("no OGG streams found".into()));
        }
        Ok(reader)
    }

    async fn fill_buffer(&mut self) -> Result<bool> {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let n = self.io.read(&mut chunk).await?;
        if n == 0 {
            return Ok(false);
        }
        self.bytes_processed += n as u64;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    /// Consumes every complete page currently in the buffer.
    fn process_buffered_pages(&mut self) -> Result<()> {
        loop {
            // Seek the capture pattern; discard leading junk.
            match find_capture(&self.buffer) {
                Some(0) => {}
                Some(pos) => {
                    warn!("skipping {} bytes before the next OGG page", pos);
                    let _ = self.buffer.split_to(pos);
                }
                None => {
                    let keep = self.buffer.len().min(3);
                    let cut = self.buffer.len() - keep;
                    if cut > 0 {
                        warn!("skipping {} bytes before the next OGG page", cut);
                        let _ = self.buffer.split_to(cut);
                    }
                    return Ok(());
                }
            }

            let total = match OggPage::required_size(&self.buffer) {
                Some(total) if self.buffer.len() >= total => total,
                _ => return Ok(()),
            };

            match OggPage::parse(&self.buffer[..total], &self.crc) {
                Ok(page) => {
                    let payload_offset = page.payload_offset;
                    let payload = self.buffer[payload_offset..total].to_vec();
                    self.handle_page(&page, &payload)?;
                    let _ = self.buffer.split_to(total);
                }
                Err(e) => {
                    warn!("discarding corrupt OGG page: {}", e);
                    // Slide past the capture pattern and rescan.
                    let _ = self.buffer.split_to(4);
                }
            }
        }
    }

    fn handle_page(&mut self, page: &OggPage, payload: &[u8]) -> Result<()> {
        if (page.header_type & FLAG_BOS) == 0 && !self.headers_done {
            // BOS pages are contiguous at the start of the stream.
            self.headers_done = true;
        }

        if (page.header_type & FLAG_BOS) != 0 && !self.streams.contains_key(&page.serial) {
            self.add_stream(page.serial, payload, &page.lacing);
        }

        let stream = match self.streams.get_mut(&page.serial) {
            Some(stream) => stream,
            None => return Ok(()),
        };

        // A sequence gap means at least one lost page; the packet being
        // reassembled cannot be completed.
        if let Some(last) = stream.last_sequence {
            if page.sequence != last.wrapping_add(1) {
                warn!(
                    "OGG page sequence gap on stream {:#010x} ({} then {}), dropping the current packet",
                    page.serial, last, page.sequence
                );
                stream.pending.clear();
                stream.continued = false;
            }
        }
        stream.last_sequence = Some(page.sequence);

        let continuation = (page.header_type & FLAG_CONTINUATION) != 0;
        if continuation && !stream.continued {
            warn!(
                "OGG continuation page on stream {:#010x} without a packet in flight",
                page.serial
            );
        } else if !continuation && stream.continued {
            warn!(
                "dropping unfinished OGG packet on stream {:#010x}",
                page.serial
            );
            stream.pending.clear();
        }

        let mut completed: Vec<Bytes> = Vec::new();
        let mut offset = 0usize;
        for &lacing in &page.lacing {
            let end = (offset + lacing as usize).min(payload.len());
            stream.pending.extend_from_slice(&payload[offset..end]);
            offset = end;
            if lacing < 255 {
                completed.push(stream.pending.split().freeze());
            }
        }
        stream.continued = page.lacing.last() == Some(&255);

        if (page.header_type & FLAG_EOS) != 0 {
            if stream.continued {
                warn!(
                    "OGG stream {:#010x} ends with an unfinished packet, dropping it",
                    page.serial
                );
                stream.pending.clear();
                stream.continued = false;
            }
            debug!("OGG stream {:#010x} reached end of stream", page.serial);
        }

        let track_idx = stream.track_idx;
        let count = completed.len();
        for (i, data) in completed.into_iter().enumerate() {
            // The page granule describes the last packet completed on it.
            let granule = if i + 1 == count { Some(page.granule) } else { None };
            self.handle_packet(page.serial, track_idx, data, granule)?;
        }
        Ok(())
    }

    /// Types a new stream from the first bytes of its BOS packet.
    fn add_stream(&mut self, serial: u32, payload: &[u8], lacing: &[u8]) {
        let first_len = lacing.first().map(|&v| v as usize).unwrap_or(0).min(payload.len());
        let bos = &payload[..first_len];
        let id = self.tracks.len();

        let (track, scale, ogm_style, headers) = if bos.len() >= 16 && &bos[..7] == b"\x01vorbis" {
            let channels = bos[11];
            let rate = u32::from_le_bytes(bos[12..16].try_into().unwrap());
            let mut track = Track::new(id, CodecType::Vorbis, *b"vrbs");
            track.sample_rate = Some(rate);
            track.channels = Some(channels);
            (track, GranuleScale::Samples(rate), false, 3)
        } else if bos.len() >= 53 && &bos[..9] == b"\x01video\0\0\0" {
            let fourcc: [u8; 4] = bos[9..13].try_into().unwrap();
            let time_unit = i64::from_le_bytes(bos[17..25].try_into().unwrap());
            let width = u32::from_le_bytes(bos[45..49].try_into().unwrap());
            let height = u32::from_le_bytes(bos[49..53].try_into().unwrap());
            let codec = match &fourcc {
                b"avc1" | b"AVC1" | b"H264" => CodecType::H264,
                _ => CodecType::Unknown,
            };
            let mut track = Track::new(id, codec, fourcc);
            track.kind = crate::av::MediaKind::Video;
            track.width = Some(width);
            track.height = Some(height);
            (track, GranuleScale::TimeUnits(time_unit), true, 1)
        } else if bos.len() >= 9 && &bos[..5] == b"\x01text" {
            let time_unit = if bos.len() >= 25 {
                i64::from_le_bytes(bos[17..25].try_into().unwrap())
            } else {
                10_000
            };
            let track = Track::new(id, CodecType::Text, *b"text");
            (track, GranuleScale::TimeUnits(time_unit), true, 1)
        } else {
            debug!("unrecognized OGG stream {:#010x}", serial);
            (
                Track::new(id, CodecType::Unknown, *b"????"),
                GranuleScale::Unknown,
                false,
                1,
            )
        };

        debug!(
            "new {:?} OGG stream {:#010x} as track {}",
            track.kind, serial, id
        );
        self.tracks.push(track);
        self.streams.insert(
            serial,
            OggStream {
                track_idx: id,
                pending: BytesMut::new(),
                continued: false,
                last_sequence: None,
                headers_remaining: headers,
                scale,
                ogm_style,
                last_timecode: 0,
            },
        );
    }

    fn handle_packet(
        &mut self,
        serial: u32,
        track_idx: usize,
        data: Bytes,
        granule: Option<i64>,
    ) -> Result<()> {
        let stream = match self.streams.get_mut(&serial) {
            Some(stream) => stream,
            None => return Ok(()),
        };

        let flags = data.first().copied().unwrap_or(0);

        if stream.headers_remaining > 0
            || (stream.ogm_style && (flags & OGM_PACKET_IS_HEADER) != 0)
        {
            if stream.headers_remaining > 0 {
                stream.headers_remaining -= 1;
            }
            let track = &mut self.tracks[track_idx];
            match &mut track.codec_private {
                // Secondary headers (e.g. Vorbis setup) are appended so the
                // full configuration travels with the track.
                Some(private) => {
                    let mut joined = BytesMut::from(&private[..]);
                    joined.extend_from_slice(&data);
                    *private = joined.freeze();
                }
                None => track.codec_private = Some(data),
            }
            return Ok(());
        }

        let mut packet = if stream.ogm_style {
            if data.is_empty() {
                return Ok(());
            }
            let len_bytes = (((flags & 0xC0) >> 6) | ((flags & 0x02) << 1)) as usize;
            let start = (1 + len_bytes).min(data.len());
            let mut packet = Packet::new(data.slice(start..)).with_track_id(track_idx);
            if (flags & OGM_PACKET_IS_KEYFRAME) == 0 {
                packet = packet.with_bref(REF_AUTOMATIC);
            }
            packet
        } else {
            Packet::new(data).with_track_id(track_idx)
        };

        if let Some(tc) = granule.and_then(|g| stream.scale.to_ns(g)) {
            packet.timecode = Some(tc);
            stream.last_timecode = tc;
        }
        if packet.bref == Some(REF_AUTOMATIC) {
            packet.bref = Some(stream.last_timecode);
        }

        self.tracks[track_idx].processed = true;
        self.staged.push((track_idx, packet));
        Ok(())
    }

    /// Routes staged packets into their bound packetizers.
    fn deliver_staged(&mut self) -> Result<()> {
        for (track_idx, packet) in std::mem::take(&mut self.staged) {
            match self.track_to_ptzr.get(&track_idx) {
                Some(&ptzr) => self.packetizers[ptzr].process(packet)?,
                None => debug!("no packetizer bound to track {}, dropping packet", track_idx),
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.process_buffered_pages()?;
        self.deliver_staged()?;
        for ptzr in &mut self.packetizers {
            ptzr.flush()?;
        }
        self.done = true;
        Ok(())
    }
}

fn find_capture(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == CAPTURE_PATTERN)
}

#[async_trait]
impl<R: AsyncRead + AsyncSeek + Unpin + Send> Reader for OgmReader<R> {
    fn identify(&self) -> Vec<TrackSummary> {
        self.tracks
            .iter()
            .map(|t| TrackSummary {
                id: t.id,
                kind: t.kind,
                codec: t.codec,
                description: format!("{:?} ({:?})", t.kind, t.codec),
            })
            .collect()
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn create_packetizers(&mut self) -> Result<()> {
        for idx in 0..self.tracks.len() {
            if self.tracks[idx].ptzr.is_some() || self.tracks[idx].codec == CodecType::Unknown {
                continue;
            }
            self.packetizers
                .push(Box::new(PassthroughPacketizer::new(&self.tracks[idx])));
            let ptzr = self.packetizers.len() - 1;
            self.tracks[idx].ptzr = Some(ptzr);
            self.track_to_ptzr.insert(idx, ptzr);
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
        if !self.fill_buffer().await? {
            self.finish()?;
            return Ok(ReadStatus::Done);
        }
        self.process_buffered_pages()?;
        self.deliver_staged()?;
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


#[cfg(test)]
mod tests {
    use super::test_pages::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn vorbis_stream(serial: u32) -> Vec<u8> {
        let ident = vorbis_ident(2, 48_000);
        let comment = b"\x03vorbis comment".to_vec();
        let setup = b"\x05vorbis setup".to_vec();
        let audio1 = vec![0x40u8; 100];
        let audio2 = vec![0x41u8; 60];

        let mut data = build_page(serial, 0, FLAG_BOS, 0, &[&ident], false);
        data.extend(build_page(serial, 1, 0, 0, &[&comment, &setup], false));
        data.extend(build_page(serial, 2, 0, 1024, &[&audio1], false));
        data.extend(build_page(serial, 3, 0, 2048, &[&audio2], false));
        data
    }

    #[test]
    fn test_page_parse_and_crc() {
        let crc = Crc32::ogg();
        let page = build_page(7, 3, 0, 1000, &[b"hello", b"world"], false);

        let parsed = OggPage::parse(&page, &crc).unwrap();
        assert_eq!(parsed.serial, 7);
        assert_eq!(parsed.sequence, 3);
        assert_eq!(parsed.granule, 1000);
        assert_eq!(parsed.lacing, vec![5, 5]);

        let mut corrupt = page.clone();
        corrupt[30] ^= 0x01;
        assert!(OggPage::parse(&corrupt, &crc).is_err());
    }

    #[tokio::test]
    async fn test_probe() {
        let data = vorbis_stream(1);
        let size = data.len() as u64;
        let mut cur = Cursor::new(data);
        assert!(OgmReader::probe(&mut cur, size).await.unwrap());

        let mut cur = Cursor::new(b"RIFFdata".to_vec());
        assert!(!OgmReader::probe(&mut cur, 8).await.unwrap());
    }

    #[tokio::test]
    async fn test_vorbis_stream_end_to_end() {
        let data = vorbis_stream(0x1234);
        let size = data.len() as u64;
        let mut reader = OgmReader::open(Cursor::new(data), size, DemuxOptions::default())
            .await
            .unwrap();

        assert_eq!(reader.tracks().len(), 1);
        let track = &reader.tracks()[0];
        assert_eq!(track.codec, CodecType::Vorbis);
        assert_eq!(track.sample_rate, Some(48_000));
        assert_eq!(track.channels, Some(2));

        reader.create_packetizers().unwrap();
        while reader.read().await.unwrap() == ReadStatus::MoreData {}

        // All three header packets end up in the codec private data.
        let private = reader.tracks()[0].codec_private.as_ref().unwrap();
        assert!(private.starts_with(b"\x01vorbis"));

        let packets = reader.take_packets();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data.len(), 100);
        // 1024 samples at 48 kHz.
        assert_eq!(packets[0].timecode, Some(21_333_333));
        assert_eq!(packets[1].data.len(), 60);
    }

    #[tokio::test]
    async fn test_packet_continuation_across_pages() {
        let serial = 5;
        let ident = vorbis_ident(1, 44_100);
        let comment = b"\x03vorbis c".to_vec();
        let setup = b"\x05vorbis s".to_vec();
        let big: Vec<u8> = (0..400).map(|i| i as u8).collect();

        let mut data = build_page(serial, 0, FLAG_BOS, 0, &[&ident], false);
        data.extend(build_page(serial, 1, 0, 0, &[&comment, &setup], false));
        // First 255 bytes on one page (open run), remainder continued.
        data.extend(build_page(serial, 2, 0, -1, &[&big[..255]], true));
        data.extend(build_page(serial, 3, FLAG_CONTINUATION, 4096, &[&big[255..]], false));

        let size = data.len() as u64;
        let mut reader = OgmReader::open(Cursor::new(data), size, DemuxOptions::default())
            .await
            .unwrap();
        reader.create_packetizers().unwrap();
        while reader.read().await.unwrap() == ReadStatus::MoreData {}

        let packets = reader.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0].data[..], &big[..]);
    }

    #[tokio::test]
    async fn test_sequence_gap_drops_packet_in_flight() {
        let serial = 9;
        let ident = vorbis_ident(1, 44_100);
        let comment = b"\x03vorbis c".to_vec();
        let setup = b"\x05vorbis s".to_vec();
        let big = vec![0x7Fu8; 400];
        let small = vec![0x2Au8; 10];

        let mut data = build_page(serial, 0, FLAG_BOS, 0, &[&ident], false);
        data.extend(build_page(serial, 1, 0, 0, &[&comment, &setup], false));
        data.extend(build_page(serial, 2, 0, -1, &[&big[..255]], true));
        // The continuation page is lost; sequence jumps from 2 to 4.
        data.extend(build_page(serial, 4, 0, 8192, &[&small], false));

        let size = data.len() as u64;
        let mut reader = OgmReader::open(Cursor::new(data), size, DemuxOptions::default())
            .await
            .unwrap();
        reader.create_packetizers().unwrap();
        while reader.read().await.unwrap() == ReadStatus::MoreData {}

        let packets = reader.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0].data[..], &small[..]);
    }

    fn text_bos() -> Vec<u8> {
        let mut bos = vec![0x01u8];
        bos.extend_from_slice(b"text\0\0\0\0"); // streamtype
        bos.extend_from_slice(&[0u8; 8]); // subtype, size
        bos.extend_from_slice(&10_000i64.to_le_bytes()); // time_unit
        bos.extend_from_slice(&[0u8; 28]); // remaining header fields
        bos
    }

    #[tokio::test]
    async fn test_ogm_text_stream_typed_and_packetized() {
        let serial = 11;
        // Keyframe flag set, no extra length bytes, then the subtitle text.
        let mut subtitle = vec![0x08u8];
        subtitle.extend_from_slice(b"hello");

        let mut data = build_page(serial, 0, FLAG_BOS, 0, &[&text_bos()], false);
        data.extend(build_page(serial, 1, 0, 500, &[&subtitle], false));

        let size = data.len() as u64;
        let mut reader = OgmReader::open(Cursor::new(data), size, DemuxOptions::default())
            .await
            .unwrap();

        assert_eq!(reader.tracks().len(), 1);
        assert_eq!(reader.tracks()[0].codec, CodecType::Text);
        assert_eq!(reader.tracks()[0].kind, crate::av::MediaKind::Subtitle);

        reader.create_packetizers().unwrap();
        assert_eq!(reader.packetizers().len(), 1);
        while reader.read().await.unwrap() == ReadStatus::MoreData {}

        let packets = reader.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0].data[..], b"hello");
        // 500 granule units of 10000 * 100 ns each.
        assert_eq!(packets[0].timecode, Some(500_000_000));
        assert!(packets[0].is_key());
    }

    #[tokio::test]
    async fn test_corrupt_page_skipped() {
        let serial = 2;
        let ident = vorbis_ident(2, 48_000);
        let comment = b"\x03vorbis c".to_vec();
        let setup = b"\x05vorbis s".to_vec();
        let audio = vec![0x55u8; 40];

        let mut data = build_page(serial, 0, FLAG_BOS, 0, &[&ident], false);
        data.extend(build_page(serial, 1, 0, 0, &[&comment, &setup], false));
        let mut bad = build_page(serial, 2, 0, 512, &[&[0xEEu8; 30][..]], false);
        bad[40] ^= 0xFF;
        data.extend(bad);
        data.extend(build_page(serial, 3, 0, 1024, &[&audio], false));

        let size = data.len() as u64;
        let mut reader = OgmReader::open(Cursor::new(data), size, DemuxOptions::default())
            .await
            .unwrap();
        reader.create_packetizers().unwrap();
        while reader.read().await.unwrap() == ReadStatus::MoreData {}

        let packets = reader.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0].data[..], &audio[..]);
    }
}
