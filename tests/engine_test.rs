use bytes::Bytes;
use demuxio::av::{CodecType, MediaKind};
use demuxio::config::DemuxOptions;
use demuxio::format::tests::TestMuxer;
use demuxio::format::ts::{PID_PAT, STREAM_TYPE_AAC, STREAM_TYPE_H264, SYNC_BYTE, TS_PACKET_SIZE};
use demuxio::format::{MediaReader, ReadStatus, Reader};
use demuxio::packetizer::NaluSizeRewriter;
use demuxio::sched::Scheduler;
use demuxio::utils::Crc32;
use pretty_assertions::assert_eq;
use std::io::Cursor;

const VIDEO_PID: u16 = 0x101;
const AUDIO_PID: u16 = 0x102;
const PMT_PID: u16 = 0x100;

fn ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= TS_PACKET_SIZE - 4);
    let mut packet = Vec::with_capacity(TS_PACKET_SIZE);
    packet.push(SYNC_BYTE);
    packet.push(((pid >> 8) as u8 & 0x1F) | if pusi { 0x40 } else { 0x00 });
    packet.push(pid as u8);
    packet.push(0x10 | (cc & 0x0F));
    packet.extend_from_slice(payload);
    packet.resize(TS_PACKET_SIZE, 0xFF);
    packet
}

fn section_packet(pid: u16, cc: u8, section: &[u8]) -> Vec<u8> {
    let mut payload = vec![0u8]; // pointer field
    payload.extend_from_slice(section);
    ts_packet(pid, true, cc, &payload)
}

fn pat_section(pmt_pid: u16) -> Vec<u8> {
    let mut body = vec![0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00];
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&(0xE000 | pmt_pid).to_be_bytes());
    let crc = Crc32::mpeg2().calculate(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}

fn pmt_section(streams: &[(u8, u16)]) -> Vec<u8> {
    let section_length = 9 + streams.len() * 5 + 4;
    let mut body = vec![
        0x02,
        0xB0 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
    ];
    body.extend_from_slice(&1u16.to_be_bytes());
    body.push(0xC1);
    body.extend_from_slice(&[0x00, 0x00]);
    body.extend_from_slice(&[0xE1, 0x00]); // PCR PID
    body.extend_from_slice(&[0xF0, 0x00]); // program info length 0
    for &(stream_type, pid) in streams {
        body.push(stream_type);
        body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
        body.extend_from_slice(&[0xF0, 0x00]);
    }
    let crc = Crc32::mpeg2().calculate(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}

fn pes_unit(stream_id: u8, es: &[u8], pts: Option<u64>) -> Vec<u8> {
    let mut unit = vec![0x00, 0x00, 0x01, stream_id];
    let header_data_len = if pts.is_some() { 5 } else { 0 };
    let pes_len = 3 + header_data_len + es.len();
    unit.extend_from_slice(&(pes_len as u16).to_be_bytes());
    unit.push(0x80);
    unit.push(if pts.is_some() { 0x80 } else { 0x00 });
    unit.push(header_data_len as u8);
    if let Some(pts) = pts {
        unit.push(0x21 | ((pts >> 29) as u8 & 0x0E));
        unit.push((pts >> 22) as u8);
        unit.push(0x01 | ((pts >> 14) as u8 & 0xFE));
        unit.push((pts >> 7) as u8);
        unit.push(0x01 | ((pts << 1) as u8 & 0xFE));
    }
    unit.extend_from_slice(es);
    unit
}

/// A minimal but self-consistent transport stream: one program with one
/// H.264 track, carrying `frames` length-prefixed access units.
fn build_ts(frames: &[&[u8]]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(section_packet(PID_PAT, 0, &pat_section(PMT_PID)));
    data.extend(section_packet(
        PMT_PID,
        0,
        &pmt_section(&[(STREAM_TYPE_H264, VIDEO_PID)]),
    ));
    for (i, es) in frames.iter().enumerate() {
        let pes = pes_unit(0xE0, es, Some(90_000 * (i as u64 + 1)));
        data.extend(ts_packet(VIDEO_PID, true, i as u8, &pes));
    }
    data
}

/// Two NALUs with 4-byte size prefixes.
fn nalu_frame() -> Vec<u8> {
    let mut es = Vec::new();
    es.extend_from_slice(&5u32.to_be_bytes());
    es.extend_from_slice(&[0x65, 1, 2, 3, 4]);
    es.extend_from_slice(&3u32.to_be_bytes());
    es.extend_from_slice(&[0x41, 9, 8]);
    es
}

#[tokio::test]
async fn test_probe_identifies_single_video_track() {
    let data = build_ts(&[&nalu_frame()]);
    let size = data.len() as u64;
    let reader = MediaReader::open(Cursor::new(data), size, DemuxOptions::default())
        .await
        .unwrap();

    let summaries = reader.identify();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].kind, MediaKind::Video);
    assert_eq!(summaries[0].codec, CodecType::H264);
    assert_eq!(reader.tracks()[0].pid, Some(VIDEO_PID));
}

#[tokio::test]
async fn test_ts_to_muxer_pipeline() {
    let frames = [nalu_frame(), nalu_frame()];
    let data = build_ts(&[&frames[0], &frames[1]]);
    let size = data.len() as u64;

    let reader = MediaReader::open(Cursor::new(data), size, DemuxOptions::default())
        .await
        .unwrap();

    let mut scheduler = Scheduler::new(TestMuxer::new());
    scheduler.add_reader(Box::new(reader));
    let muxer = scheduler.run().await.unwrap();

    assert!(muxer.header_written);
    assert!(muxer.trailer_written);
    assert_eq!(muxer.tracks.len(), 1);
    assert_eq!(muxer.packets.len(), 2);
    assert_eq!(&muxer.packets[0].data[..], &frames[0][..]);
    assert_eq!(muxer.packets[0].timecode, Some(1_000_000_000));
    assert_eq!(muxer.packets[1].timecode, Some(2_000_000_000));
}

#[test]
fn test_nalu_size_rewrite_round_trip() {
    let frame = Bytes::from(nalu_frame());

    let narrowed = NaluSizeRewriter::new(4, 2).unwrap().rewrite(&frame).unwrap();
    assert_eq!(narrowed.len(), 2 + 5 + 2 + 3);

    let restored = NaluSizeRewriter::new(2, 4).unwrap().rewrite(&narrowed).unwrap();
    assert_eq!(restored, frame);

    // A NALU too large for a 1-byte size field is a configuration error.
    let mut big = Vec::new();
    big.extend_from_slice(&300u32.to_be_bytes());
    big.extend(vec![0x41u8; 300]);
    let err = NaluSizeRewriter::new(4, 1)
        .unwrap()
        .rewrite(&Bytes::from(big))
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_mixed_program_yields_both_tracks() {
    let mut data = Vec::new();
    data.extend(section_packet(PID_PAT, 0, &pat_section(PMT_PID)));
    data.extend(section_packet(
        PMT_PID,
        0,
        &pmt_section(&[(STREAM_TYPE_H264, VIDEO_PID), (STREAM_TYPE_AAC, AUDIO_PID)]),
    ));
    let size = data.len() as u64;

    let mut reader = MediaReader::open(Cursor::new(data), size, DemuxOptions::default())
        .await
        .unwrap();

    assert_eq!(reader.tracks().len(), 2);
    assert_eq!(reader.tracks()[0].codec, CodecType::H264);
    assert_eq!(reader.tracks()[1].codec, CodecType::AAC);

    reader.create_packetizers().unwrap();
    assert_eq!(reader.packetizers().len(), 2);
    assert_eq!(reader.tracks()[0].ptzr, Some(0));
    assert_eq!(reader.tracks()[1].ptzr, Some(1));
}

#[tokio::test]
async fn test_unrecognized_input_rejected() {
    let data = vec![0x42u8; 8192];
    let size = data.len() as u64;
    let result = MediaReader::open(Cursor::new(data), size, DemuxOptions::default()).await;
    let Err(err) = result else {
        panic!("noise input must not be recognized");
    };
    assert!(!err.is_configuration());
}

#[tokio::test]
async fn test_progress_reaches_completion() {
    let data = build_ts(&[&nalu_frame()]);
    let size = data.len() as u64;
    let mut reader = MediaReader::open(Cursor::new(data), size, DemuxOptions::default())
        .await
        .unwrap();
    reader.create_packetizers().unwrap();
    while reader.read().await.unwrap() == ReadStatus::MoreData {}

    assert!(reader.is_done());
    assert_eq!(reader.progress(), Some(100));
}
