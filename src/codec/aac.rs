use crate::error::{DemuxError, Result};
use crate::utils::BitReader;

/// Parsed ADTS frame header.
///
/// Two layouts exist in the wild: the standard MPEG-4 one and an older
/// MPEG-2 variant carrying a two-bit emphasis field between the `home` bit
/// and the copyright bits. The caller states which layout to assume; the
/// AAC reader guesses it once per file.
#[derive(Debug, Clone)]
pub struct AdtsHeader {
    /// 0 = MPEG-4, 1 = MPEG-2
    pub id: u8,
    pub protection_absent: bool,
    pub profile: u8,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
    pub emphasis: Option<u8>,
    /// Total frame length in bytes, header included.
    pub frame_length: usize,
    /// Header size in bytes for this layout, CRC included when present.
    pub header_size: usize,
}

impl AdtsHeader {
    /// Decodes an ADTS header starting at `data[0]`.
    pub fn parse(data: &[u8], emphasis_present: bool) -> Result<AdtsHeader> {
        if data.len() < 8 {
            return Err(DemuxError::Parser("ADTS header too short".into()));
        }

        let mut reader = BitReader::new(data);

        let sync_word = reader.read_bits(12)?;
        if sync_word != 0xFFF {
            return Err(DemuxError::Parser("invalid ADTS sync word".into()));
        }

        let id = reader.read_bits(1)? as u8;
        let layer = reader.read_bits(2)? as u8;
        if layer != 0 {
            return Err(DemuxError::Parser("invalid ADTS layer".into()));
        }
        let protection_absent = reader.read_bits(1)? == 1;

        let profile = reader.read_bits(2)? as u8;
        let sample_rate_index = reader.read_bits(4)? as u8;
        if sample_rate(sample_rate_index).is_none() {
            return Err(DemuxError::Parser("invalid ADTS sample rate index".into()));
        }
        reader.skip_bits(1)?; // private bit
        let channel_configuration = reader.read_bits(3)? as u8;
        reader.skip_bits(2)?; // original/copy, home

        let emphasis = if emphasis_present {
            Some(reader.read_bits(2)? as u8)
        } else {
            None
        };

        reader.skip_bits(2)?; // copyright id bit/start
        let frame_length = reader.read_bits(13)? as usize;
        reader.skip_bits(11)?; // buffer fullness
        reader.skip_bits(2)?; // number of raw data blocks

        let mut header_size = if emphasis_present { 8 } else { 7 };
        if !protection_absent {
            header_size += 2;
        }

        if frame_length < header_size {
            return Err(DemuxError::Parser(
                "ADTS frame length shorter than its header".into(),
            ));
        }

        Ok(AdtsHeader {
            id,
            protection_absent,
            profile,
            sample_rate_index,
            channel_configuration,
            emphasis,
            frame_length,
            header_size,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        sample_rate(self.sample_rate_index).unwrap_or(44100)
    }
}

/// Sample rate for an ADTS sample-rate index.
pub fn sample_rate(index: u8) -> Option<u32> {
    match index {
        0 => Some(96000),
        1 => Some(88200),
        2 => Some(64000),
        3 => Some(48000),
        4 => Some(44100),
        5 => Some(32000),
        6 => Some(24000),
        7 => Some(22050),
        8 => Some(16000),
        9 => Some(12000),
        10 => Some(11025),
        11 => Some(8000),
        12 => Some(7350),
        _ => None,
    }
}

/// Scans `data` for the next parsable ADTS header and returns its offset.
pub fn find_frame(data: &[u8], emphasis_present: bool) -> Option<(usize, AdtsHeader)> {
    let mut pos = 0;
    while pos + 8 <= data.len() {
        if data[pos] == 0xFF && (data[pos + 1] & 0xF6) == 0xF0 {
            if let Ok(header) = AdtsHeader::parse(&data[pos..], emphasis_present) {
                return Some((pos, header));
            }
        }
        pos += 1;
    }
    None
}

#[cfg(test)]
pub(crate) fn build_frame(payload_len: usize, emphasis_present: bool) -> Vec<u8> {
    // AAC-LC, 44.1 kHz, stereo, no CRC
    let header_size = if emphasis_present { 8 } else { 7 };
    let frame_length = header_size + payload_len;
    let mut bits: Vec<bool> = Vec::new();
    let mut push = |value: u32, n: u32| {
        for i in (0..n).rev() {
            bits.push((value >> i) & 1 == 1);
        }
    };
    push(0xFFF, 12); // sync
    push(0, 1); // id: MPEG-4
    push(0, 2); // layer
    push(1, 1); // protection absent
    push(1, 2); // profile: LC
    push(4, 4); // 44.1 kHz
    push(0, 1); // private
    push(2, 3); // stereo
    push(0, 2); // original/copy, home
    if emphasis_present {
        push(0, 2);
    }
    push(0, 2); // copyright bits
    push(frame_length as u32, 13);
    push(0x7FF, 11); // buffer fullness
    push(0, 2); // raw data blocks

    let mut out = vec![0u8; (bits.len() + 7) / 8];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 1 << (7 - i % 8);
        }
    }
    out.extend(std::iter::repeat(0xAA).take(payload_len));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_adts_header() {
        let frame = build_frame(100, false);
        let header = AdtsHeader::parse(&frame, false).unwrap();

        assert_eq!(header.id, 0);
        assert_eq!(header.profile, 1);
        assert_eq!(header.sample_rate_index, 4);
        assert_eq!(header.sample_rate(), 44100);
        assert_eq!(header.channel_configuration, 2);
        assert_eq!(header.emphasis, None);
        assert_eq!(header.header_size, 7);
        assert_eq!(header.frame_length, 107);
    }

    #[test]
    fn test_parse_emphasis_variant() {
        let frame = build_frame(50, true);
        let header = AdtsHeader::parse(&frame, true).unwrap();

        assert_eq!(header.emphasis, Some(0));
        assert_eq!(header.header_size, 8);
        assert_eq!(header.frame_length, 58);
    }

    #[test]
    fn test_invalid_sync_word() {
        let data = vec![0x00, 0x00, 0x50, 0x80, 0x43, 0x80, 0x00, 0x00];
        assert!(AdtsHeader::parse(&data, false).is_err());
    }

    #[test]
    fn test_find_frame_skips_garbage() {
        let mut data = vec![0x12, 0xFF, 0x00, 0x47];
        let garbage_len = data.len();
        data.extend(build_frame(20, false));

        let (pos, header) = find_frame(&data, false).unwrap();
        assert_eq!(pos, garbage_len);
        assert_eq!(header.frame_length, 27);
    }

    #[test]
    fn test_find_frame_none() {
        assert!(find_frame(&[0u8; 64], false).is_none());
    }
}
