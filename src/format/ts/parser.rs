use super::types::*;
use crate::error::{DemuxError, Result};
use crate::utils::{ByteCursor, Crc32};
use log::warn;

/// Decoder for TS packet headers and PSI sections.
///
/// Pure per-call decoding; all cross-packet state (reassembly, continuity,
/// table versions) lives in the reader.
pub struct TsPacketParser {
    crc: Crc32,
}

impl TsPacketParser {
    pub fn new() -> Self {
        Self { crc: Crc32::mpeg2() }
    }

    /// Decodes the fixed 4-byte header of a packet starting at `data[0]`.
    ///
    /// A wrong sync byte is an error so the caller can resynchronize. The
    /// reserved adaptation-field-control value 0b00 is reported but keeps
    /// the stream alive: the packet is treated as carrying no payload.
    pub fn parse_header(&self, data: &[u8]) -> Result<TsHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(DemuxError::InvalidData("TS packet too short".into()));
        }

        if data[0] != SYNC_BYTE {
            return Err(DemuxError::InvalidData("invalid sync byte".into()));
        }

        let adaptation_field_control = (data[3] >> 4) & 0x03;
        if adaptation_field_control == 0 {
            warn!(
                "TS packet with reserved adaptation field control on PID {}, ignoring its payload",
                (((data[1] & 0x1F) as u16) << 8) | data[2] as u16
            );
        }

        Ok(TsHeader {
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_exists: (data[3] & 0x20) != 0,
            contains_payload: (data[3] & 0x10) != 0,
            continuity_counter: data[3] & 0x0F,
        })
    }

    /// Decodes the adaptation field starting at `data[offset]`.
    pub fn parse_adaptation_field(
        &self,
        data: &[u8],
        offset: usize,
    ) -> Result<Option<AdaptationField>> {
        if data.len() <= offset {
            return Err(DemuxError::InvalidData("adaptation field missing".into()));
        }

        let length = data[offset] as usize;
        if length == 0 {
            return Ok(Some(AdaptationField {
                length: 0,
                discontinuity: false,
                random_access: false,
                pcr: None,
            }));
        }

        if data.len() < offset + length + 1 {
            return Err(DemuxError::InvalidData("adaptation field too short".into()));
        }

        let flags = data[offset + 1];
        let mut field = AdaptationField {
            length,
            discontinuity: (flags & 0x80) != 0,
            random_access: (flags & 0x40) != 0,
            pcr: None,
        };

        if (flags & 0x10) != 0 {
            if length < 7 {
                return Err(DemuxError::InvalidData("PCR data too short".into()));
            }
            let pos = offset + 2;
            let pcr_base = ((data[pos] as u64) << 25)
                | ((data[pos + 1] as u64) << 17)
                | ((data[pos + 2] as u64) << 9)
                | ((data[pos + 3] as u64) << 1)
                | ((data[pos + 4] & 0x80) as u64 >> 7);
            let pcr_ext = (((data[pos + 4] & 0x01) as u64) << 8) | (data[pos + 5] as u64);
            field.pcr = Some(pcr_base * 300 + pcr_ext);
        }

        Ok(Some(field))
    }

    /// Total section size (header + body + CRC) declared by the 12-bit
    /// section length field, or None if fewer than 3 bytes are available.
    pub fn section_total_length(data: &[u8]) -> Option<usize> {
        if data.len() < 3 {
            return None;
        }
        Some(3 + ((((data[1] & 0x0F) as usize) << 8) | data[2] as usize))
    }

    /// Parses a fully reassembled PAT section, CRC included.
    pub fn parse_pat(&self, section: &[u8]) -> Result<Pat> {
        self.check_section(section, TABLE_ID_PAT)?;

        let mut cur = ByteCursor::new(&section[..section.len() - 4]);
        cur.skip(3)?; // table id + section length
        cur.read_u16()?; // transport stream id
        let version_byte = cur.read_u8()?;
        cur.skip(2)?; // section number, last section number

        let mut pat = Pat {
            version: (version_byte >> 1) & 0x1F,
            current_next: (version_byte & 0x01) != 0,
            entries: Vec::new(),
        };

        while cur.remaining() >= 4 {
            let program_number = cur.read_u16()?;
            let pid = cur.read_u16()? & 0x1FFF;
            // program number 0 maps to the network PID, not a program
            if program_number != 0 {
                pat.entries.push(PatEntry {
                    program_number,
                    pmt_pid: pid,
                });
            }
        }

        Ok(pat)
    }

    /// Parses a fully reassembled PMT section, CRC included.
    pub fn parse_pmt(&self, section: &[u8]) -> Result<Pmt> {
        self.check_section(section, TABLE_ID_PMT)?;

        let mut cur = ByteCursor::new(&section[..section.len() - 4]);
        cur.skip(3)?;
        let program_number = cur.read_u16()?;
        let version_byte = cur.read_u8()?;
        cur.skip(2)?;

        let mut pmt = Pmt {
            version: (version_byte >> 1) & 0x1F,
            current_next: (version_byte & 0x01) != 0,
            program_number,
            pcr_pid: cur.read_u16()? & 0x1FFF,
            streams: Vec::new(),
        };

        let program_info_length = (cur.read_u16()? & 0x0FFF) as usize;
        cur.skip(program_info_length)?;

        while cur.remaining() >= 5 {
            let stream_type = cur.read_u8()?;
            let elementary_pid = cur.read_u16()? & 0x1FFF;
            let es_info_length = (cur.read_u16()? & 0x0FFF) as usize;
            let es_info = cur.take(es_info_length)?.to_vec();

            pmt.streams.push(EsInfo {
                stream_type,
                elementary_pid,
                es_info,
            });
        }

        Ok(pmt)
    }

    fn check_section(&self, section: &[u8], table_id: u8) -> Result<()> {
        if section.len() < 12 {
            return Err(DemuxError::InvalidData("section too short".into()));
        }
        if section[0] != table_id {
            return Err(DemuxError::InvalidData(format!(
                "unexpected table id {:#04x}, wanted {:#04x}",
                section[0], table_id
            )));
        }
        if !self.crc.verify_section(section) {
            return Err(DemuxError::InvalidData("section CRC mismatch".into()));
        }
        Ok(())
    }
}

impl Default for TsPacketParser {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_sections::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ts_header() {
        let parser = TsPacketParser::new();
        let data = [0x47, 0x40, 0x00, 0x1A];

        let header = parser.parse_header(&data).unwrap();
        assert!(header.payload_unit_start);
        assert!(!header.transport_error);
        assert_eq!(header.pid, 0);
        assert!(header.contains_payload);
        assert!(!header.adaptation_field_exists);
        assert_eq!(header.continuity_counter, 0x0A);
    }

    #[test]
    fn test_parse_header_rejects_bad_sync() {
        let parser = TsPacketParser::new();
        assert!(parser.parse_header(&[0x48, 0x40, 0x00, 0x10]).is_err());
    }

    #[test]
    fn test_parse_adaptation_field_with_pcr() {
        let parser = TsPacketParser::new();
        let mut data = vec![0x47, 0x00, 0x20, 0x30];
        data.push(7); // adaptation field length
        data.push(0x10); // PCR flag
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x80, 0x00]);
        data.resize(TS_PACKET_SIZE, 0xFF);

        let field = parser.parse_adaptation_field(&data, 4).unwrap().unwrap();
        assert_eq!(field.length, 7);
        assert_eq!(field.pcr, Some(300));
    }

    #[test]
    fn test_parse_pat() {
        let parser = TsPacketParser::new();
        let section = build_pat(0, 1, 0x100);

        let pat = parser.parse_pat(&section).unwrap();
        assert_eq!(pat.version, 0);
        assert!(pat.current_next);
        assert_eq!(pat.entries.len(), 1);
        assert_eq!(pat.entries[0].program_number, 1);
        assert_eq!(pat.entries[0].pmt_pid, 0x100);
    }

    #[test]
    fn test_pat_crc_mismatch_rejected() {
        let parser = TsPacketParser::new();
        let mut section = build_pat(0, 1, 0x100);
        section[9] ^= 0x01; // single bit flip in the entry area
        assert!(parser.parse_pat(&section).is_err());
    }

    #[test]
    fn test_parse_pmt() {
        let parser = TsPacketParser::new();
        let section = build_pmt(3, 1, &[(STREAM_TYPE_H264, 0x101), (STREAM_TYPE_AAC, 0x102)]);

        let pmt = parser.parse_pmt(&section).unwrap();
        assert_eq!(pmt.version, 3);
        assert_eq!(pmt.program_number, 1);
        assert_eq!(pmt.pcr_pid, 0x100);
        assert_eq!(pmt.streams.len(), 2);
        assert_eq!(pmt.streams[0].stream_type, STREAM_TYPE_H264);
        assert_eq!(pmt.streams[0].elementary_pid, 0x101);
        assert_eq!(pmt.streams[1].elementary_pid, 0x102);
    }

    #[test]
    fn test_section_total_length() {
        let section = build_pat(0, 1, 0x100);
        assert_eq!(
            TsPacketParser::section_total_length(&section),
            Some(section.len())
        );
        assert_eq!(TsPacketParser::section_total_length(&section[..2]), None);
    }
}
