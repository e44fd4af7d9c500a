/// CRC32 for MPEG-2 TS PSI tables and OGG pages.
/// Based on ITU-T H.222.0 / ISO/IEC 13818-1 respectively RFC 3533.
/// Polynomial: x32 + x26 + x23 + x22 + x16 + x12 + x11 + x10 + x8 + x7 + x5 + x4 + x2 + x + 1
/// Initial value: 0xFFFFFFFF for PSI tables, 0 for OGG pages.
const CRC32_POLY: u32 = 0x04C11DB7;

/// Table-driven CRC32 calculator.
///
/// Both users of this polynomial in the crate (PSI section validation and
/// OGG page checksums) share the lookup table and differ only in the
/// initial register value.
pub struct Crc32 {
    table: [u32; 256],
    init: u32,
}

impl Crc32 {
    fn with_init(init: u32) -> Self {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = (i as u32) << 24;
            for _ in 0..8 {
                crc = if (crc & 0x8000_0000) != 0 {
                    (crc << 1) ^ CRC32_POLY
                } else {
                    crc << 1
                };
            }
            *entry = crc;
        }
        Self { table, init }
    }

    /// CRC32 as used for MPEG-2 PSI tables (PAT/PMT), initial value 0xFFFFFFFF.
    pub fn mpeg2() -> Self {
        Self::with_init(0xFFFF_FFFF)
    }

    /// CRC32 as used for OGG page checksums, initial value 0.
    pub fn ogg() -> Self {
        Self::with_init(0)
    }

    /// Calculates the checksum over `data`.
    pub fn calculate(&self, data: &[u8]) -> u32 {
        let mut crc = self.init;
        for &byte in data {
            let index = ((crc >> 24) ^ (byte as u32)) & 0xFF;
            crc = (crc << 8) ^ self.table[index as usize];
        }
        crc
    }

    /// Validates a PSI section whose last four bytes carry the CRC32 of
    /// everything preceding them. Returns false for sections shorter than
    /// the CRC field itself.
    pub fn verify_section(&self, section: &[u8]) -> bool {
        if section.len() < 4 {
            return false;
        }
        let (payload, crc_bytes) = section.split_at(section.len() - 4);
        let stored = ((crc_bytes[0] as u32) << 24)
            | ((crc_bytes[1] as u32) << 16)
            | ((crc_bytes[2] as u32) << 8)
            | crc_bytes[3] as u32;
        self.calculate(payload) == stored
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::mpeg2()
    }
}
