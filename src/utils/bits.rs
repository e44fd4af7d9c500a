use crate::error::{DemuxError, Result};

/// A bounds-checked sequential reader over a fixed byte buffer.
///
/// All multi-byte reads are big-endian, matching the header fields of the
/// container formats parsed by this crate.
///
/// Example:
/// ```
/// use demuxio::utils::ByteCursor;
///
/// let data = [0x12, 0x34, 0x56];
/// let mut cur = ByteCursor::new(&data);
///
/// assert_eq!(cur.read_u8().unwrap(), 0x12);
/// assert_eq!(cur.read_u16().unwrap(), 0x3456);
/// ```
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a new cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(DemuxError::Parser(format!(
                "read of {} bytes past end of buffer (position {}, length {})",
                n,
                self.pos,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        let v = ((self.data[self.pos] as u16) << 8) | self.data[self.pos + 1] as u16;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        self.ensure(3)?;
        let v = ((self.data[self.pos] as u32) << 16)
            | ((self.data[self.pos + 1] as u32) << 8)
            | self.data[self.pos + 2] as u32;
        self.pos += 3;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let v = ((self.data[self.pos] as u32) << 24)
            | ((self.data[self.pos + 1] as u32) << 16)
            | ((self.data[self.pos + 2] as u32) << 8)
            | self.data[self.pos + 3] as u32;
        self.pos += 4;
        Ok(v)
    }

    /// Takes the next `n` bytes as a slice.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Current position from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// A bit-level reader for parsing binary data streams.
///
/// Example:
/// ```
/// use demuxio::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    /// Returns true for 1, false for 0.
    ///
    /// Returns error if end of data is reached.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(DemuxError::Parser("reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits and returns them as a number.
    /// The bits are interpreted as big-endian.
    ///
    /// Returns error if n > 32 or end of data is reached.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(DemuxError::Parser("too many bits requested".into()));
        }

        let mut value = 0u32;
        let n = n as usize;

        for i in 0..n {
            let bit = self.read_bit()?;
            if bit {
                value |= 1 << (n - 1 - i);
            }
        }

        Ok(value)
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() - self.byte_offset) * 8 - self.bit_offset as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_cursor_reads() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE];
        let mut cur = ByteCursor::new(&data);

        assert_eq!(cur.read_u8().unwrap(), 0x12);
        assert_eq!(cur.read_u16().unwrap(), 0x3456);
        assert_eq!(cur.read_u24().unwrap(), 0x789ABC);
        assert_eq!(cur.remaining(), 1);
        assert!(cur.read_u16().is_err());
        assert_eq!(cur.read_u8().unwrap(), 0xDE);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn test_cursor_take_and_skip() {
        let data = [1, 2, 3, 4, 5];
        let mut cur = ByteCursor::new(&data);

        cur.skip(1).unwrap();
        assert_eq!(cur.take(3).unwrap(), &[2, 3, 4]);
        assert_eq!(cur.position(), 4);
        assert!(cur.take(2).is_err());
        // A failed read must not advance the cursor.
        assert_eq!(cur.position(), 4);
    }

    #[test]
    fn test_read_bits() {
        // Simple pattern within a byte
        let data = [0b10110011];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(5).unwrap(), 0b10011);

        // Cross-byte boundary
        let data = [0b10110011, 0b01011010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(8).unwrap(), 0b10011010);

        // Edge case - reading zero bits
        let data = [0b10101010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(0).unwrap(), 0);

        // Error on too many bits
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_bits(33).is_err());

        // Cross multiple byte boundaries
        let data = [0b10110011, 0b11001100, 0b10101010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(20).unwrap(), 0b10110011110011001010);
    }

    #[test]
    fn test_error_cases() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        reader.read_bits(8).unwrap();
        assert!(reader.read_bit().is_err());

        let data = [0xFF, 0x00];
        let mut reader = BitReader::new(&data);
        reader.skip_bits(12).unwrap();
        assert_eq!(reader.available_bits(), 4);
    }

    #[quickcheck]
    fn prop_read_bits_matches_manual(data: Vec<u8>, n: u8) -> bool {
        if data.is_empty() || n > 32 {
            return true;
        }

        let mut reader = BitReader::new(&data);
        let n = n % 32;

        match reader.read_bits(n as u32) {
            Ok(result) => {
                let mut expected = 0u32;
                for i in 0..n as usize {
                    let byte_idx = i / 8;
                    let bit_idx = 7 - (i % 8);
                    if byte_idx >= data.len() {
                        return true;
                    }
                    let bit = (data[byte_idx] >> bit_idx) & 1;
                    expected |= (bit as u32) << (n - 1 - i as u8);
                }
                result == expected
            }
            Err(_) => true,
        }
    }

    #[quickcheck]
    fn prop_cursor_u32_matches_bit_reader(data: Vec<u8>) -> bool {
        if data.len() < 4 {
            return true;
        }
        let mut cur = ByteCursor::new(&data);
        let mut bits = BitReader::new(&data);
        cur.read_u32().unwrap() == bits.read_bits(32).unwrap()
    }
}
