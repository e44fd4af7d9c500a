use crate::error::{DemuxError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Rewrites the length fields of a length-prefixed NALU stream from one
/// field width to another.
///
/// The source width comes from the codec-private configuration (byte 4 of
/// an avcC/hvcC blob); the destination width is operator-requested. Both
/// are fixed at construction.
#[derive(Debug, Clone)]
pub struct NaluSizeRewriter {
    src_len: usize,
    dst_len: usize,
    /// Largest NALU size representable at the destination width.
    max_size: u64,
}

impl NaluSizeRewriter {
    pub fn new(src_len: usize, dst_len: usize) -> Result<Self> {
        if !(1..=4).contains(&src_len) || !(1..=4).contains(&dst_len) {
            return Err(DemuxError::Config(format!(
                "NALU size lengths must be between 1 and 4 (got {} and {})",
                src_len, dst_len
            )));
        }
        Ok(Self {
            src_len,
            dst_len,
            max_size: (1u64 << (8 * dst_len)) - 1,
        })
    }

    pub fn source_length(&self) -> usize {
        self.src_len
    }

    pub fn destination_length(&self) -> usize {
        self.dst_len
    }

    /// Rewrites every size field in `data` to the destination width.
    ///
    /// A trailing size field claiming more bytes than remain is clamped to
    /// the available length. A NALU too large for the destination width is
    /// a configuration error and leaves no partial output behind.
    pub fn rewrite(&self, data: &Bytes) -> Result<Bytes> {
        if self.src_len == self.dst_len || data.is_empty() {
            return Ok(data.clone());
        }

        // First pass: collect all NALU sizes so the output buffer can be
        // allocated in one step.
        let mut sizes: Vec<usize> = Vec::new();
        let mut src_pos = 0;
        while data.len() - src_pos >= self.src_len {
            let mut nalu_size = 0usize;
            for &b in &data[src_pos..src_pos + self.src_len] {
                nalu_size = (nalu_size << 8) | b as usize;
            }

            let available = data.len() - src_pos - self.src_len;
            if nalu_size > available {
                nalu_size = available;
            }

            if nalu_size as u64 > self.max_size {
                return Err(DemuxError::Config(format!(
                    "the chosen NALU size length of {} is too small for a NALU of {} bytes; try using 4",
                    self.dst_len, nalu_size
                )));
            }

            src_pos += self.src_len + nalu_size;
            sizes.push(nalu_size);
        }

        let payload: usize = sizes.iter().sum();
        let mut out = BytesMut::with_capacity(payload + sizes.len() * self.dst_len);

        let mut src_pos = 0;
        for &nalu_size in &sizes {
            for shift in (0..self.dst_len).rev() {
                out.put_u8((nalu_size >> (8 * shift)) as u8);
            }
            out.extend_from_slice(&data[src_pos + self.src_len..src_pos + self.src_len + nalu_size]);
            src_pos += self.src_len + nalu_size;
        }

        Ok(out.freeze())
    }
}
