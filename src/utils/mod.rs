/// Bounds-checked byte and bit level readers
pub mod bits;
/// CRC32 calculation for PSI tables and OGG pages
pub mod crc;

pub use bits::{BitReader, ByteCursor};
pub use crc::Crc32;
