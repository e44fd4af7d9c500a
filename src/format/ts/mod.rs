//! MPEG transport stream (ISO/IEC 13818-1) input.
//!
//! Handles the 188/192/204-byte packet variants, PAT/PMT program
//! discovery with CRC validation, per-PID reassembly of sections and PES
//! packets, and continuity-counter enforcement.

mod parser;
mod reader;
mod types;

pub use parser::TsPacketParser;
pub use reader::{detect_packet_size, TsReader};
pub use types::*;
