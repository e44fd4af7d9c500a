#![deny(rustdoc::missing_crate_level_docs)]

//! # demuxio - media stream demultiplexing engine
//!
//! `demuxio` turns multiplexed container input into per-track streams of
//! muxer-ready packets. It reads MPEG transport streams (with automatic
//! 188/192/204-byte packet-size detection and PAT/PMT program discovery),
//! OGG/OGM files and raw ADTS AAC, reassembles elementary-stream units
//! across container boundaries and normalizes them through per-track
//! packetizers before handing them to an output muxer.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use demuxio::config::DemuxOptions;
//! use demuxio::format::{tests::TestMuxer, MediaReader, Reader};
//! use demuxio::sched::Scheduler;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = tokio::fs::File::open("input.ts").await?;
//!     let size = file.metadata().await?.len();
//!
//!     // Probe the format and enumerate tracks.
//!     let reader = MediaReader::open(file, size, DemuxOptions::default()).await?;
//!     for track in reader.identify() {
//!         println!("track {}: {}", track.id, track.description);
//!     }
//!
//!     // Pump everything into a muxer.
//!     let mut scheduler = Scheduler::new(TestMuxer::new());
//!     scheduler.add_reader(Box::new(reader));
//!     let muxer = scheduler.run().await?;
//!     println!("demuxed {} packets", muxer.packets.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module overview
//!
//! - `av`: track, packet and muxer abstractions shared by all formats
//! - `codec`: bitstream-level codec helpers (ADTS header parsing)
//! - `format`: container readers (TS, OGG/OGM, ADTS AAC) and the probe
//!   chain that picks one
//! - `packetizer`: per-track normalization, including NALU size-field
//!   rewriting and ADTS re-framing
//! - `sched`: the round-robin scheduler feeding an output muxer
//! - `utils`: bit/byte readers and the two CRC-32 variants
//!
//! Recoverable input corruption (CRC failures, continuity gaps, garbage
//! between frames) is logged through the `log` facade and skipped; only
//! I/O failures and invalid configuration surface as errors.

/// Audio/video base types: tracks, packets, the muxer trait
pub mod av;

/// Codec bitstream helpers
pub mod codec;

/// Demultiplexing options
pub mod config;

/// Error types and utilities
pub mod error;

/// Container format readers and the probe chain
pub mod format;

/// Per-track packet normalization
pub mod packetizer;

/// Output scheduling across readers
pub mod sched;

/// Bit readers and CRC calculations
pub mod utils;

pub use error::{DemuxError, Result};
