//! # MPEG Transport Stream (TS) Demultiplexing
//!
//! This module splits buffers of MPEG transport packets into per-PID payload
//! fragments and hands them to the collators of the streams registered for those
//! PIDs. It covers:
//!
//! - Packet header decoding and adaptation field skipping
//! - Detection of 188 byte packets versus 192 byte M2TS packets
//! - Continuity counter checking with duplicate suppression and rate limited
//!   glitch reports
//! - Optional selection on the transport priority bit
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tsdemux::av::{InjectBuffer, RouteId, StreamHandle};
//! use tsdemux::format::testing::RecordingPlayer;
//! use tsdemux::format::ts::{TsDemultiplexor, TS_PACKET_SIZE};
//! use tsdemux::format::DemultiplexorContext;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let player = Arc::new(RecordingPlayer::new());
//! let demux = TsDemultiplexor::new(player.clone());
//! let context = demux.create_ts_context();
//!
//! context.add_stream(StreamHandle(1), RouteId(0x100))?;
//!
//! let mut packet = vec![0xffu8; TS_PACKET_SIZE];
//! packet[..4].copy_from_slice(&[0x47, 0x01, 0x00, 0x10]); // PID 0x100, payload, CC 0
//! context.demux(&InjectBuffer::new(packet))?;
//!
//! assert_eq!(player.collator(StreamHandle(1)).count(), 1);
//! # Ok(())
//! # }
//! ```

/// Continuity counter tracking
pub mod continuity;

/// Transport stream contexts and the packet loop
pub mod demuxer;

/// Plain versus prefixed packet detection
pub mod layout;

/// Packet header and adaptation field decoding
pub mod parser;

/// Core TS types and constants
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types and constants
pub use continuity::{Continuity, ContinuityTracker};
pub use demuxer::{TsDemultiplexor, TsDemuxContext, TsRoute};
pub use layout::PacketLayout;
pub use types::{
    TSHeader, M2TS_PREFIX_SIZE, MAX_PIDS, PRIORITY_HIGH, PRIORITY_LOW, SELECT_ON_PRIORITY,
    TS_HEADER_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE,
};
