#![doc(html_root_url = "https://docs.rs/tsdemux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsdemux - Transport Stream Demultiplexing
//!
//! `tsdemux` is the input stage of a media pipeline. It takes buffers of MPEG
//! transport packets that are already in memory, works out how they are framed,
//! checks each packet's continuity counter and forwards the payload of every
//! packet whose PID has been registered to the collator of the matching stream.
//!
//! ## Features
//!
//! - Up to four routes per context, with several PIDs allowed to feed one stream
//! - Automatic detection of 188 byte and 192 byte (M2TS) packets
//! - Duplicate packet suppression and rate limited glitch reporting
//! - Selection on the transport priority bit
//! - Route changes from other threads, serialised against demultiplexing
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tsdemux = "0.1.0"
//! ```
//!
//! ### Feeding a Context
//!
//! ```rust
//! use std::sync::Arc;
//! use tsdemux::av::{InjectBuffer, RouteId, StreamHandle};
//! use tsdemux::format::testing::RecordingPlayer;
//! use tsdemux::format::{DemultiplexorContext, DemuxRegistry, TsDemultiplexor};
//! use tsdemux::av::MuxType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let player = Arc::new(RecordingPlayer::new());
//! let registry = DemuxRegistry::new();
//! registry.register(Arc::new(TsDemultiplexor::new(player.clone())));
//!
//! let context = registry.create_context(MuxType::TransportStream)?;
//! context.add_stream(StreamHandle(7), RouteId(0x44))?;
//!
//! // Buffers are usually many packets long; an empty one is valid too
//! context.demux(&InjectBuffer::new(Vec::<u8>::new()))?;
//! assert_eq!(context.statistics().packets, 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: Handles and traits for the pipeline around the demultiplexor
//!   - Streams, route identifiers and input descriptors
//!   - Player, collator and input buffer interfaces
//!   - Clocks for glitch rate limiting
//!
//! - `format`: Demultiplexor implementations
//!   - Format independent route table
//!   - Transport stream demultiplexor
//!   - Registry keyed by mux type
//!
//! - `error`: Error handling types and utilities
//!
//! - `config`: Defaults for glitch reporting and layout detection
//!
/// Pipeline handles and collaborator traits
pub mod av;

/// Error types and utilities
pub mod error;

/// Demultiplexor implementations
pub mod format;

/// Configuration module
pub mod config;

pub use error::{DemuxError, Result};
