//! # Pipeline Collaborators
//!
//! The demultiplexor sits between an injector that hands it raw buffers and the
//! collators that assemble forwarded payload into higher level units. This module
//! defines the handles and traits through which it talks to those collaborators.
//! None of them are owned by the demultiplexor: handles are resolved when a route is
//! added or switched and are never kept alive past removal.

use crate::Result;
use std::fmt;
use std::sync::Arc;

mod buffer;
mod clock;

pub use buffer::*;
pub use clock::*;

/// Opaque reference to a stream owned by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Caller supplied route identifier.
///
/// For transport streams the low 13 bits carry the PID and the upper bits may carry
/// priority selection flags (see `format::ts::types`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub u32);

impl RouteId {
    /// Marks an unused route slot.
    pub const INVALID: RouteId = RouteId(u32::MAX);

    /// Returns whether this identifier refers to a real route.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "0x{:04x}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

/// Identifies a demultiplexor context towards the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

/// Framing formats a demultiplexor can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuxType {
    /// Fixed size 188 byte transport packets, optionally with a 4 byte prefix
    TransportStream,
}

/// Metadata attached to an injected buffer and passed through to collators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    /// Framing of the buffer contents
    pub mux_type: MuxType,
    /// Presentation time supplied by the injector, if any
    pub playback_time: Option<u64>,
    /// Decode time supplied by the injector, if any
    pub decode_time: Option<u64>,
}

impl InputDescriptor {
    /// Creates a descriptor without timing information.
    pub fn new(mux_type: MuxType) -> Self {
        Self {
            mux_type,
            playback_time: None,
            decode_time: None,
        }
    }
}

/// Downstream consumer of forwarded payload fragments.
pub trait Collator: Send + Sync {
    /// Accepts one payload fragment. Failures are reported but never stop the
    /// demultiplexor from serving other routes.
    fn accept(&self, descriptor: &InputDescriptor, payload: &[u8]) -> Result<()>;
}

/// Shared handle to a collator.
pub type CollatorHandle = Arc<dyn Collator>;

/// The owning pipeline, as seen by a demultiplexor.
pub trait Player: Send + Sync {
    /// Looks up the collator currently consuming for `stream`.
    fn resolve_collator(&self, stream: StreamHandle) -> CollatorHandle;

    /// Records that `stream` is now fed by the given demultiplexor context.
    fn attach_demultiplexor(&self, stream: StreamHandle, mux_type: MuxType, context: ContextId);

    /// Records that `stream` is no longer fed by any demultiplexor context.
    fn detach_demultiplexor(&self, stream: StreamHandle);

    /// Signals a short loss of input on `stream`.
    fn input_glitch(&self, stream: StreamHandle);
}

/// A buffer of injected data together with its metadata.
pub trait InputBuffer {
    /// The descriptor attached by the injector.
    fn descriptor(&self) -> Option<&InputDescriptor>;

    /// The raw buffer contents.
    fn data(&self) -> Option<&[u8]>;
}
