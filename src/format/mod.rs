use crate::av::{InputBuffer, MuxType, RouteId, StreamHandle};
use crate::error::{DemuxError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Format independent route slots
pub mod routes;

/// Recording test doubles
pub mod testing;

/// MPEG transport stream demultiplexing
pub mod ts;

/// Common trait for format demultiplexors
pub trait Demultiplexor: Send + Sync {
    /// The framing this demultiplexor understands
    fn handled_mux_type(&self) -> MuxType;

    /// Create an empty context with no routes
    fn create_context(&self) -> Box<dyn DemultiplexorContext>;
}

/// One demultiplexing context: a route table plus the state needed to split one
/// input into its routes.
///
/// Route operations and `demux` may be called from different threads; they are
/// mutually exclusive.
pub trait DemultiplexorContext: Send + Sync {
    /// Route packets carrying `id` to `stream`
    fn add_stream(&self, stream: StreamHandle, id: RouteId) -> Result<()>;

    /// Stop routing `id`
    fn remove_stream(&self, id: RouteId) -> Result<()>;

    /// Pick up a new collator for `stream`
    fn switch_stream(&self, stream: StreamHandle) -> Result<()>;

    /// Expect a discontinuity in the input, e.g. after a seek
    fn input_jump(&self);

    /// Split one buffer into its routes
    fn demux(&self, buffer: &dyn InputBuffer) -> Result<()>;

    /// Counters accumulated since the context was created
    fn statistics(&self) -> DemuxStatistics;
}

/// Per-context counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStatistics {
    /// Packets inspected
    pub packets: u64,
    /// Payload fragments accepted by a collator
    pub forwarded: u64,
    /// Packets skipped for a bad sync byte or transport error
    pub invalid: u64,
    /// Packets on PIDs without a route
    pub unmapped: u64,
    /// Repeated packets dropped
    pub duplicates: u64,
    /// Continuity breaks seen, reported or not
    pub discontinuities: u64,
    /// Glitches signalled to the player
    pub glitches_reported: u64,
    /// Fragments a collator refused
    pub collator_failures: u64,
}

/// Demultiplexors known to a pipeline, keyed by the framing they handle.
#[derive(Default)]
pub struct DemuxRegistry {
    demultiplexors: RwLock<HashMap<MuxType, Arc<dyn Demultiplexor>>>,
}

impl DemuxRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `demultiplexor`, replacing any previous one for the same mux type.
    pub fn register(&self, demultiplexor: Arc<dyn Demultiplexor>) {
        let mux_type = demultiplexor.handled_mux_type();
        if self
            .demultiplexors
            .write()
            .insert(mux_type, demultiplexor)
            .is_some()
        {
            log::debug!("replaced demultiplexor for {:?}", mux_type);
        }
    }

    /// The demultiplexor handling `mux_type`.
    pub fn find(&self, mux_type: MuxType) -> Result<Arc<dyn Demultiplexor>> {
        self.demultiplexors
            .read()
            .get(&mux_type)
            .cloned()
            .ok_or(DemuxError::UnsupportedMuxType(mux_type))
    }

    /// Creates a context on the demultiplexor handling `mux_type`.
    pub fn create_context(&self, mux_type: MuxType) -> Result<Box<dyn DemultiplexorContext>> {
        Ok(self.find(mux_type)?.create_context())
    }
}

pub use self::routes::{RouteSlot, RouteTable, MAX_ROUTES};
pub use self::ts::{TsDemultiplexor, TsDemuxContext};
