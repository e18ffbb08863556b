use crate::av::{MuxType, RouteId};
use thiserror::Error;

/// Errors reported by demultiplexors and their route tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DemuxError {
    /// Every route slot of the context is taken
    #[error("too many routes: all {capacity} route slots are in use")]
    TooManyRoutes {
        /// Route slots per context
        capacity: usize,
    },

    /// The identifier is already routed to a stream
    #[error("route {0} is already bound to a stream")]
    RouteInUse(RouteId),

    /// The buffer is not a whole number of packets
    #[error("framing error: buffer length {length} is not a multiple of packet stride {stride}")]
    Framing {
        /// Buffer length in bytes
        length: usize,
        /// Packet stride the buffer was classified with
        stride: usize,
    },

    /// The buffer carries no input descriptor
    #[error("input descriptor unavailable")]
    MetadataUnavailable,

    /// The buffer contents could not be read
    #[error("input data unavailable")]
    DataUnavailable,

    /// A collator refused a payload fragment
    #[error("collator error: {0}")]
    Collator(String),

    /// No demultiplexor is registered for the mux type
    #[error("no demultiplexor registered for {0:?}")]
    UnsupportedMuxType(MuxType),
}

/// Result type for demultiplexing operations.
pub type Result<T> = std::result::Result<T, DemuxError>;
