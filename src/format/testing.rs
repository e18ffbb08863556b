//! Recording collaborators for exercising demultiplexors without a pipeline.

use crate::av::{Collator, CollatorHandle, ContextId, InputDescriptor, MuxType, Player, StreamHandle};
use crate::error::{DemuxError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A collator that keeps every fragment it is handed.
#[derive(Debug, Default)]
pub struct RecordingCollator {
    received: Mutex<Vec<(InputDescriptor, Bytes)>>,
    failing: AtomicBool,
}

impl RecordingCollator {
    /// Creates a collator that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `accept` calls fail after recording the fragment.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Payload fragments received, in order.
    pub fn fragments(&self) -> Vec<Bytes> {
        self.received
            .lock()
            .iter()
            .map(|(_, fragment)| fragment.clone())
            .collect()
    }

    /// Descriptors that came with each fragment.
    pub fn descriptors(&self) -> Vec<InputDescriptor> {
        self.received
            .lock()
            .iter()
            .map(|(descriptor, _)| descriptor.clone())
            .collect()
    }

    /// Number of fragments received.
    pub fn count(&self) -> usize {
        self.received.lock().len()
    }
}

impl Collator for RecordingCollator {
    fn accept(&self, descriptor: &InputDescriptor, payload: &[u8]) -> Result<()> {
        self.received
            .lock()
            .push((descriptor.clone(), Bytes::copy_from_slice(payload)));
        if self.failing.load(Ordering::SeqCst) {
            return Err(DemuxError::Collator("collator refused fragment".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PlayerLog {
    collators: HashMap<StreamHandle, Arc<RecordingCollator>>,
    resolutions: HashMap<StreamHandle, usize>,
    attachments: Vec<StreamHandle>,
    detachments: Vec<StreamHandle>,
    glitches: Vec<StreamHandle>,
}

/// A player that hands out one [`RecordingCollator`] per stream and records every
/// call it receives.
#[derive(Debug, Default)]
pub struct RecordingPlayer {
    log: Mutex<PlayerLog>,
}

impl RecordingPlayer {
    /// Creates a player with no streams.
    pub fn new() -> Self {
        Self::default()
    }

    /// The collator for `stream`, created on first use.
    pub fn collator(&self, stream: StreamHandle) -> Arc<RecordingCollator> {
        self.log
            .lock()
            .collators
            .entry(stream)
            .or_insert_with(|| Arc::new(RecordingCollator::new()))
            .clone()
    }

    /// Installs a fresh collator for `stream`, as when its consumer changes.
    pub fn replace_collator(&self, stream: StreamHandle) -> Arc<RecordingCollator> {
        let collator = Arc::new(RecordingCollator::new());
        self.log.lock().collators.insert(stream, collator.clone());
        collator
    }

    /// How often the collator for `stream` was resolved.
    pub fn resolutions(&self, stream: StreamHandle) -> usize {
        self.log.lock().resolutions.get(&stream).copied().unwrap_or(0)
    }

    /// Streams attached, in call order.
    pub fn attachments(&self) -> Vec<StreamHandle> {
        self.log.lock().attachments.clone()
    }

    /// Streams detached, in call order.
    pub fn detachments(&self) -> Vec<StreamHandle> {
        self.log.lock().detachments.clone()
    }

    /// Streams a glitch was signalled on, in call order.
    pub fn glitches(&self) -> Vec<StreamHandle> {
        self.log.lock().glitches.clone()
    }
}

impl Player for RecordingPlayer {
    fn resolve_collator(&self, stream: StreamHandle) -> CollatorHandle {
        *self.log.lock().resolutions.entry(stream).or_insert(0) += 1;
        self.collator(stream)
    }

    fn attach_demultiplexor(&self, stream: StreamHandle, _mux_type: MuxType, _context: ContextId) {
        self.log.lock().attachments.push(stream);
    }

    fn detach_demultiplexor(&self, stream: StreamHandle) {
        self.log.lock().detachments.push(stream);
    }

    fn input_glitch(&self, stream: StreamHandle) {
        self.log.lock().glitches.push(stream);
    }
}
