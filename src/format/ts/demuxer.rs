use super::continuity::{Continuity, ContinuityTracker};
use super::layout::{LayoutClassifier, PacketLayout};
use super::parser::{parse_adaptation_field, parse_packet_header, payload_offset};
use super::types::*;
use crate::av::{
    Clock, ContextId, InputBuffer, MuxType, Player, RouteId, StreamHandle, SystemClock,
};
use crate::config::{self, DemuxConfig};
use crate::error::{DemuxError, Result};
use crate::format::routes::RouteTable;
use crate::format::{Demultiplexor, DemultiplexorContext, DemuxStatistics};
use log::{debug, trace, warn};
use parking_lot::lock_api::{Mutex, RawMutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Transport stream state carried by each route slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsRoute {
    /// Continuity state of the route's PID
    pub continuity: ContinuityTracker,
    /// Priority filter taken from the route identifier
    pub priority: PrioritySelection,
}

/// Everything a context guards with its lock.
struct TsState {
    routes: RouteTable<TsRoute>,
    /// PID -> slot index + 1, 0 when unmapped
    pid_table: Box<[u8]>,
    layout: LayoutClassifier,
    stats: DemuxStatistics,
}

impl TsState {
    fn new(id: ContextId, config: &DemuxConfig) -> Self {
        Self {
            routes: RouteTable::new(id, MuxType::TransportStream),
            pid_table: vec![0u8; MAX_PIDS].into_boxed_slice(),
            layout: LayoutClassifier::new(config.classify_sample_packets),
            stats: DemuxStatistics::default(),
        }
    }

    fn slot_for_pid(&self, pid: u16) -> Option<usize> {
        match self.pid_table[pid as usize & (MAX_PIDS - 1)] {
            0 => None,
            entry => Some(entry as usize - 1),
        }
    }
}

/// MPEG transport stream demultiplexor.
///
/// Creates contexts that split buffers of fixed size transport packets by PID and
/// forward the payload of each packet to the collator of the stream registered
/// for that PID. The pipeline is passed in explicitly and shared by every context.
pub struct TsDemultiplexor {
    player: Arc<dyn Player>,
    clock: Arc<dyn Clock>,
    config: DemuxConfig,
}

impl TsDemultiplexor {
    /// Creates a demultiplexor using the process-wide default configuration.
    pub fn new(player: Arc<dyn Player>) -> Self {
        Self::with_config(player, config::current())
    }

    /// Creates a demultiplexor with an explicit configuration.
    pub fn with_config(player: Arc<dyn Player>, config: DemuxConfig) -> Self {
        Self {
            player,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the time source used for glitch rate limiting.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration handed to new contexts.
    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    /// Creates a context guarded by the default `parking_lot` mutex.
    pub fn create_ts_context(&self) -> TsDemuxContext {
        self.create_context_with()
    }

    /// Creates a context guarded by the raw mutex `R`.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use tsdemux::format::testing::RecordingPlayer;
    /// use tsdemux::format::TsDemultiplexor;
    ///
    /// let demux = TsDemultiplexor::new(Arc::new(RecordingPlayer::new()));
    /// let fair = demux.create_context_with::<parking_lot::RawFairMutex>();
    /// assert_eq!(fair.route_count(), 0);
    /// ```
    pub fn create_context_with<R: RawMutex>(&self) -> TsDemuxContext<R> {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        debug!("creating transport stream context {:?}", id);
        TsDemuxContext {
            id,
            player: self.player.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            state: Mutex::new(TsState::new(id, &self.config)),
        }
    }
}

impl Demultiplexor for TsDemultiplexor {
    fn handled_mux_type(&self) -> MuxType {
        MuxType::TransportStream
    }

    fn create_context(&self) -> Box<dyn DemultiplexorContext> {
        Box::new(self.create_ts_context())
    }
}

/// One transport stream demultiplexing context.
///
/// All mutable state sits behind a single lock which `demux` holds for the whole
/// buffer, so route changes from other threads wait for the buffer in flight to
/// finish and never see it half processed. The lock type is a parameter: any
/// `lock_api::RawMutex` can be plugged in without touching the packet loop.
///
/// Dropping the context detaches every stream it still feeds.
pub struct TsDemuxContext<R: RawMutex = parking_lot::RawMutex> {
    id: ContextId,
    player: Arc<dyn Player>,
    clock: Arc<dyn Clock>,
    config: DemuxConfig,
    state: Mutex<R, TsState>,
}

impl<R: RawMutex> TsDemuxContext<R> {
    /// Identifier passed to the player on attach.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Number of live routes.
    pub fn route_count(&self) -> usize {
        self.state.lock().routes.live().count()
    }

    /// The layout chosen for the most recent buffer.
    pub fn layout(&self) -> PacketLayout {
        self.state.lock().layout.layout()
    }

    /// The continuity counter expected next on route `id`, if it is live and
    /// tracking.
    pub fn expected_continuity(&self, id: RouteId) -> Option<u8> {
        let state = self.state.lock();
        let (_, slot) = state.routes.live().find(|(_, slot)| slot.id == id)?;
        slot.ext.continuity.expected()
    }

    /// The slot currently receiving packets for `pid`.
    pub fn slot_for_pid(&self, pid: u16) -> Option<usize> {
        self.state.lock().slot_for_pid(pid)
    }

    fn demux_locked(
        &self,
        state: &mut TsState,
        descriptor: &crate::av::InputDescriptor,
        data: &[u8],
    ) -> Result<()> {
        let layout = state.layout.resolve(data).map_err(|e| {
            warn!("context {:?}: {}", self.id, e);
            e
        })?;

        let mut invalid = 0u64;
        let mut glitches = 0u64;

        for (index, chunk) in data.chunks_exact(layout.stride()).enumerate() {
            let packet = &chunk[layout.prefix..];
            state.stats.packets += 1;

            let header = match parse_packet_header(packet) {
                Some(header) if header.is_valid() => header,
                _ => {
                    invalid += 1;
                    trace!(
                        "invalid packet header at offset {}",
                        index * layout.stride() + layout.prefix
                    );
                    continue;
                }
            };

            let Some(slot_index) = state.slot_for_pid(header.pid) else {
                state.stats.unmapped += 1;
                continue;
            };

            let adaptation = if header.adaptation_field_exists {
                parse_adaptation_field(packet)
            } else {
                None
            };
            let discontinuity_indicator = adaptation.map_or(false, |field| field.discontinuity);
            let offset = payload_offset(adaptation.as_ref());

            let slot = state.routes.slot_mut(slot_index);
            match slot
                .ext
                .continuity
                .check(header.continuity_counter, discontinuity_indicator)
            {
                Continuity::InSequence => {}
                Continuity::Duplicate => {
                    trace!("pid 0x{:04x}: repeated packet dropped", header.pid);
                    state.stats.duplicates += 1;
                    continue;
                }
                Continuity::Discontinuity => {
                    state.stats.discontinuities += 1;
                    if slot
                        .ext
                        .continuity
                        .should_report(self.clock.now(), self.config.glitch_report_interval)
                    {
                        if let Some(stream) = slot.stream {
                            self.player.input_glitch(stream);
                            state.stats.glitches_reported += 1;
                            glitches += 1;
                        }
                    }
                }
            }

            if !slot.ext.priority.admits(header.transport_priority) {
                continue;
            }

            if header.contains_payload && offset < TS_PACKET_SIZE {
                if let Some(collator) = &slot.collator {
                    // Other routes may still want their data
                    match collator.accept(descriptor, &packet[offset..]) {
                        Ok(()) => state.stats.forwarded += 1,
                        Err(e) => {
                            debug!("pid 0x{:04x}: {}", header.pid, e);
                            state.stats.collator_failures += 1;
                        }
                    }
                }
            }
        }

        state.stats.invalid += invalid;
        if invalid > 0 {
            warn!(
                "context {:?}: skipped {} packets with invalid headers",
                self.id, invalid
            );
        }
        if glitches > 0 {
            warn!(
                "context {:?}: reported {} continuity glitches",
                self.id, glitches
            );
        }

        Ok(())
    }
}

impl<R: RawMutex + Send + Sync> DemultiplexorContext for TsDemuxContext<R> {
    fn add_stream(&self, stream: StreamHandle, id: RouteId) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let index = state
            .routes
            .add(self.player.as_ref(), stream, id)
            .map_err(|e| {
                warn!("context {:?}: cannot add route {}: {}", self.id, id, e);
                e
            })?;

        state.routes.slot_mut(index).ext = TsRoute {
            continuity: ContinuityTracker::new(),
            priority: PrioritySelection::from_route_bits(id.0),
        };
        state.pid_table[pid_index(id.0)] = (index + 1) as u8;
        state.layout.invalidate();

        debug!(
            "context {:?}: route {} -> {:?} in slot {}",
            self.id, id, stream, index
        );
        Ok(())
    }

    fn remove_stream(&self, id: RouteId) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.routes.remove(self.player.as_ref(), id) == 0 {
            debug!("context {:?}: no route {} to remove", self.id, id);
            return Ok(());
        }

        // Only an entry naming a freed slot changes. Another route may share the
        // PID under different priority bits and takes over.
        let pid = pid_index(id.0);
        if let Some(index) = state.slot_for_pid(pid as u16) {
            if state.routes.slot(index).is_free() {
                let successor = state
                    .routes
                    .live()
                    .find(|(_, slot)| pid_index(slot.id.0) == pid)
                    .map_or(0, |(index, _)| (index + 1) as u8);
                state.pid_table[pid] = successor;
            }
        }

        debug!("context {:?}: removed route {}", self.id, id);
        Ok(())
    }

    fn switch_stream(&self, stream: StreamHandle) -> Result<()> {
        let switched = self
            .state
            .lock()
            .routes
            .switch(self.player.as_ref(), stream);
        debug!(
            "context {:?}: switched {} routes of {:?}",
            self.id, switched, stream
        );
        Ok(())
    }

    fn input_jump(&self) {
        let mut state = self.state.lock();
        for slot in state.routes.slots_mut() {
            slot.ext.continuity.reset();
        }
        debug!("context {:?}: expecting discontinuity", self.id);
    }

    fn demux(&self, buffer: &dyn InputBuffer) -> Result<()> {
        let descriptor = buffer
            .descriptor()
            .ok_or(DemuxError::MetadataUnavailable)?;
        let data = buffer.data().ok_or(DemuxError::DataUnavailable)?;

        let mut guard = self.state.lock();
        self.demux_locked(&mut guard, descriptor, data)
    }

    fn statistics(&self) -> DemuxStatistics {
        self.state.lock().stats
    }
}

impl<R: RawMutex> Drop for TsDemuxContext<R> {
    fn drop(&mut self) {
        let player = self.player.clone();
        self.state.get_mut().routes.clear(player.as_ref());
        debug!("destroyed transport stream context {:?}", self.id);
    }
}
