//! Route slot bookkeeping shared by every framing format.
//!
//! A [`RouteTable`] owns a fixed number of slots. Each live slot binds a route
//! identifier to a pipeline stream and caches the collator resolved for it. Formats
//! carry their own per-route state in the slot extension `X`.

use crate::av::{CollatorHandle, ContextId, MuxType, Player, RouteId, StreamHandle};
use crate::error::{DemuxError, Result};

/// Route slots per context.
pub const MAX_ROUTES: usize = 4;

/// One route slot. The slot is free iff `stream` is `None`.
#[derive(Clone)]
pub struct RouteSlot<X> {
    /// Stream fed by this slot
    pub stream: Option<StreamHandle>,
    /// Route identifier, `RouteId::INVALID` when free
    pub id: RouteId,
    /// Collator resolved for `stream` on add or switch
    pub collator: Option<CollatorHandle>,
    /// Format specific route state
    pub ext: X,
}

impl<X: Default> RouteSlot<X> {
    fn empty() -> Self {
        Self {
            stream: None,
            id: RouteId::INVALID,
            collator: None,
            ext: X::default(),
        }
    }
}

impl<X> RouteSlot<X> {
    /// Returns true if no stream is bound to the slot.
    pub fn is_free(&self) -> bool {
        self.stream.is_none()
    }
}

impl<X: std::fmt::Debug> std::fmt::Debug for RouteSlot<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSlot")
            .field("stream", &self.stream)
            .field("id", &self.id)
            .field("has_collator", &self.collator.is_some())
            .field("ext", &self.ext)
            .finish()
    }
}

/// Fixed capacity table of route slots for one demultiplexor context.
#[derive(Debug)]
pub struct RouteTable<X> {
    slots: [RouteSlot<X>; MAX_ROUTES],
    last_added: Option<usize>,
    context: ContextId,
    mux_type: MuxType,
}

impl<X: Default> RouteTable<X> {
    /// Creates a table of free slots owned by `context`.
    pub fn new(context: ContextId, mux_type: MuxType) -> Self {
        Self {
            slots: std::array::from_fn(|_| RouteSlot::empty()),
            last_added: None,
            context,
            mux_type,
        }
    }

    /// Binds `id` to `stream` in the first free slot and returns the slot index.
    ///
    /// Nothing is mutated when the table is full or `id` is already live.
    pub fn add(&mut self, player: &dyn Player, stream: StreamHandle, id: RouteId) -> Result<usize> {
        if self.slots.iter().any(|slot| !slot.is_free() && slot.id == id) {
            return Err(DemuxError::RouteInUse(id));
        }

        let index = self
            .slots
            .iter()
            .position(RouteSlot::is_free)
            .ok_or(DemuxError::TooManyRoutes {
                capacity: MAX_ROUTES,
            })?;

        let slot = &mut self.slots[index];
        slot.stream = Some(stream);
        slot.id = id;
        slot.collator = Some(player.resolve_collator(stream));
        slot.ext = X::default();
        self.last_added = Some(index);

        player.attach_demultiplexor(stream, self.mux_type, self.context);
        Ok(index)
    }

    /// Frees every slot bound to `id` and returns how many were freed.
    ///
    /// A stream is only detached once no other slot still feeds it.
    pub fn remove(&mut self, player: &dyn Player, id: RouteId) -> usize {
        let mut removed = 0;

        for index in 0..MAX_ROUTES {
            if self.slots[index].is_free() || self.slots[index].id != id {
                continue;
            }

            let stream = self.slots[index].stream;
            self.slots[index] = RouteSlot::empty();
            if self.last_added == Some(index) {
                self.last_added = None;
            }
            removed += 1;

            if let Some(stream) = stream {
                if !self.feeds(stream) {
                    player.detach_demultiplexor(stream);
                }
            }
        }

        removed
    }

    /// Re-resolves the collator of every slot bound to `stream`.
    pub fn switch(&mut self, player: &dyn Player, stream: StreamHandle) -> usize {
        let mut switched = 0;
        for slot in self.slots.iter_mut() {
            if slot.stream == Some(stream) {
                slot.collator = Some(player.resolve_collator(stream));
                switched += 1;
            }
        }
        switched
    }

    /// Frees every slot, detaching each distinct stream once.
    pub fn clear(&mut self, player: &dyn Player) {
        for index in 0..MAX_ROUTES {
            if let Some(stream) = self.slots[index].stream.take() {
                self.slots[index] = RouteSlot::empty();
                if !self.feeds(stream) {
                    player.detach_demultiplexor(stream);
                }
            }
        }
        self.last_added = None;
    }
}

impl<X> RouteTable<X> {
    /// Returns whether any live slot is bound to `stream`.
    pub fn feeds(&self, stream: StreamHandle) -> bool {
        self.slots.iter().any(|slot| slot.stream == Some(stream))
    }

    /// Slot at `index`. Panics past `MAX_ROUTES`.
    pub fn slot(&self, index: usize) -> &RouteSlot<X> {
        &self.slots[index]
    }

    /// Mutable slot at `index`. Panics past `MAX_ROUTES`.
    pub fn slot_mut(&mut self, index: usize) -> &mut RouteSlot<X> {
        &mut self.slots[index]
    }

    /// Every slot, free or live.
    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut RouteSlot<X>> {
        self.slots.iter_mut()
    }

    /// Indices and slots of every live route.
    pub fn live(&self) -> impl Iterator<Item = (usize, &RouteSlot<X>)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_free())
    }

    /// Slot filled by the most recent successful add, unless since freed.
    pub fn last_added(&self) -> Option<usize> {
        self.last_added
    }
}
