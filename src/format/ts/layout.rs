//! Packet layout detection.
//!
//! Transport packets arrive either bare (188 byte stride) or with the 4 byte prefix
//! that M2TS recording containers put in front of every packet (192 byte stride).
//! Nothing out of band says which, so the layout is guessed from the buffer length
//! and, when the length fits both, from where the sync bytes sit.

use super::types::*;
use crate::error::{DemuxError, Result};

/// Physical packet layout of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLayout {
    /// Bytes in front of each packet's header
    pub prefix: usize,
}

impl PacketLayout {
    /// Bare 188 byte packets
    pub const PLAIN: PacketLayout = PacketLayout { prefix: 0 };
    /// 192 byte packets with a 4 byte prefix
    pub const M2TS: PacketLayout = PacketLayout {
        prefix: M2TS_PREFIX_SIZE,
    };

    /// Distance between the starts of consecutive packets.
    pub fn stride(&self) -> usize {
        TS_PACKET_SIZE + self.prefix
    }

    /// Whether `length` is a whole number of packets.
    pub fn fits(&self, length: usize) -> bool {
        length % self.stride() == 0
    }
}

impl Default for PacketLayout {
    fn default() -> Self {
        Self::PLAIN
    }
}

/// Checks that the first `samples` packets at `stride` start with a sync byte.
fn sync_aligned(data: &[u8], stride: usize, offset: usize, samples: usize) -> bool {
    let packets = (data.len() / stride).min(samples);
    (0..packets).all(|i| data.get(i * stride + offset) == Some(&TS_SYNC_BYTE))
}

/// Guesses the layout of `data`, inspecting at most `samples` packets.
///
/// Lengths that fit both layouts default to plain packets unless the sync bytes
/// only line up with the prefixed layout.
pub fn classify(data: &[u8], samples: usize) -> PacketLayout {
    let length = data.len();

    if !PacketLayout::M2TS.fits(length) {
        return PacketLayout::PLAIN;
    }
    if !PacketLayout::PLAIN.fits(length) {
        return PacketLayout::M2TS;
    }

    if !sync_aligned(data, TS_PACKET_SIZE, 0, samples)
        && sync_aligned(
            data,
            PacketLayout::M2TS.stride(),
            M2TS_PREFIX_SIZE,
            samples,
        )
    {
        return PacketLayout::M2TS;
    }

    PacketLayout::PLAIN
}

/// Remembers the current layout and decides when it must be guessed again.
#[derive(Debug, Clone)]
pub struct LayoutClassifier {
    layout: PacketLayout,
    dirty: bool,
    samples: usize,
}

impl LayoutClassifier {
    /// Creates a dirty classifier sampling at most `samples` packets.
    pub fn new(samples: usize) -> Self {
        Self {
            layout: PacketLayout::PLAIN,
            dirty: true,
            samples,
        }
    }

    /// Forces the next buffer to be classified, e.g. after a route was added.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Returns true if the next buffer will be classified afresh.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The layout in use.
    pub fn layout(&self) -> PacketLayout {
        self.layout
    }

    /// Returns the layout to demultiplex `data` with, reclassifying first when
    /// the classifier is dirty or the current stride does not divide the buffer.
    pub fn resolve(&mut self, data: &[u8]) -> Result<PacketLayout> {
        if self.dirty || !self.layout.fits(data.len()) {
            let layout = classify(data, self.samples);
            if layout != self.layout {
                log::debug!(
                    "packet layout changed: stride {} -> {}",
                    self.layout.stride(),
                    layout.stride()
                );
            }
            self.layout = layout;
            self.dirty = false;
        }

        if !self.layout.fits(data.len()) {
            return Err(DemuxError::Framing {
                length: data.len(),
                stride: self.layout.stride(),
            });
        }

        Ok(self.layout)
    }
}
