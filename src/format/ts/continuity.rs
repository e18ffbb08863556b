//! Continuity counter tracking.
//!
//! Every packet on a PID carries a 4 bit counter that advances by one per packet.
//! A counter one behind the expected value is a repeat of the previous packet and
//! is dropped silently; any other mismatch is a loss. Losses are reported to the
//! pipeline at most once per route per report interval.

use super::types::CONTINUITY_MODULUS;
use std::time::{Duration, Instant};

/// What to do with a packet after checking its continuity counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// In sequence, or nothing to compare against yet
    InSequence,
    /// Repeat of the previous packet; drop it without touching state
    Duplicate,
    /// Packets were lost; state has been resynchronised on this packet
    Discontinuity,
}

fn next(counter: u8) -> u8 {
    (counter + 1) % CONTINUITY_MODULUS
}

/// Per-route continuity state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContinuityTracker {
    valid: bool,
    expected: u8,
    last_glitch_report: Option<Instant>,
}

impl ContinuityTracker {
    /// Creates a tracker with nothing to compare against.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an expected counter is being tracked.
    pub fn is_tracking(&self) -> bool {
        self.valid
    }

    /// The counter the next packet should carry.
    pub fn expected(&self) -> Option<u8> {
        self.valid.then_some(self.expected)
    }

    /// Forgets the expected counter; the next packet is accepted as is.
    pub fn reset(&mut self) {
        self.valid = false;
    }

    /// Checks `counter` and advances state.
    ///
    /// `discontinuity_indicator` is the adaptation field flag announcing a
    /// legitimate break: the packet is still accepted but the following one is
    /// not compared against it.
    pub fn check(&mut self, counter: u8, discontinuity_indicator: bool) -> Continuity {
        let counter = counter % CONTINUITY_MODULUS;

        let verdict = if !self.valid || counter == self.expected {
            Continuity::InSequence
        } else if next(counter) == self.expected {
            return Continuity::Duplicate;
        } else {
            Continuity::Discontinuity
        };

        self.expected = next(counter);
        self.valid = !discontinuity_indicator;
        verdict
    }

    /// Whether a glitch observed at `now` should be reported, given reports are
    /// spaced at least `interval` apart. Records the report when it is due.
    pub fn should_report(&mut self, now: Instant, interval: Duration) -> bool {
        match self.last_glitch_report {
            Some(last) if now.saturating_duration_since(last) < interval => false,
            _ => {
                self.last_glitch_report = Some(now);
                true
            }
        }
    }
}
