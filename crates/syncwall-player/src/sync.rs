//! Synchronized start across independently buffering players.
//!
//! The controller keeps a typed registry of sync targets in registration order.
//! It counts readiness signals and, once every target is ready and the
//! operator has armed playback, seeks all targets to the position of target 0
//! and starts them. Alignment runs on whichever of the two events completes the
//! barrier, and only then.
//!
//! Alignment is best effort. Decoder and buffering latency differ per target,
//! so drift can reappear after the call returns; nothing re-synchronizes later.

use crate::adapter::PlaybackAdapter;
use crate::engine::{EngineFactory, SessionEvent};
use serde::Serialize;
use tracing::{debug, info};

/// Capabilities the controller needs from each player.
pub trait SyncTarget {
    fn position(&self) -> f64;
    fn seek_to(&mut self, seconds: f64);
    fn play(&mut self);
}

impl<F: EngineFactory> SyncTarget for PlaybackAdapter<F> {
    fn position(&self) -> f64 {
        PlaybackAdapter::position(self)
    }

    fn seek_to(&mut self, seconds: f64) {
        PlaybackAdapter::seek_to(self, seconds)
    }

    fn play(&mut self) {
        PlaybackAdapter::play(self)
    }
}

/// Barrier counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub ready_count: usize,
    pub required_count: usize,
    pub armed: bool,
}

impl SyncState {
    pub fn barrier_met(&self) -> bool {
        self.armed && self.ready_count >= self.required_count
    }
}

/// Record of one run of the alignment protocol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Alignment {
    /// Position of target 0 when alignment ran.
    pub reference_position: f64,
    /// Number of targets that received seek + play.
    pub targets: usize,
}

/// Readiness barrier and time alignment over a set of players.
pub struct SyncController<T> {
    targets: Vec<T>,
    ready_count: usize,
    armed: bool,
}

impl<T> Default for SyncController<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncController<T> {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            ready_count: 0,
            armed: false,
        }
    }

    /// Add a target. The first registered target is the time reference.
    pub fn register(&mut self, target: T) -> usize {
        self.targets.push(target);
        self.targets.len() - 1
    }

    pub fn state(&self) -> SyncState {
        SyncState {
            ready_count: self.ready_count,
            required_count: self.targets.len(),
            armed: self.armed,
        }
    }

    pub fn targets(&self) -> &[T] {
        &self.targets
    }

    pub fn target(&self, index: usize) -> Option<&T> {
        self.targets.get(index)
    }

    pub fn target_mut(&mut self, index: usize) -> Option<&mut T> {
        self.targets.get_mut(index)
    }

    pub fn targets_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.targets.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<T: SyncTarget> SyncController<T> {
    /// Count one target becoming ready. Runs alignment if this signal
    /// completes an armed barrier.
    pub fn register_ready(&mut self) -> Option<Alignment> {
        self.ready_count += 1;
        debug!(
            ready = self.ready_count,
            required = self.targets.len(),
            "Player reported ready"
        );
        if self.armed && self.ready_count == self.targets.len() {
            return self.align();
        }
        None
    }

    /// Arm synchronized playback. Alignment runs now if every target is
    /// already ready, otherwise when the last one reports in.
    pub fn arm(&mut self) -> Option<Alignment> {
        if self.armed {
            return None;
        }
        self.armed = true;
        if self.ready_count >= self.targets.len() {
            return self.align();
        }
        info!(
            ready = self.ready_count,
            required = self.targets.len(),
            "Armed, waiting for players"
        );
        None
    }

    fn align(&mut self) -> Option<Alignment> {
        let reference_position = self.targets.first()?.position();
        for target in self.targets.iter_mut() {
            target.seek_to(reference_position);
            target.play();
        }
        let alignment = Alignment {
            reference_position,
            targets: self.targets.len(),
        };
        info!(
            position = reference_position,
            targets = alignment.targets,
            "Aligned players"
        );
        Some(alignment)
    }
}

impl<F: EngineFactory> SyncController<PlaybackAdapter<F>> {
    /// Route an engine event to the adapter owning its slot and feed a
    /// resulting ready transition into the barrier. Slots need not match
    /// registration order.
    pub fn dispatch(&mut self, event: SessionEvent) -> Option<Alignment> {
        let slot = event.slot;
        let Some(adapter) = self.targets.iter_mut().find(|a| a.slot() == slot) else {
            debug!(slot, "Event for unknown player slot");
            return None;
        };
        if adapter.handle_event(event) {
            return self.register_ready();
        }
        None
    }
}
