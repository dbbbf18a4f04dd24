//! Build-once gate for the shared index.
//!
//! `Uninitialized -> Building -> Ready | Failed`. The first caller performs the
//! build outside the lock; callers arriving meanwhile wait on a condvar. A
//! failed first build is terminal until an explicit rebuild. A rebuild of a
//! `Ready` gate keeps serving the previous generation until the new one is
//! swapped in.

use crate::error::{EngineError, Result};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Uninitialized,
    Building,
    Ready,
    /// Ready, with a replacement generation being built.
    Rebuilding,
    Failed,
}

enum Slot<T> {
    Uninitialized,
    Building,
    Ready(Arc<T>),
    Rebuilding(Arc<T>),
    Failed(String),
}

pub struct IndexGate<T> {
    slot: Mutex<Slot<T>>,
    changed: Condvar,
    generation: AtomicU64,
    builds: AtomicUsize,
}

impl<T> Default for IndexGate<T> {
    fn default() -> Self { Self::new() }
}

impl<T> IndexGate<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Uninitialized),
            changed: Condvar::new(),
            generation: AtomicU64::new(0),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> GateState {
        match &*self.slot.lock() {
            Slot::Uninitialized => GateState::Uninitialized,
            Slot::Building => GateState::Building,
            Slot::Ready(_) => GateState::Ready,
            Slot::Rebuilding(_) => GateState::Rebuilding,
            Slot::Failed(_) => GateState::Failed,
        }
    }

    /// Generation currently served; zero before the first successful build.
    pub fn generation(&self) -> u64 { self.generation.load(Ordering::Acquire) }

    /// Number of builds started over the gate's lifetime.
    pub fn builds(&self) -> usize { self.builds.load(Ordering::Relaxed) }

    /// The value currently served, without triggering a build.
    pub fn current(&self) -> Option<Arc<T>> {
        match &*self.slot.lock() {
            Slot::Ready(v) | Slot::Rebuilding(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Return the ready value, building it first if nobody has. `build` receives
    /// the generation number it produces.
    pub fn get_or_build<F>(&self, build: F) -> Result<Arc<T>>
    where
        F: FnOnce(u64) -> Result<T>,
    {
        let mut slot = self.slot.lock();
        loop {
            match &*slot {
                Slot::Ready(v) | Slot::Rebuilding(v) => return Ok(v.clone()),
                Slot::Failed(reason) => return Err(EngineError::IndexUnavailable(reason.clone())),
                Slot::Uninitialized => break,
                Slot::Building => {}
            }
            self.changed.wait(&mut slot);
        }
        *slot = Slot::Building;
        drop(slot);
        self.run_build(build, None).map_err(|e| match e {
            EngineError::IndexUnavailable(_) => e,
            other => EngineError::IndexUnavailable(other.to_string()),
        })
    }

    /// Build a new generation regardless of the current state. Waits for any
    /// build already in flight. If a generation is being served it stays
    /// visible throughout, and stays in place if the rebuild fails.
    pub fn rebuild<F>(&self, build: F) -> Result<Arc<T>>
    where
        F: FnOnce(u64) -> Result<T>,
    {
        let mut slot = self.slot.lock();
        let previous = loop {
            match &*slot {
                Slot::Ready(v) => break Some(v.clone()),
                Slot::Uninitialized | Slot::Failed(_) => break None,
                Slot::Building | Slot::Rebuilding(_) => {}
            }
            self.changed.wait(&mut slot);
        };
        *slot = match &previous {
            Some(v) => Slot::Rebuilding(v.clone()),
            None => Slot::Building,
        };
        drop(slot);
        self.run_build(build, previous)
    }

    fn run_build<F>(&self, build: F, previous: Option<Arc<T>>) -> Result<Arc<T>>
    where
        F: FnOnce(u64) -> Result<T>,
    {
        self.builds.fetch_add(1, Ordering::Relaxed);
        let mut guard = BuildGuard { gate: self, previous, finished: false };
        let next_generation = self.generation() + 1;
        let outcome = build(next_generation);

        let mut slot = self.slot.lock();
        guard.finished = true;
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                *slot = Slot::Ready(value.clone());
                self.generation.store(next_generation, Ordering::Release);
                Ok(value)
            }
            Err(err) => {
                match guard.previous.take() {
                    Some(prev) => *slot = Slot::Ready(prev),
                    None => *slot = Slot::Failed(err.to_string()),
                }
                Err(err)
            }
        };
        drop(slot);
        self.changed.notify_all();
        result
    }
}

/// Restores a consistent state if the build closure panics, so waiters never
/// block on a build that will not finish.
struct BuildGuard<'a, T> {
    gate: &'a IndexGate<T>,
    previous: Option<Arc<T>>,
    finished: bool,
}

impl<T> Drop for BuildGuard<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut slot = self.gate.slot.lock();
        *slot = match self.previous.take() {
            Some(prev) => Slot::Ready(prev),
            None => Slot::Failed("index build panicked".to_string()),
        };
        drop(slot);
        self.gate.changed.notify_all();
    }
}
