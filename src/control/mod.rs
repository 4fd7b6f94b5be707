//! Pause, resume and stop for running executions.
//!
//! An [`ExecutionControl`] is a cheap, cloneable handle. The interpreter calls
//! [`ExecutionControl::checkpoint`] at every step boundary; other threads flip
//! the flags through their own clone or through an [`ExecutionRegistry`].

use crate::interpreter::StepError;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Records older than this are dropped by [`ExecutionRegistry::purge_expired`].
pub const DEFAULT_EXECUTION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Default)]
struct ControlFlags {
    paused: bool,
    stopped: bool,
}

#[derive(Debug)]
struct ControlState {
    flags: Mutex<ControlFlags>,
    signal: Condvar,
    created_at: Instant,
}

/// Per-execution control handle.
#[derive(Debug, Clone)]
pub struct ExecutionControl {
    id: Uuid,
    state: Arc<ControlState>,
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionControl {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            state: Arc::new(ControlState {
                flags: Mutex::new(ControlFlags::default()),
                signal: Condvar::new(),
                created_at: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pause(&self) {
        let mut flags = self.state.flags.lock();
        if !flags.stopped {
            flags.paused = true;
            debug!(execution_id = %self.id, "Execution paused");
        }
    }

    pub fn resume(&self) {
        let mut flags = self.state.flags.lock();
        flags.paused = false;
        self.state.signal.notify_all();
        debug!(execution_id = %self.id, "Execution resumed");
    }

    /// Stops the execution. Also releases a paused execution so it can observe the stop.
    pub fn stop(&self) {
        let mut flags = self.state.flags.lock();
        flags.stopped = true;
        flags.paused = false;
        self.state.signal.notify_all();
        debug!(execution_id = %self.id, "Execution stopped");
    }

    pub fn is_paused(&self) -> bool {
        self.state.flags.lock().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state.flags.lock().stopped
    }

    /// Blocks while paused; fails with `StepError::Stopped` once stopped.
    pub fn checkpoint(&self) -> Result<(), StepError> {
        let mut flags = self.state.flags.lock();
        while flags.paused && !flags.stopped {
            self.state.signal.wait(&mut flags);
        }
        if flags.stopped {
            Err(StepError::Stopped)
        } else {
            Ok(())
        }
    }

    pub fn age(&self) -> Duration {
        self.state.created_at.elapsed()
    }
}

/// Execution-id keyed store of control handles with a time-to-live.
#[derive(Debug)]
pub struct ExecutionRegistry {
    executions: DashMap<Uuid, ExecutionControl>,
    ttl: Duration,
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_EXECUTION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            executions: DashMap::new(),
            ttl,
        }
    }

    /// Registers a fresh handle. Expired records are purged first.
    pub fn create(&self) -> ExecutionControl {
        self.purge_expired();
        let control = ExecutionControl::new();
        self.executions.insert(control.id(), control.clone());
        info!(execution_id = %control.id(), "Registered execution");
        control
    }

    pub fn get(&self, id: &Uuid) -> Option<ExecutionControl> {
        self.executions.get(id).map(|entry| entry.value().clone())
    }

    /// Returns `false` when the id is unknown.
    pub fn pause(&self, id: &Uuid) -> bool {
        self.apply(id, ExecutionControl::pause)
    }

    pub fn resume(&self, id: &Uuid) -> bool {
        self.apply(id, ExecutionControl::resume)
    }

    pub fn stop(&self, id: &Uuid) -> bool {
        self.apply(id, ExecutionControl::stop)
    }

    fn apply(&self, id: &Uuid, action: fn(&ExecutionControl)) -> bool {
        match self.get(id) {
            Some(control) => {
                action(&control);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &Uuid) -> Option<ExecutionControl> {
        self.executions.remove(id).map(|(_, control)| control)
    }

    /// Drops every record older than the TTL and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.executions.len();
        self.executions.retain(|_, control| control.age() < self.ttl);
        let purged = before.saturating_sub(self.executions.len());
        if purged > 0 {
            info!(purged, "Purged expired execution records");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}
