//! Two-state gate deciding who may touch the tag reader.
//!
//! ```text
//!   Listening --pause()--> Paused --resume()--> Listening
//! ```
//!
//! While `Paused` the registration workflow owns the reader and the
//! dispatcher must neither poll it nor start playback. The dispatcher holds a
//! tick lease for each whole tick; `drain()` waits out a tick that was already
//! running when `pause()` landed, so the reader is never shared.
//!
//! Open defect: a registration that pauses and is then abandoned never
//! resumes, leaving playback disabled until another registration commits.
//! `resume_if_epoch` lets the caller opt into a bounded auto-resume instead;
//! see `registration.resume_timeout_secs`.

use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Listening,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    pub state: CoordinatorState,
    /// Incremented by every `pause()`.
    pub epoch: u64,
}

pub struct Coordinator {
    tx: watch::Sender<Gate>,
    ticks: RwLock<()>,
}

impl Coordinator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Gate {
            state: CoordinatorState::Listening,
            epoch: 0,
        });
        Self {
            tx,
            ticks: RwLock::new(()),
        }
    }

    /// Enter `Paused`, returning the epoch that identifies this pause.
    pub fn pause(&self) -> u64 {
        let mut epoch = 0;
        self.tx.send_modify(|gate| {
            gate.epoch += 1;
            gate.state = CoordinatorState::Paused;
            epoch = gate.epoch;
        });
        info!("coordinator: paused (epoch {})", epoch);
        epoch
    }

    pub fn resume(&self) {
        let resumed = self.tx.send_if_modified(|gate| {
            if gate.state == CoordinatorState::Paused {
                gate.state = CoordinatorState::Listening;
                true
            } else {
                false
            }
        });
        if resumed {
            info!("coordinator: listening");
        }
    }

    /// Resume only if the pause identified by `epoch` is still in effect.
    /// Returns whether the state changed.
    pub fn resume_if_epoch(&self, epoch: u64) -> bool {
        let resumed = self.tx.send_if_modified(|gate| {
            if gate.state == CoordinatorState::Paused && gate.epoch == epoch {
                gate.state = CoordinatorState::Listening;
                true
            } else {
                false
            }
        });
        if resumed {
            info!("coordinator: auto-resumed stale pause (epoch {})", epoch);
        }
        resumed
    }

    pub fn is_listening(&self) -> bool {
        self.state() == CoordinatorState::Listening
    }

    /// Held by the dispatcher from its state check until the tick is done.
    pub async fn tick_lease(&self) -> RwLockReadGuard<'_, ()> {
        self.ticks.read().await
    }

    /// Wait until no tick is in flight. Called after `pause()`, so any tick
    /// starting later sees `Paused` and leaves the reader alone.
    pub async fn drain(&self) {
        drop(self.ticks.write().await);
        debug!("coordinator: in-flight tick drained");
    }

    /// Number of pauses so far.
    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    pub fn state(&self) -> CoordinatorState {
        self.tx.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<Gate> {
        self.tx.subscribe()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
