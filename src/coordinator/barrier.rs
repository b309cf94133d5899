//! Abortable single-use phase barrier
//!
//! Behaves like `std::sync::Barrier` for one rendezvous, except that any
//! participant can abort it: every current and future waiter then returns
//! `Fault::Aborted` instead of blocking forever on a peer that will never
//! arrive.

use crate::error::{Fault, FaultResult};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    released: bool,
    aborted: bool,
}

#[derive(Debug)]
pub struct PhaseBarrier {
    participants: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

/// Returned to each participant once the barrier releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    /// True for exactly one participant: the last to arrive
    pub is_leader: bool,
}

impl PhaseBarrier {
    pub fn new(participants: usize) -> Self {
        debug_assert!(participants >= 1);
        Self {
            participants,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    // No code panics while holding the lock, but never let poison mask the real fault
    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until all participants have arrived or the barrier is aborted
    pub fn wait(&self) -> FaultResult<BarrierWaitResult> {
        let mut state = self.lock();
        if state.aborted {
            return Err(Fault::Aborted);
        }
        debug_assert!(!state.released, "phase barrier reused");

        state.arrived += 1;
        if state.arrived == self.participants {
            state.released = true;
            self.cvar.notify_all();
            return Ok(BarrierWaitResult { is_leader: true });
        }

        while !state.released && !state.aborted {
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.released {
            Ok(BarrierWaitResult { is_leader: false })
        } else {
            Err(Fault::Aborted)
        }
    }

    /// Release every waiter with `Fault::Aborted`
    ///
    /// Has no effect on a barrier that has already released.
    pub fn abort(&self) {
        let mut state = self.lock();
        if !state.released {
            state.aborted = true;
            self.cvar.notify_all();
        }
    }
}
