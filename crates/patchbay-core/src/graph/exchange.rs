//! Single-slot plan handoff between the control and real-time threads.
//!
//! The control thread [`publish`](PlanPublisher::publish)es a new plan under a
//! blocking lock. At the top of each callback the real-time thread calls
//! [`adopt`](PlanReceiver::adopt), which only `try_lock`s: if a plan is waiting
//! it swaps it with the active one, moving the old plan back into the slot.
//! Dropping plans is left to the control thread through
//! [`reclaim`](PlanPublisher::reclaim), so the real-time thread never frees
//! memory.
//!
//! # Thread Safety
//!
//! - **Slot**: `parking_lot::Mutex`. Control side locks, real-time side
//!   `try_lock`s and skips the swap when contended.
//! - **Active plan**: owned by [`PlanReceiver`]; never shared.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::plan::RenderPlan;

#[derive(Default)]
struct Slot {
    pending: Option<Box<RenderPlan>>,
    is_new: bool,
}

/// Creates a connected publisher/receiver pair.
pub fn plan_channel() -> (PlanPublisher, PlanReceiver) {
    let slot = Arc::new(Mutex::new(Slot::default()));
    (
        PlanPublisher {
            slot: Arc::clone(&slot),
        },
        PlanReceiver { slot, active: None },
    )
}

/// Control-thread end of the exchange.
#[derive(Clone)]
pub struct PlanPublisher {
    slot: Arc<Mutex<Slot>>,
}

impl PlanPublisher {
    /// Offers a plan to the real-time thread. `None` asks it to stop rendering.
    ///
    /// Replaces any plan that was published but not yet adopted.
    pub fn publish(&self, plan: Option<Box<RenderPlan>>) {
        let replaced = {
            let mut slot = self.slot.lock();
            slot.is_new = true;
            core::mem::replace(&mut slot.pending, plan)
        };
        drop(replaced);
    }

    /// Drops the plan the real-time thread handed back, if any.
    ///
    /// Returns true if a plan was dropped.
    pub fn reclaim(&self) -> bool {
        let retired = {
            let mut slot = self.slot.lock();
            if slot.is_new { None } else { slot.pending.take() }
        };
        retired.is_some()
    }

    /// Starts a background thread calling [`reclaim`](Self::reclaim) every
    /// `interval`. The thread stops when the returned handle is dropped.
    pub fn spawn_reclaimer(&self, interval: Duration) -> std::io::Result<Reclaimer> {
        let publisher = self.clone();
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("patchbay-reclaim".into())
            .spawn(move || {
                let (lock, cvar) = &*signal;
                let mut stopped = lock.lock();
                while !*stopped {
                    cvar.wait_for(&mut stopped, interval);
                    if !*stopped {
                        publisher.reclaim();
                    }
                }
            })?;

        Ok(Reclaimer {
            stop,
            handle: Some(handle),
        })
    }
}

/// Real-time end of the exchange. Owns the active plan.
pub struct PlanReceiver {
    slot: Arc<Mutex<Slot>>,
    active: Option<Box<RenderPlan>>,
}

impl PlanReceiver {
    /// Installs the newest published plan if the slot is free.
    ///
    /// Never blocks or frees memory. Returns true if a plan was swapped in.
    #[inline]
    pub fn adopt(&mut self) -> bool {
        let Some(mut slot) = self.slot.try_lock() else {
            return false;
        };
        if !slot.is_new {
            return false;
        }
        core::mem::swap(&mut slot.pending, &mut self.active);
        slot.is_new = false;
        true
    }

    /// The plan currently used for rendering.
    #[inline]
    pub fn active(&mut self) -> Option<&mut RenderPlan> {
        self.active.as_deref_mut()
    }

    /// Returns true if a plan is active.
    #[inline]
    pub fn has_plan(&self) -> bool {
        self.active.is_some()
    }

    /// Latency of the active plan, or 0 without one.
    pub fn latency_samples(&self) -> usize {
        self.active.as_ref().map_or(0, |plan| plan.latency_samples())
    }
}

/// Handle to the background reclaim thread.
pub struct Reclaimer {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock() = true;
        cvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
