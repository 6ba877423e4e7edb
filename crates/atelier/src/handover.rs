//! Handover barrier: one-shot rendezvous for a resolved cycle.
//!
//! Every member of a cycle is granted its new workplace in the same critical
//! section, but none may start working there before every old owner has
//! stopped. Each member arrives at the barrier and waits until all have
//! arrived; only the arrival counter is touched outside the coordinator's
//! lock, via its own atomics. The barrier is built fresh per resolved group
//! and discarded once every member has passed.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::error::WorkshopError;

#[derive(Debug)]
pub(crate) struct Handover {
    remaining: AtomicUsize,
    complete: watch::Sender<bool>,
}

impl Handover {
    pub(crate) fn new(members: usize) -> Self {
        debug_assert!(members >= 2, "a cycle has at least two members");
        Self {
            remaining: AtomicUsize::new(members),
            complete: watch::Sender::new(false),
        }
    }

    /// Signal this member's arrival without blocking. Each member arrives
    /// exactly once; the last arrival releases everyone waiting.
    pub(crate) fn arrive(&self) {
        let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "more arrivals than group members");
        if prev == 1 {
            // The whole group may arrive before anyone waits; send_replace
            // stores the value even with zero receivers, plain send does not.
            self.complete.send_replace(true);
        }
    }

    /// Wait until every member has arrived.
    pub(crate) async fn completed(&self) -> Result<(), WorkshopError> {
        let mut rx = self.complete.subscribe();
        rx.wait_for(|done| *done)
            .await
            .map(|_| ())
            .map_err(|_| WorkshopError::Interrupted("handover barrier abandoned"))
    }
}
