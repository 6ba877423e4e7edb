//! Admission controller: global residency bound with a FIFO entry queue.
//!
//! Pure bookkeeping under the coordinator's lock. `depart` transfers the
//! freed residency slot directly to the queue head, so the count never dips
//! below saturation while someone is waiting.

use std::collections::VecDeque;

use crate::workplace::WorkerId;

#[derive(Debug)]
pub(crate) struct Admission {
    bound: usize,
    residents: usize,
    queue: VecDeque<WorkerId>,
}

impl Admission {
    pub(crate) fn new(bound: usize) -> Self {
        Self {
            bound,
            residents: 0,
            queue: VecDeque::new(),
        }
    }

    /// Admit the worker if residency is below the bound, else queue it.
    /// Returns whether the worker was admitted immediately.
    pub(crate) fn admit(&mut self, worker: WorkerId) -> bool {
        if self.residents < self.bound {
            self.residents += 1;
            true
        } else {
            self.queue.push_back(worker);
            false
        }
    }

    /// Account for a departure. If someone is queued, the slot transfers to
    /// the queue head, which the caller must wake.
    pub(crate) fn depart(&mut self) -> Option<WorkerId> {
        debug_assert!(self.residents > 0, "depart without a resident");
        self.residents = self.residents.saturating_sub(1);
        let next = self.queue.pop_front();
        if next.is_some() {
            self.residents += 1;
        }
        next
    }

    pub(crate) fn residents(&self) -> usize {
        self.residents
    }

    pub(crate) fn waiting(&self) -> usize {
        self.queue.len()
    }
}
