//! Resource table: per-workplace holder and FIFO wait queue.
//!
//! Pure bookkeeping. Who gets woken, and when, is decided by the coordinator;
//! the table only records holders and queue order. Releases use direct
//! transfer: the releaser assigns the queue head as the new holder before
//! anyone wakes, so a vacant workplace always has an empty queue.

use std::collections::{HashMap, VecDeque};

use crate::workplace::{WorkerId, WorkplaceId};

#[derive(Debug, Default)]
struct Seat {
    holder: Option<WorkerId>,
    queue: VecDeque<WorkerId>,
}

#[derive(Debug)]
pub(crate) struct Table {
    seats: HashMap<WorkplaceId, Seat>,
}

impl Table {
    pub(crate) fn new(ids: impl IntoIterator<Item = WorkplaceId>) -> Self {
        Self {
            seats: ids.into_iter().map(|id| (id, Seat::default())).collect(),
        }
    }

    pub(crate) fn is_vacant(&self, id: WorkplaceId) -> bool {
        self.seats.get(&id).is_some_and(|s| s.holder.is_none())
    }

    pub(crate) fn holder(&self, id: WorkplaceId) -> Option<WorkerId> {
        self.seats.get(&id).and_then(|s| s.holder)
    }

    pub(crate) fn assign(&mut self, id: WorkplaceId, worker: WorkerId) {
        if let Some(seat) = self.seats.get_mut(&id) {
            debug_assert!(
                seat.holder.is_none() || seat.holder == Some(worker),
                "assigning an occupied workplace"
            );
            seat.holder = Some(worker);
        } else {
            debug_assert!(false, "assign on unknown workplace");
            tracing::error!(workplace = %id, "Bug: assign on unknown workplace");
        }
    }

    /// Clear the holder and hand back the queue head, if any.
    ///
    /// The caller performs the actual grant; the pop and the grant must happen
    /// under the same critical section so no one observes a vacant workplace
    /// with a non-empty queue.
    pub(crate) fn vacate(&mut self, id: WorkplaceId) -> Option<WorkerId> {
        let seat = self.seats.get_mut(&id)?;
        seat.holder = None;
        seat.queue.pop_front()
    }

    pub(crate) fn enqueue(&mut self, id: WorkplaceId, worker: WorkerId) {
        if let Some(seat) = self.seats.get_mut(&id) {
            debug_assert!(seat.holder.is_some(), "queueing on a vacant workplace");
            seat.queue.push_back(worker);
        } else {
            debug_assert!(false, "enqueue on unknown workplace");
            tracing::error!(workplace = %id, "Bug: enqueue on unknown workplace");
        }
    }

    /// Replace the holder directly, without a vacate in between. Used only
    /// for cycle grants, where ownership moves between members "at once" and
    /// the workplace is never observed vacant.
    pub(crate) fn reseat(&mut self, id: WorkplaceId, worker: WorkerId) {
        if let Some(seat) = self.seats.get_mut(&id) {
            debug_assert!(seat.holder.is_some(), "reseat on a vacant workplace");
            seat.holder = Some(worker);
        } else {
            debug_assert!(false, "reseat on unknown workplace");
            tracing::error!(workplace = %id, "Bug: reseat on unknown workplace");
        }
    }

    /// Remove a waiter regardless of its position. Used only for cycle grants,
    /// where a member is granted out of band and must leave the queue it was
    /// parked in.
    pub(crate) fn remove_waiter(&mut self, id: WorkplaceId, worker: WorkerId) {
        if let Some(seat) = self.seats.get_mut(&id) {
            seat.queue.retain(|w| *w != worker);
        }
    }

    pub(crate) fn queue_depth(&self, id: WorkplaceId) -> usize {
        self.seats.get(&id).map_or(0, |s| s.queue.len())
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = WorkplaceId> + '_ {
        self.seats.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wid(n: u32) -> WorkplaceId {
        WorkplaceId::new(n)
    }

    #[test]
    fn assign_and_vacate() {
        let mut table = Table::new([wid(1), wid(2)]);
        let w = WorkerId::new();

        assert!(table.is_vacant(wid(1)));
        table.assign(wid(1), w);
        assert!(!table.is_vacant(wid(1)));
        assert_eq!(table.holder(wid(1)), Some(w));

        assert_eq!(table.vacate(wid(1)), None);
        assert!(table.is_vacant(wid(1)));
    }

    #[test]
    fn vacate_hands_back_queue_head_in_fifo_order() {
        let mut table = Table::new([wid(1)]);
        let holder = WorkerId::new();
        let first = WorkerId::new();
        let second = WorkerId::new();

        table.assign(wid(1), holder);
        table.enqueue(wid(1), first);
        table.enqueue(wid(1), second);
        assert_eq!(table.queue_depth(wid(1)), 2);

        assert_eq!(table.vacate(wid(1)), Some(first));
        table.assign(wid(1), first);
        assert_eq!(table.vacate(wid(1)), Some(second));
    }

    #[test]
    fn remove_waiter_skips_queue_position() {
        let mut table = Table::new([wid(1)]);
        let holder = WorkerId::new();
        let first = WorkerId::new();
        let member = WorkerId::new();

        table.assign(wid(1), holder);
        table.enqueue(wid(1), first);
        table.enqueue(wid(1), member);

        table.remove_waiter(wid(1), member);
        assert_eq!(table.queue_depth(wid(1)), 1);

        // The unrelated waiter keeps its head position.
        assert_eq!(table.vacate(wid(1)), Some(first));
    }

    #[test]
    fn unknown_workplace_is_inert() {
        let mut table = Table::new([wid(1)]);
        assert!(!table.is_vacant(wid(9)));
        assert_eq!(table.vacate(wid(9)), None);
        assert_eq!(table.queue_depth(wid(9)), 0);
    }
}
