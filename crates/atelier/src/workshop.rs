//! Workshop coordinator - the façade over table, admission, resolver and
//! handover.
//!
//! Flow:
//! 1. `enter` passes the admission gate, then the workplace queue
//! 2. `switch_to` classifies the request: free grant / chain / cycle
//! 3. A resolved cycle grants every member at once and hands out a barrier
//! 4. `leave` releases the workplace and wakes the next entrant
//!
//! All shared state lives in one `State` behind a single `std::sync::Mutex`.
//! The lock is never held across a suspension: a worker that must wait drops
//! the guard, parks on its own `Notify`, and finds the grant already recorded
//! when it wakes (direct transfer - the waker does all bookkeeping).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::admission::Admission;
use crate::error::WorkshopError;
use crate::handover::Handover;
use crate::resolver::{Resolution, classify};
use crate::table::Table;
use crate::workplace::{WorkerId, Workplace, WorkplaceId};

/// Per-worker coordination record, alive from `enter` to `leave`.
struct Resident {
    /// Single-slot wakeup primitive; a stored permit survives the gap
    /// between a grant and the worker's `notified().await`.
    wake: Arc<Notify>,
    /// Currently held workplace, if seated.
    at: Option<WorkplaceId>,
    /// Workplace queue this worker is parked in, if any.
    queued_on: Option<WorkplaceId>,
    /// Set by cycle resolution while the worker is parked; picked up on wake.
    handover: Option<Arc<Handover>>,
}

impl Resident {
    fn new(wake: Arc<Notify>) -> Self {
        Self {
            wake,
            at: None,
            queued_on: None,
            handover: None,
        }
    }
}

struct State {
    table: Table,
    admission: Admission,
    /// Pending switch edges: source workplace -> requested workplace.
    /// At most one outgoing edge per workplace; always acyclic between
    /// resolver runs.
    edges: HashMap<WorkplaceId, WorkplaceId>,
    workers: HashMap<WorkerId, Resident>,
}

impl State {
    /// Release a workplace. If someone is queued, the head is granted in the
    /// same critical section (direct transfer, no re-check race).
    fn release(&mut self, workplace: WorkplaceId) {
        if let Some(next) = self.table.vacate(workplace) {
            self.grant(next, workplace);
        }
    }

    /// Record a grant for a woken waiter. A granted switcher vacates its old
    /// workplace here, which may cascade through further chain links; every
    /// link of a chain resolves through these ordinary sequential releases.
    fn grant(&mut self, worker: WorkerId, workplace: WorkplaceId) {
        self.table.assign(workplace, worker);
        let previous = match self.workers.get_mut(&worker) {
            Some(resident) => {
                debug_assert_eq!(resident.queued_on, Some(workplace));
                resident.queued_on = None;
                std::mem::replace(&mut resident.at, Some(workplace))
            }
            None => {
                debug_assert!(false, "grant to unknown worker");
                tracing::error!(worker = %worker, "Bug: grant to unknown worker");
                return;
            }
        };

        if let Some(source) = previous {
            self.edges.remove(&source);
            self.release(source);
        }

        if let Some(resident) = self.workers.get(&worker) {
            resident.wake.notify_one();
        }
    }

    /// Grant every member of a resolved cycle its requested workplace at
    /// once, bypassing the FIFO queues only for the members themselves.
    /// Unrelated waiters keep their queue positions untouched.
    ///
    /// `members` are workplaces in request order: the holder of `members[i]`
    /// moves to `members[(i + 1) % n]`. Returns the group's fresh barrier;
    /// the initiator's share is handed back directly, parked members find
    /// theirs in their resident record.
    fn resolve_cycle(&mut self, members: &[WorkplaceId], initiator: WorkerId) -> Arc<Handover> {
        let barrier = Arc::new(Handover::new(members.len()));

        let moves: Vec<(WorkerId, WorkplaceId, WorkplaceId)> = members
            .iter()
            .enumerate()
            .filter_map(|(i, &from)| {
                let dest = members[(i + 1) % members.len()];
                match self.table.holder(from) {
                    Some(holder) => Some((holder, from, dest)),
                    None => {
                        debug_assert!(false, "cycle member without a holder");
                        tracing::error!(workplace = %from, "Bug: cycle member without a holder");
                        None
                    }
                }
            })
            .collect();

        for &(holder, from, dest) in &moves {
            self.edges.remove(&from);
            self.table.reseat(dest, holder);

            let Some(resident) = self.workers.get_mut(&holder) else {
                debug_assert!(false, "cycle member not resident");
                tracing::error!(worker = %holder, "Bug: cycle member not resident");
                continue;
            };
            resident.at = Some(dest);

            if holder == initiator {
                continue;
            }
            self.table.remove_waiter(dest, holder);
            resident.queued_on = None;
            resident.handover = Some(Arc::clone(&barrier));
            resident.wake.notify_one();
        }

        barrier
    }
}

struct Shared {
    stations: HashMap<WorkplaceId, Arc<dyn Workplace>>,
    bound: usize,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, State>, WorkshopError> {
        self.state.lock().map_err(|_| WorkshopError::StatePoisoned)
    }
}

/// Coordinator for a fixed set of capacity-1 workplaces.
///
/// Cheap to clone; all clones share the same coordination state.
#[derive(Clone)]
pub struct Workshop {
    shared: Arc<Shared>,
}

impl Workshop {
    /// Build a workshop over the given workplaces with an explicit admission
    /// bound. The bound must be at least the workplace count, otherwise
    /// switches in flight can be starved by entrants.
    pub fn new(
        workplaces: Vec<Arc<dyn Workplace>>,
        admission_bound: usize,
    ) -> Result<Self, WorkshopError> {
        if admission_bound < workplaces.len() {
            return Err(WorkshopError::AdmissionBoundTooSmall {
                bound: admission_bound,
                workplaces: workplaces.len(),
            });
        }

        let mut stations: HashMap<WorkplaceId, Arc<dyn Workplace>> =
            HashMap::with_capacity(workplaces.len());
        for workplace in workplaces {
            let id = workplace.id();
            if stations.insert(id, workplace).is_some() {
                return Err(WorkshopError::DuplicateWorkplace(id));
            }
        }

        let state = State {
            table: Table::new(stations.keys().copied()),
            admission: Admission::new(admission_bound),
            edges: HashMap::new(),
            workers: HashMap::new(),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                stations,
                bound: admission_bound,
                state: Mutex::new(state),
            }),
        })
    }

    /// Build a workshop with the default admission bound of twice the
    /// workplace count.
    pub fn with_default_bound(workplaces: Vec<Arc<dyn Workplace>>) -> Result<Self, WorkshopError> {
        let bound = workplaces.len() * 2;
        Self::new(workplaces, bound)
    }

    /// Enter the workshop at the given workplace.
    ///
    /// Suspends at the admission gate while the workshop is saturated, then
    /// on the workplace's FIFO queue while it is occupied. Both queues are
    /// strictly first-come-first-served.
    pub async fn enter(&self, workplace: WorkplaceId) -> Result<WorkPermit, WorkshopError> {
        let station = self
            .shared
            .stations
            .get(&workplace)
            .cloned()
            .ok_or(WorkshopError::UnknownWorkplace(workplace))?;

        let worker = WorkerId::new();
        let wake = Arc::new(Notify::new());

        let admitted = {
            let mut state = self.shared.lock()?;
            state.workers.insert(worker, Resident::new(Arc::clone(&wake)));
            state.admission.admit(worker)
        };
        if !admitted {
            tracing::debug!(worker = %worker, "Waiting at the admission gate");
            wake.notified().await;
        }

        let seated = {
            let mut state = self.shared.lock()?;
            if state.table.is_vacant(workplace) {
                state.table.assign(workplace, worker);
                if let Some(resident) = state.workers.get_mut(&worker) {
                    resident.at = Some(workplace);
                }
                true
            } else {
                state.table.enqueue(workplace, worker);
                if let Some(resident) = state.workers.get_mut(&worker) {
                    resident.queued_on = Some(workplace);
                }
                false
            }
        };
        if !seated {
            tracing::debug!(worker = %worker, workplace = %workplace, "Queued for workplace");
            wake.notified().await;
        }

        tracing::debug!(worker = %worker, workplace = %workplace, "Entered");
        Ok(WorkPermit {
            shared: Arc::clone(&self.shared),
            grant: Some(Grant {
                worker,
                workplace,
                station,
                handover: None,
                checked_in: false,
            }),
        })
    }

    pub fn admission_bound(&self) -> usize {
        self.shared.bound
    }

    pub fn workplace_count(&self) -> usize {
        self.shared.stations.len()
    }

    /// Consistent snapshot of occupancy, queues and pending switches.
    pub fn snapshot(&self) -> Result<OccupancySnapshot, WorkshopError> {
        let state = self.shared.lock()?;
        Ok(OccupancySnapshot {
            residents: state.admission.residents(),
            waiting_admission: state.admission.waiting(),
            holders: state
                .table
                .ids()
                .map(|id| (id, state.table.holder(id)))
                .collect(),
            queue_depths: state
                .table
                .ids()
                .map(|id| (id, state.table.queue_depth(id)))
                .collect(),
            pending_switches: state.edges.clone(),
        })
    }
}

impl std::fmt::Debug for Workshop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workshop")
            .field("workplaces", &self.shared.stations.len())
            .field("admission_bound", &self.shared.bound)
            .finish()
    }
}

/// Point-in-time view of the workshop, taken under the coordinator lock.
#[derive(Debug, Clone)]
pub struct OccupancySnapshot {
    pub residents: usize,
    pub waiting_admission: usize,
    pub holders: HashMap<WorkplaceId, Option<WorkerId>>,
    pub queue_depths: HashMap<WorkplaceId, usize>,
    pub pending_switches: HashMap<WorkplaceId, WorkplaceId>,
}

struct Grant {
    worker: WorkerId,
    workplace: WorkplaceId,
    station: Arc<dyn Workplace>,
    /// Present after a cycle grant until the barrier has been passed.
    handover: Option<Arc<Handover>>,
    /// Whether this member has already arrived at `handover`.
    checked_in: bool,
}

impl Grant {
    /// Arrive at a still-pending handover without waiting, so the rest of
    /// the group is not stranded when this member moves on before working.
    fn check_in_pending(&mut self) {
        if let Some(barrier) = self.handover.take() {
            if !self.checked_in {
                barrier.arrive();
            }
            self.checked_in = false;
        }
    }
}

enum SwitchOutcome {
    Granted(Option<Arc<Handover>>),
    Parked(Arc<Notify>),
}

/// Exclusive occupancy of one workplace, held from `enter` until `leave` or
/// a switch away.
///
/// Dropping a permit without calling [`leave`](WorkPermit::leave) leaves the
/// workplace occupied for good and is reported as an error.
pub struct WorkPermit {
    shared: Arc<Shared>,
    grant: Option<Grant>,
}

impl WorkPermit {
    pub fn worker_id(&self) -> Option<WorkerId> {
        self.grant.as_ref().map(|g| g.worker)
    }

    pub fn workplace_id(&self) -> Option<WorkplaceId> {
        self.grant.as_ref().map(|g| g.workplace)
    }

    /// Run the workplace's opaque work routine.
    ///
    /// If this permit was just granted through a cycle, the first call
    /// arrives at the group's handover barrier and waits until every member
    /// has arrived - no member starts using its new workplace before every
    /// old owner has stopped using its previous one. Later calls pass
    /// through directly.
    pub async fn work(&mut self) -> Result<(), WorkshopError> {
        let grant = self.grant.as_mut().ok_or(WorkshopError::PermitConsumed)?;

        if let Some(barrier) = grant.handover.as_ref().map(Arc::clone) {
            if !grant.checked_in {
                grant.checked_in = true;
                tracing::debug!(
                    worker = %grant.worker,
                    workplace = %grant.workplace,
                    "Arrived at handover barrier"
                );
                barrier.arrive();
            }
            barrier.completed().await?;
            grant.handover = None;
            grant.checked_in = false;
        }

        grant.station.work().await;
        Ok(())
    }

    /// Move to another workplace without releasing the current one first.
    ///
    /// Requesting the currently held workplace is a no-op. A vacant target is
    /// granted immediately and the old workplace released. Otherwise the
    /// request joins the swap graph: a chain parks this worker on the
    /// target's FIFO queue; a cycle grants every member simultaneously and
    /// the next [`work`](WorkPermit::work) call synchronizes on the group's
    /// handover barrier.
    ///
    /// On error the permit and all shared state are left untouched.
    pub async fn switch_to(&mut self, target: WorkplaceId) -> Result<(), WorkshopError> {
        let station = self
            .shared
            .stations
            .get(&target)
            .cloned()
            .ok_or(WorkshopError::UnknownWorkplace(target))?;

        let grant = self.grant.as_mut().ok_or(WorkshopError::PermitConsumed)?;
        if grant.workplace == target {
            return Ok(());
        }

        let worker = grant.worker;
        let source = grant.workplace;
        grant.check_in_pending();

        let outcome = {
            let mut guard = self.shared.lock()?;
            let state = &mut *guard;

            let resolution = {
                let (edges, table) = (&state.edges, &state.table);
                classify(edges, |w| table.is_vacant(w), source, target)
            };

            match resolution {
                Resolution::Grant => {
                    state.table.assign(target, worker);
                    if let Some(resident) = state.workers.get_mut(&worker) {
                        resident.at = Some(target);
                    }
                    state.release(source);
                    tracing::debug!(
                        worker = %worker,
                        from = %source,
                        to = %target,
                        "Switched to vacant workplace"
                    );
                    SwitchOutcome::Granted(None)
                }
                Resolution::Cycle(members) => {
                    tracing::debug!(worker = %worker, cycle = ?members, "Resolving switch cycle");
                    let barrier = state.resolve_cycle(&members, worker);
                    SwitchOutcome::Granted(Some(barrier))
                }
                Resolution::Chain => {
                    state.edges.insert(source, target);
                    state.table.enqueue(target, worker);
                    match state.workers.get_mut(&worker) {
                        Some(resident) => {
                            resident.queued_on = Some(target);
                            SwitchOutcome::Parked(Arc::clone(&resident.wake))
                        }
                        None => {
                            debug_assert!(false, "switching worker not resident");
                            tracing::error!(worker = %worker, "Bug: switching worker not resident");
                            return Err(WorkshopError::StatePoisoned);
                        }
                    }
                }
            }
        };

        let handover = match outcome {
            SwitchOutcome::Granted(handover) => handover,
            SwitchOutcome::Parked(wake) => {
                tracing::debug!(worker = %worker, from = %source, to = %target, "Queued for switch");
                wake.notified().await;
                let mut state = self.shared.lock()?;
                state
                    .workers
                    .get_mut(&worker)
                    .and_then(|resident| resident.handover.take())
            }
        };

        grant.workplace = target;
        grant.station = station;
        grant.handover = handover;
        grant.checked_in = false;
        tracing::debug!(worker = %worker, workplace = %target, "Switched");
        Ok(())
    }

    /// Release the current workplace and exit admission accounting.
    /// Never suspends.
    pub fn leave(mut self) -> Result<(), WorkshopError> {
        let Some(mut grant) = self.grant.take() else {
            return Err(WorkshopError::PermitConsumed);
        };
        grant.check_in_pending();

        let mut state = self.shared.lock()?;
        state.release(grant.workplace);
        if let Some(next) = state.admission.depart() {
            if let Some(resident) = state.workers.get(&next) {
                resident.wake.notify_one();
            }
        }
        state.workers.remove(&grant.worker);
        tracing::debug!(worker = %grant.worker, workplace = %grant.workplace, "Left the workshop");
        Ok(())
    }
}

impl std::fmt::Debug for WorkPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkPermit")
            .field("worker", &self.grant.as_ref().map(|g| g.worker))
            .field("workplace", &self.grant.as_ref().map(|g| g.workplace))
            .finish()
    }
}

impl Drop for WorkPermit {
    fn drop(&mut self) {
        if let Some(grant) = &self.grant {
            tracing::error!(
                worker = %grant.worker,
                workplace = %grant.workplace,
                "WorkPermit dropped without leave - workplace stays occupied"
            );
        }
    }
}
