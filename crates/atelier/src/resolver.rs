//! Swap-graph resolver: classifies a switch request against the pending edges.
//!
//! Each workplace whose holder has an unresolved switch request contributes
//! one outgoing edge (source workplace -> requested workplace). Because every
//! cycle is resolved the moment it forms, the standing edge set is always
//! acyclic, so a successor walk terminates.
//!
//! Classification is a pure function over the adjacency map so it can be
//! tested without any coordinator state. The caller is responsible for the
//! self-request check: a request for the currently held workplace must short
//! circuit before classification, otherwise it reads as a length-1 cycle.

use std::collections::HashMap;

use crate::workplace::WorkplaceId;

/// Outcome of classifying `source -> target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Target is vacant: grant immediately, release the source.
    Grant,
    /// The successor walk ended at a workplace with no outgoing edge. The
    /// requester queues on the target; ordinary sequential releases
    /// propagate the chain.
    Chain,
    /// The successor walk returned to the source. Workplaces in request
    /// order: the holder of `members[i]` has requested `members[(i + 1) % n]`.
    Cycle(Vec<WorkplaceId>),
}

/// Classify the switch request `source -> target`.
///
/// `edges` must not yet contain the requester's own edge; `vacant` reports
/// whether a workplace currently has no holder. A vacant workplace can have
/// no inbound edge (its would-be requester was granted immediately), so the
/// vacancy check fully covers the free-grant case.
pub(crate) fn classify(
    edges: &HashMap<WorkplaceId, WorkplaceId>,
    vacant: impl Fn(WorkplaceId) -> bool,
    source: WorkplaceId,
    target: WorkplaceId,
) -> Resolution {
    debug_assert_ne!(source, target, "self-request must be handled by caller");

    if vacant(target) {
        return Resolution::Grant;
    }

    let mut members = vec![source];
    let mut cursor = target;
    loop {
        if cursor == source {
            return Resolution::Cycle(members);
        }
        match edges.get(&cursor) {
            Some(&next) => {
                members.push(cursor);
                cursor = next;
            }
            None => return Resolution::Chain,
        }
    }
}
