//! Workshop error types.
//!
//! Usage violations are detected before any state mutation and leave shared
//! state untouched. Coordination failures (an abandoned parked wait) are
//! fatal to the operation; no rollback is attempted.

use crate::workplace::WorkplaceId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkshopError {
    #[error("Unknown workplace: {0}")]
    UnknownWorkplace(WorkplaceId),

    #[error("Duplicate workplace: {0}")]
    DuplicateWorkplace(WorkplaceId),

    #[error("Admission bound {bound} below workplace count {workplaces}")]
    AdmissionBoundTooSmall { bound: usize, workplaces: usize },

    /// A permit whose grant is gone. Ownership makes this unreachable through
    /// the public API (`leave` consumes the permit); kept as a guard so an
    /// internal accounting slip surfaces as an error instead of a panic.
    #[error("Permit already consumed")]
    PermitConsumed,

    #[error("Coordinator state poisoned")]
    StatePoisoned,

    /// A parked wait whose wake channel closed underneath it. The barrier
    /// owns its own sender, so this, too, only fires on an internal bug.
    #[error("Interrupted while parked: {0}")]
    Interrupted(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WorkshopError::UnknownWorkplace(WorkplaceId::new(3));
        assert_eq!(format!("{}", err), "Unknown workplace: 3");

        let err = WorkshopError::AdmissionBoundTooSmall {
            bound: 2,
            workplaces: 5,
        };
        assert_eq!(
            format!("{}", err),
            "Admission bound 2 below workplace count 5"
        );

        let err = WorkshopError::PermitConsumed;
        assert_eq!(format!("{}", err), "Permit already consumed");
    }
}
