//! Workplace and worker identities, plus the opaque work-routine trait.

use async_trait::async_trait;

/// Stable identity of a workplace, fixed at workshop construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkplaceId(u32);

impl WorkplaceId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for WorkplaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identity of a worker for the duration of one residency.
///
/// UUID v4 avoids confusion with array indices and prevents accidental reuse
/// across enter/leave rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(uuid::Uuid);

impl WorkerId {
    pub(crate) fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A capacity-1 exclusive resource with an opaque work routine.
///
/// The coordinator guarantees at most one worker runs `work` per workplace at
/// any instant; what `work` actually does is external to this crate.
#[async_trait]
pub trait Workplace: Send + Sync {
    fn id(&self) -> WorkplaceId;

    /// The per-workplace work routine, invoked through [`WorkPermit::work`].
    ///
    /// [`WorkPermit::work`]: crate::WorkPermit::work
    async fn work(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workplace_id_roundtrip() {
        let id = WorkplaceId::new(7);
        assert_eq!(id.as_u32(), 7);
        assert_eq!(format!("{id}"), "7");
    }

    #[test]
    fn worker_ids_are_unique() {
        let a = WorkerId::new();
        let b = WorkerId::new();
        assert_ne!(a, b);
    }
}
