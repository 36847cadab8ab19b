//! Post-mutation synchronization.
//!
//! Decides what happens to the local collection after the backend accepted a write:
//! merge the change locally, re-fetch after a delay, or both.

use crate::model::{MutationOp, MutationOutcome};
use crate::store::LocalEdit;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SyncPolicy {
    pub merge_locally: bool,
    /// None disables the follow-up fetch. Zero re-fetches right away.
    pub reload_delay: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct FollowUp {
    pub merge: Option<LocalEdit>,
    pub reload_after: Option<Duration>,
}

/// Failed mutations need no follow-up: nothing was changed locally.
pub(crate) fn follow_up(outcome: &MutationOutcome, policy: SyncPolicy) -> FollowUp {
    let Ok(echo) = &outcome.result else {
        return FollowUp::default();
    };

    let merge = if policy.merge_locally {
        match outcome.op {
            // A create is only merged when the backend told us the assigned id.
            MutationOp::Create | MutationOp::Update => echo.clone().map(LocalEdit::Upsert),
            MutationOp::Delete { id } => Some(LocalEdit::Remove(id)),
        }
    } else {
        None
    };

    FollowUp {
        merge,
        reload_after: policy.reload_delay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, RecordKind};
    use crate::store::StoreError;

    fn rec(id: u64) -> Record {
        Record {
            id,
            name: "n".into(),
            price: "1".into(),
            amount: "1".into(),
        }
    }

    fn outcome(op: MutationOp, result: Result<Option<Record>, StoreError>) -> MutationOutcome {
        MutationOutcome {
            kind: RecordKind::Stocks,
            op,
            result,
        }
    }

    const DEFAULT: SyncPolicy = SyncPolicy {
        merge_locally: true,
        reload_delay: Some(Duration::from_millis(500)),
    };

    #[test]
    fn delete_splices_and_reloads() {
        let f = follow_up(&outcome(MutationOp::Delete { id: 3 }, Ok(None)), DEFAULT);
        assert_eq!(f.merge, Some(LocalEdit::Remove(3)));
        assert_eq!(f.reload_after, Some(Duration::from_millis(500)));
    }

    #[test]
    fn update_merges_echo() {
        let f = follow_up(&outcome(MutationOp::Update, Ok(Some(rec(2)))), DEFAULT);
        assert_eq!(f.merge, Some(LocalEdit::Upsert(rec(2))));
    }

    #[test]
    fn create_without_echo_only_reloads() {
        let f = follow_up(&outcome(MutationOp::Create, Ok(None)), DEFAULT);
        assert_eq!(f.merge, None);
        assert!(f.reload_after.is_some());
    }

    #[test]
    fn failure_does_nothing() {
        let err = StoreError::new("HttpErrorResponse", "boom");
        let f = follow_up(&outcome(MutationOp::Update, Err(err)), DEFAULT);
        assert_eq!(f, FollowUp::default());
    }

    #[test]
    fn policy_switches_are_honoured() {
        let policy = SyncPolicy {
            merge_locally: false,
            reload_delay: None,
        };
        let f = follow_up(&outcome(MutationOp::Delete { id: 1 }, Ok(None)), policy);
        assert_eq!(f, FollowUp::default());
    }
}
