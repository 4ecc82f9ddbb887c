//! engine::txn
//!
//! Engine transactions.
//!
//! # Architecture
//!
//! A [`Transaction`] stages store mutations while the engine runs its
//! validators, then hands the whole batch to
//! [`RegistrationStore::apply`](crate::store::RegistrationStore::apply) in
//! one call. Nothing reaches the store before commit, so abandoning a
//! transaction (validator failure, early return, panic) needs no undo.
//!
//! # Phases
//!
//! ```text
//! InProgress --commit ok--> Committed
//!     |
//!     +--commit failed / deadline passed / abort--> RolledBack
//! ```
//!
//! # Invariants
//!
//! - The deadline is checked immediately before the batch is applied
//! - A finished transaction cannot be committed again
//! - A failed commit leaves the store unchanged (the store's batch contract)

use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RegistrationError;
use crate::store::{Applied, Mutation, RegistrationStore};

/// Unique identifier for an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(String);

impl OpId {
    /// Generate a new unique operation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The current phase of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnPhase {
    InProgress,
    Committed,
    RolledBack,
}

impl TxnPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, TxnPhase::Committed | TxnPhase::RolledBack)
    }
}

/// A batch of staged mutations with a deadline.
#[derive(Debug)]
pub struct Transaction {
    op_id: OpId,
    operation: &'static str,
    deadline: Instant,
    staged: Vec<Mutation>,
    phase: TxnPhase,
}

impl Transaction {
    pub fn begin(operation: &'static str, deadline: Instant) -> Self {
        Self {
            op_id: OpId::new(),
            operation,
            deadline,
            staged: Vec::new(),
            phase: TxnPhase::InProgress,
        }
    }

    pub fn op_id(&self) -> &OpId {
        &self.op_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn phase(&self) -> TxnPhase {
        self.phase
    }

    pub fn staged(&self) -> &[Mutation] {
        &self.staged
    }

    pub fn stage(&mut self, mutation: Mutation) -> &mut Self {
        self.staged.push(mutation);
        self
    }

    /// Fail with a transient error once the deadline has passed.
    pub fn check_deadline(&self) -> Result<(), RegistrationError> {
        if Instant::now() >= self.deadline {
            return Err(RegistrationError::Unavailable(format!(
                "{} {} exceeded its deadline",
                self.operation, self.op_id
            )));
        }
        Ok(())
    }

    /// Apply every staged mutation as one batch.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the deadline passed or the store failed
    /// - the mapped store error for constraint violations
    ///
    /// On error the phase becomes `RolledBack` and the store is unchanged.
    pub fn commit<S>(&mut self, store: &S) -> Result<Vec<Applied>, RegistrationError>
    where
        S: RegistrationStore + ?Sized,
    {
        if self.phase.is_finished() {
            return Err(RegistrationError::Unavailable(format!(
                "transaction {} already finished",
                self.op_id
            )));
        }
        if let Err(e) = self.check_deadline() {
            self.phase = TxnPhase::RolledBack;
            return Err(e);
        }
        match store.apply(&self.staged) {
            Ok(applied) => {
                self.phase = TxnPhase::Committed;
                Ok(applied)
            }
            Err(e) => {
                self.phase = TxnPhase::RolledBack;
                Err(e.into())
            }
        }
    }

    /// Discard staged mutations without applying them.
    pub fn abort(&mut self) {
        if !self.phase.is_finished() {
            self.staged.clear();
            self.phase = TxnPhase::RolledBack;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::core::catalog::{NewCourse, NewOffering};
    use crate::core::types::{OfferingId, RegistrationId, StudentId, UtcTimestamp};
    use crate::store::MemoryStore;

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn seeded() -> (MemoryStore, StudentId, OfferingId) {
        let store = MemoryStore::new();
        let dept = store.add_department("Math").unwrap();
        let term = store.add_semester("Spring", 1).unwrap();
        let prof = store.add_faculty("Hilbert", dept).unwrap();
        let course = store
            .add_course(NewCourse {
                title: "Algebra".into(),
                credits: 3,
                department: dept,
                description: String::new(),
            })
            .unwrap();
        let offering = store
            .add_offering(NewOffering {
                course,
                semester: term,
                section: "A".into(),
                faculty: prof,
                max_capacity: 5,
                meeting: None,
            })
            .unwrap();
        let student = store.add_student("Emmy", dept, 2024).unwrap();
        (store, student, offering)
    }

    #[test]
    fn op_ids_are_unique() {
        assert_ne!(OpId::new(), OpId::new());
    }

    #[test]
    fn commit_applies_and_finishes() {
        let (store, student, offering) = seeded();
        let mut txn = Transaction::begin("enroll", later());
        txn.stage(Mutation::Insert {
            student,
            offering,
            created_at: UtcTimestamp::now(),
        });
        let applied = txn.commit(&store).unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(txn.phase(), TxnPhase::Committed);

        // A finished transaction cannot be replayed.
        assert!(txn.commit(&store).is_err());
        assert_eq!(store.offering_registrations(offering).unwrap().len(), 1);
    }

    #[test]
    fn expired_deadline_rolls_back_without_applying() {
        let (store, student, offering) = seeded();
        let mut txn = Transaction::begin("enroll", Instant::now());
        txn.stage(Mutation::Insert {
            student,
            offering,
            created_at: UtcTimestamp::now(),
        });

        let err = txn.commit(&store).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(txn.phase(), TxnPhase::RolledBack);
        assert!(store.offering_registrations(offering).unwrap().is_empty());
    }

    #[test]
    fn store_failure_maps_and_rolls_back() {
        let (store, student, offering) = seeded();
        let before = store.snapshot();
        let mut txn = Transaction::begin("drop", later());
        txn.stage(Mutation::Insert {
            student,
            offering,
            created_at: UtcTimestamp::now(),
        })
        .stage(Mutation::Delete {
            registration: RegistrationId::new(77),
        });

        let err = txn.commit(&store).unwrap_err();
        assert_eq!(err.kind(), crate::engine::FailureKind::NotFound);
        assert_eq!(txn.phase(), TxnPhase::RolledBack);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn abort_discards_staged() {
        let mut txn = Transaction::begin("grade", later());
        txn.stage(Mutation::SetCapacity {
            offering: OfferingId::new(1),
            capacity: 3,
        });
        txn.abort();
        assert!(txn.staged().is_empty());
        assert_eq!(txn.phase(), TxnPhase::RolledBack);
    }
}
