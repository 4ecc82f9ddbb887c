//! core::registration
//!
//! The registration record: one row of the registration ledger.
//!
//! # Lifecycle
//!
//! - Created by enroll with no grade (in progress)
//! - Mutated only by grade assignment
//! - Deleted only by drop, and only while the grade is still absent
//!
//! At most one registration exists per (student, offering) pair; the store
//! enforces this as a uniqueness constraint.

use serde::{Deserialize, Serialize};

use super::types::{Grade, OfferingId, RegistrationId, StudentId, UtcTimestamp};

/// A registration of a student in an offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub student: StudentId,
    pub offering: OfferingId,
    /// `None` while the course is in progress.
    pub grade: Option<Grade>,
    pub created_at: UtcTimestamp,
}

impl Registration {
    /// An active registration has no grade yet.
    pub fn is_active(&self) -> bool {
        self.grade.is_none()
    }

    /// A graded registration is terminal: it may be corrected by faculty but
    /// never dropped.
    pub fn is_graded(&self) -> bool {
        self.grade.is_some()
    }
}
