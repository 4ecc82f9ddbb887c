//! store
//!
//! Data access for the registration engine.
//!
//! # Modules
//!
//! - [`memory`] - Transactional in-memory record store
//! - [`lock`] - Keyed exclusive locks with deadlines
//! - [`file`] - JSON state file persistence under an OS file lock
//!
//! # Architecture
//!
//! The store is a record store, not a rule engine. It enforces only what a
//! relational schema would: row existence, referential integrity, and the
//! (student, offering) uniqueness constraint. Business rules (capacity,
//! time conflicts, prerequisites, ownership) live in [`crate::engine`].
//!
//! Every mutation reaches the store as a [`Mutation`] batch passed to
//! [`RegistrationStore::apply`]. A batch is all-or-nothing: either every
//! mutation is applied, or the store is left exactly as it was.
//!
//! # Example
//!
//! ```ignore
//! use registrar::store::{Mutation, RegistrationStore};
//!
//! let applied = store.apply(&[Mutation::Insert { student, offering, created_at }])?;
//! ```

pub mod file;
pub mod lock;
pub mod memory;

pub use file::{LockedState, StateFile, StateFileError};
pub use lock::{LockError, LockGuard, LockKey, LockTable};
pub use memory::{MemoryStore, Snapshot};

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::catalog::{CatalogError, Course, Offering, Semester};
use crate::core::policy::PrerequisiteMode;
use crate::core::registration::Registration;
use crate::core::roster::{Faculty, RosterError, Student};
use crate::core::types::{
    CourseId, FacultyId, Grade, OfferingId, RegistrationId, SemesterId, StudentId, UtcTimestamp,
};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced registration does not exist.
    #[error("registration {0} not found")]
    RegistrationNotFound(RegistrationId),

    /// The referenced offering does not exist.
    #[error("offering {0} not found")]
    OfferingNotFound(OfferingId),

    /// The referenced student does not exist.
    #[error("student {0} not found")]
    StudentNotFound(StudentId),

    /// The referenced faculty member does not exist.
    #[error("faculty {0} not found")]
    FacultyNotFound(FacultyId),

    /// Uniqueness constraint on (student, offering) violated.
    #[error("student {student} already holds registration {existing} in offering {offering}")]
    UniqueViolation {
        student: StudentId,
        offering: OfferingId,
        existing: RegistrationId,
    },

    /// A row cannot be removed while other rows reference it.
    #[error("offering {offering} is referenced by {registrations} registration(s)")]
    OfferingInUse {
        offering: OfferingId,
        registrations: usize,
    },

    /// Catalog validation failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Roster validation failed.
    #[error("roster error: {0}")]
    Roster(#[from] RosterError),

    /// The backing storage could not complete the request.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Persisted state is inconsistent.
    #[error("corrupt state: {0}")]
    Corrupt(String),
}

/// A single ledger or catalog mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a registration with no grade. The store assigns the id.
    Insert {
        student: StudentId,
        offering: OfferingId,
        created_at: UtcTimestamp,
    },
    /// Delete a registration.
    Delete { registration: RegistrationId },
    /// Set (or overwrite) a registration's grade.
    SetGrade {
        registration: RegistrationId,
        grade: Grade,
    },
    /// Change an offering's capacity.
    SetCapacity { offering: OfferingId, capacity: u32 },
}

/// The effect of an applied mutation, with enough before-state to reverse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Inserted(Registration),
    Deleted(Registration),
    GradeSet {
        previous: Option<Grade>,
        registration: Registration,
    },
    CapacitySet {
        offering: OfferingId,
        previous: u32,
        capacity: u32,
    },
}

/// A registration joined with its offering and course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDetail {
    pub registration: Registration,
    pub offering: Offering,
    pub course: Course,
}

/// Per-student credit buckets, maintained incrementally by the store.
///
/// Buckets are policy-free: credits are filed under the raw grade (or under
/// in-progress when ungraded). Aggregation views apply the grading policy on
/// top, so a policy change never invalidates maintained totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentTotals {
    pub in_progress_credits: u32,
    pub credits_by_grade: BTreeMap<Grade, u32>,
}

impl StudentTotals {
    /// File `credits` under `grade`.
    pub fn add(&mut self, grade: Option<Grade>, credits: u32) {
        match grade {
            None => self.in_progress_credits += credits,
            Some(g) => *self.credits_by_grade.entry(g).or_insert(0) += credits,
        }
    }

    /// Remove `credits` previously filed under `grade`.
    pub fn remove(&mut self, grade: Option<Grade>, credits: u32) {
        match grade {
            None => self.in_progress_credits = self.in_progress_credits.saturating_sub(credits),
            Some(g) => {
                if let Some(bucket) = self.credits_by_grade.get_mut(&g) {
                    *bucket = bucket.saturating_sub(credits);
                    if *bucket == 0 {
                        self.credits_by_grade.remove(&g);
                    }
                }
            }
        }
    }

    /// Build buckets from scratch out of a student's history.
    pub fn from_history(history: &[RegistrationDetail]) -> Self {
        let mut totals = Self::default();
        for detail in history {
            totals.add(detail.registration.grade, detail.course.credits);
        }
        totals
    }
}

/// The data-access seam used by the engine and the aggregation views.
///
/// Reads return owned values: a caller never holds a borrow into the store
/// across a mutation. Implementations must provide read-committed isolation:
/// every read reflects all batches whose `apply` has returned.
pub trait RegistrationStore: Send + Sync {
    fn offering(&self, id: OfferingId) -> Result<Option<Offering>, StoreError>;

    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError>;

    fn semester(&self, id: SemesterId) -> Result<Option<Semester>, StoreError>;

    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;

    fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, StoreError>;

    /// All offerings, ordered by id.
    fn offerings(&self) -> Result<Vec<Offering>, StoreError>;

    /// Prerequisites of a course, direct or transitive.
    fn prerequisites_of(
        &self,
        course: CourseId,
        mode: PrerequisiteMode,
    ) -> Result<Vec<CourseId>, StoreError>;

    fn registration(&self, id: RegistrationId) -> Result<Option<Registration>, StoreError>;

    /// The registration for a (student, offering) pair, if any.
    fn registration_for(
        &self,
        student: StudentId,
        offering: OfferingId,
    ) -> Result<Option<Registration>, StoreError>;

    /// Every registration the student holds, joined with offering and course.
    fn student_history(&self, student: StudentId) -> Result<Vec<RegistrationDetail>, StoreError>;

    /// Every registration in an offering.
    fn offering_registrations(&self, offering: OfferingId)
        -> Result<Vec<Registration>, StoreError>;

    /// Number of registration rows for an offering.
    fn offering_count(&self, offering: OfferingId) -> Result<u32, StoreError>;

    /// Incrementally maintained credit buckets for a student.
    fn student_totals(&self, student: StudentId) -> Result<StudentTotals, StoreError>;

    /// Apply a batch atomically.
    fn apply(&self, batch: &[Mutation]) -> Result<Vec<Applied>, StoreError>;
}

impl<T: RegistrationStore + ?Sized> RegistrationStore for &T {
    fn offering(&self, id: OfferingId) -> Result<Option<Offering>, StoreError> {
        (**self).offering(id)
    }

    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        (**self).course(id)
    }

    fn semester(&self, id: SemesterId) -> Result<Option<Semester>, StoreError> {
        (**self).semester(id)
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        (**self).student(id)
    }

    fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, StoreError> {
        (**self).faculty(id)
    }

    fn offerings(&self) -> Result<Vec<Offering>, StoreError> {
        (**self).offerings()
    }

    fn prerequisites_of(
        &self,
        course: CourseId,
        mode: PrerequisiteMode,
    ) -> Result<Vec<CourseId>, StoreError> {
        (**self).prerequisites_of(course, mode)
    }

    fn registration(&self, id: RegistrationId) -> Result<Option<Registration>, StoreError> {
        (**self).registration(id)
    }

    fn registration_for(
        &self,
        student: StudentId,
        offering: OfferingId,
    ) -> Result<Option<Registration>, StoreError> {
        (**self).registration_for(student, offering)
    }

    fn student_history(&self, student: StudentId) -> Result<Vec<RegistrationDetail>, StoreError> {
        (**self).student_history(student)
    }

    fn offering_registrations(
        &self,
        offering: OfferingId,
    ) -> Result<Vec<Registration>, StoreError> {
        (**self).offering_registrations(offering)
    }

    fn offering_count(&self, offering: OfferingId) -> Result<u32, StoreError> {
        (**self).offering_count(offering)
    }

    fn student_totals(&self, student: StudentId) -> Result<StudentTotals, StoreError> {
        (**self).student_totals(student)
    }

    fn apply(&self, batch: &[Mutation]) -> Result<Vec<Applied>, StoreError> {
        (**self).apply(batch)
    }
}
