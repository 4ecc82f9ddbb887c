//! engine::error
//!
//! Failure taxonomy for engine operations.
//!
//! Every engine operation returns `Result<_, RegistrationError>`. Each
//! variant belongs to exactly one [`FailureClass`]:
//!
//! | Class | Variants | Caller action |
//! |-------|----------|---------------|
//! | `Validation` | `PrerequisiteNotMet`, `TimeConflict`, `CapacityExceeded`, `AlreadyEnrolled`, `AlreadyGraded`, `InvalidGrade`, `InvalidCapacity`, `CapacityBelowEnrollment`, `PrerequisiteInUse` | Show verbatim |
//! | `Authorization` | `NotOwner`, `NotAuthorized` | Show masked text |
//! | `NotFound` | `NotFound` | Refresh and retry |
//! | `Transient` | `Unavailable` | Retry with backoff |
//! | `Internal` | `Internal` | Report; retrying cannot help |
//!
//! The `Display` text is for logs and may name storage details.
//! [`RegistrationError::user_message`] is the only text meant for end users.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{CourseId, Grade, OfferingId, RegistrationId, StudentId};
use crate::store::{LockError, StoreError};

/// Broad failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Validation,
    Authorization,
    NotFound,
    Transient,
    Internal,
}

/// Specific failure kinds, one per [`RegistrationError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PrerequisiteNotMet,
    TimeConflict,
    CapacityExceeded,
    AlreadyEnrolled,
    AlreadyGraded,
    InvalidGrade,
    InvalidCapacity,
    CapacityBelowEnrollment,
    PrerequisiteInUse,
    NotOwner,
    NotAuthorized,
    NotFound,
    Unavailable,
    Internal,
}

impl FailureKind {
    pub fn class(self) -> FailureClass {
        match self {
            FailureKind::PrerequisiteNotMet
            | FailureKind::TimeConflict
            | FailureKind::CapacityExceeded
            | FailureKind::AlreadyEnrolled
            | FailureKind::AlreadyGraded
            | FailureKind::InvalidGrade
            | FailureKind::InvalidCapacity
            | FailureKind::CapacityBelowEnrollment
            | FailureKind::PrerequisiteInUse => FailureClass::Validation,
            FailureKind::NotOwner | FailureKind::NotAuthorized => FailureClass::Authorization,
            FailureKind::NotFound => FailureClass::NotFound,
            FailureKind::Unavailable => FailureClass::Transient,
            FailureKind::Internal => FailureClass::Internal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::PrerequisiteNotMet => "prerequisite_not_met",
            FailureKind::TimeConflict => "time_conflict",
            FailureKind::CapacityExceeded => "capacity_exceeded",
            FailureKind::AlreadyEnrolled => "already_enrolled",
            FailureKind::AlreadyGraded => "already_graded",
            FailureKind::InvalidGrade => "invalid_grade",
            FailureKind::InvalidCapacity => "invalid_capacity",
            FailureKind::CapacityBelowEnrollment => "capacity_below_enrollment",
            FailureKind::PrerequisiteInUse => "prerequisite_in_use",
            FailureKind::NotOwner => "not_owner",
            FailureKind::NotAuthorized => "not_authorized",
            FailureKind::NotFound => "not_found",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a `NotFound` failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Student(StudentId),
    Offering(OfferingId),
    Registration(RegistrationId),
}

impl Missing {
    /// Whether existence of this record is private to its owner.
    fn is_protected(self) -> bool {
        !matches!(self, Missing::Offering(_))
    }
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Student(id) => write!(f, "student {id}"),
            Missing::Offering(id) => write!(f, "offering {id}"),
            Missing::Registration(id) => write!(f, "registration {id}"),
        }
    }
}

/// Errors from engine operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The student lacks a passing grade in one or more required courses.
    #[error("course {course} requires passing grades in {}", join(.missing))]
    PrerequisiteNotMet {
        course: CourseId,
        missing: Vec<CourseId>,
    },

    /// The target offering overlaps an active registration in the same semester.
    #[error("offering {offering} overlaps offering {conflicting}")]
    TimeConflict {
        offering: OfferingId,
        conflicting: OfferingId,
    },

    /// The offering is full.
    #[error("offering {offering} is full ({capacity} seats)")]
    CapacityExceeded { offering: OfferingId, capacity: u32 },

    /// The student already holds a registration in the offering.
    #[error("already enrolled as registration {registration}")]
    AlreadyEnrolled { registration: RegistrationId },

    /// Drop attempted on a graded registration.
    #[error("registration {registration} is graded {grade} and cannot be dropped")]
    AlreadyGraded {
        registration: RegistrationId,
        grade: Grade,
    },

    /// Grade token outside the fixed enumeration.
    #[error("invalid grade '{0}'")]
    InvalidGrade(String),

    /// Capacity must be positive.
    #[error("capacity must be at least 1, got {capacity}")]
    InvalidCapacity { capacity: u32 },

    /// New capacity is below the current registration count.
    #[error("capacity {capacity} is below the {enrolled} current registrations")]
    CapacityBelowEnrollment { capacity: u32, enrolled: u32 },

    /// A grade change would strip a prerequisite from active registrations.
    #[error("registration {registration} is a prerequisite for offering(s) {}", join(.dependents))]
    PrerequisiteInUse {
        registration: RegistrationId,
        dependents: Vec<OfferingId>,
    },

    /// The principal does not own the registration.
    #[error("principal does not own the registration")]
    NotOwner,

    /// The principal's role does not permit the operation.
    #[error("principal is not authorized for this operation")]
    NotAuthorized,

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(Missing),

    /// Lock timeout or storage failure. The operation left no trace.
    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    /// Stored state violates an invariant. Retrying cannot help.
    #[error("internal error: {0}")]
    Internal(String),
}

fn join<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RegistrationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RegistrationError::PrerequisiteNotMet { .. } => FailureKind::PrerequisiteNotMet,
            RegistrationError::TimeConflict { .. } => FailureKind::TimeConflict,
            RegistrationError::CapacityExceeded { .. } => FailureKind::CapacityExceeded,
            RegistrationError::AlreadyEnrolled { .. } => FailureKind::AlreadyEnrolled,
            RegistrationError::AlreadyGraded { .. } => FailureKind::AlreadyGraded,
            RegistrationError::InvalidGrade(_) => FailureKind::InvalidGrade,
            RegistrationError::InvalidCapacity { .. } => FailureKind::InvalidCapacity,
            RegistrationError::CapacityBelowEnrollment { .. } => {
                FailureKind::CapacityBelowEnrollment
            }
            RegistrationError::PrerequisiteInUse { .. } => FailureKind::PrerequisiteInUse,
            RegistrationError::NotOwner => FailureKind::NotOwner,
            RegistrationError::NotAuthorized => FailureKind::NotAuthorized,
            RegistrationError::NotFound(_) => FailureKind::NotFound,
            RegistrationError::Unavailable(_) => FailureKind::Unavailable,
            RegistrationError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn class(&self) -> FailureClass {
        self.kind().class()
    }

    /// NotFound is retryable by the user, Transient by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            FailureClass::NotFound | FailureClass::Transient
        )
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// True when the caller must not learn whether the record exists.
    ///
    /// Masked failures share one user message and one CLI exit status.
    pub fn is_masked(&self) -> bool {
        match self {
            RegistrationError::NotOwner | RegistrationError::NotAuthorized => true,
            RegistrationError::NotFound(missing) => missing.is_protected(),
            _ => false,
        }
    }

    /// Text safe to show an end user.
    ///
    /// Authorization failures and misses on protected records share one
    /// message, so the text never reveals whether a record exists.
    pub fn user_message(&self) -> String {
        const NO_ACCESS: &str = "No such record, or you do not have access to it.";
        match self {
            RegistrationError::PrerequisiteNotMet { missing, .. } => format!(
                "Prerequisites not met: a passing grade is required in course(s) {}.",
                join(missing)
            ),
            RegistrationError::TimeConflict { conflicting, .. } => format!(
                "This offering's meeting time conflicts with offering {conflicting}."
            ),
            RegistrationError::CapacityExceeded { .. } => "This offering is full.".to_string(),
            RegistrationError::AlreadyEnrolled { .. } => {
                "You are already registered in this offering.".to_string()
            }
            RegistrationError::AlreadyGraded { .. } => {
                "This registration has a grade and can no longer be dropped.".to_string()
            }
            RegistrationError::InvalidGrade(token) => {
                format!("'{token}' is not a valid grade (expected one of A, B, C, D, F, W, I).")
            }
            RegistrationError::InvalidCapacity { .. } => {
                "Capacity must be at least 1.".to_string()
            }
            RegistrationError::CapacityBelowEnrollment { enrolled, .. } => format!(
                "Capacity cannot be set below the {enrolled} students already registered."
            ),
            RegistrationError::PrerequisiteInUse { dependents, .. } => format!(
                "This grade satisfies a prerequisite for active registration(s) in offering(s) {}; \
                 drop those first.",
                join(dependents)
            ),
            RegistrationError::NotOwner | RegistrationError::NotAuthorized => {
                NO_ACCESS.to_string()
            }
            RegistrationError::NotFound(missing) if missing.is_protected() => {
                NO_ACCESS.to_string()
            }
            RegistrationError::NotFound(missing) => format!("No such {missing}."),
            RegistrationError::Unavailable(_) => {
                "The registrar is busy. Please try again.".to_string()
            }
            RegistrationError::Internal(_) => {
                "The registrar hit an internal error. Please contact an administrator.".to_string()
            }
        }
    }
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RegistrationNotFound(id) => {
                RegistrationError::NotFound(Missing::Registration(id))
            }
            StoreError::OfferingNotFound(id) => RegistrationError::NotFound(Missing::Offering(id)),
            StoreError::StudentNotFound(id) => RegistrationError::NotFound(Missing::Student(id)),
            StoreError::UniqueViolation { existing, .. } => RegistrationError::AlreadyEnrolled {
                registration: existing,
            },
            StoreError::Unavailable(reason) => RegistrationError::Unavailable(reason),
            other => RegistrationError::Internal(other.to_string()),
        }
    }
}

impl From<LockError> for RegistrationError {
    fn from(err: LockError) -> Self {
        RegistrationError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn all() -> Vec<RegistrationError> {
        vec![
            RegistrationError::PrerequisiteNotMet {
                course: CourseId::new(2),
                missing: vec![CourseId::new(1)],
            },
            RegistrationError::TimeConflict {
                offering: OfferingId::new(1),
                conflicting: OfferingId::new(2),
            },
            RegistrationError::CapacityExceeded {
                offering: OfferingId::new(1),
                capacity: 1,
            },
            RegistrationError::AlreadyEnrolled {
                registration: RegistrationId::new(1),
            },
            RegistrationError::AlreadyGraded {
                registration: RegistrationId::new(1),
                grade: Grade::B,
            },
            RegistrationError::InvalidGrade("Z".into()),
            RegistrationError::InvalidCapacity { capacity: 0 },
            RegistrationError::CapacityBelowEnrollment {
                capacity: 1,
                enrolled: 2,
            },
            RegistrationError::PrerequisiteInUse {
                registration: RegistrationId::new(1),
                dependents: vec![OfferingId::new(2)],
            },
            RegistrationError::NotOwner,
            RegistrationError::NotAuthorized,
            RegistrationError::NotFound(Missing::Registration(RegistrationId::new(9))),
            RegistrationError::Unavailable("disk on fire".into()),
            RegistrationError::Internal("dangling offering".into()),
        ]
    }

    #[test]
    fn classes() {
        let classes: Vec<FailureClass> = all().iter().map(RegistrationError::class).collect();
        assert_eq!(
            classes.iter().filter(|c| **c == FailureClass::Validation).count(),
            9
        );
        assert_eq!(
            classes
                .iter()
                .filter(|c| **c == FailureClass::Authorization)
                .count(),
            2
        );
        assert!(RegistrationError::Unavailable(String::new()).is_transient());
        assert!(!RegistrationError::Internal(String::new()).is_transient());
    }

    #[test]
    fn masked_failures_cover_authorization_and_protected_lookups() {
        let masked: Vec<FailureKind> = all()
            .iter()
            .filter(|e| e.is_masked())
            .map(RegistrationError::kind)
            .collect();
        assert_eq!(
            masked,
            vec![
                FailureKind::NotOwner,
                FailureKind::NotAuthorized,
                FailureKind::NotFound
            ]
        );
        assert!(!RegistrationError::NotFound(Missing::Offering(OfferingId::new(1))).is_masked());
    }

    #[test]
    fn retryable_only_for_not_found_and_transient() {
        for err in all() {
            let expected = matches!(
                err,
                RegistrationError::NotFound(_) | RegistrationError::Unavailable(_)
            );
            assert_eq!(err.is_retryable(), expected, "{err:?}");
        }
    }

    #[test]
    fn authorization_and_protected_miss_share_text() {
        let missing = RegistrationError::NotFound(Missing::Registration(RegistrationId::new(9)));
        assert_eq!(
            RegistrationError::NotOwner.user_message(),
            missing.user_message()
        );
        assert_eq!(
            RegistrationError::NotAuthorized.user_message(),
            missing.user_message()
        );
    }

    #[test]
    fn offering_miss_is_public() {
        let err = RegistrationError::NotFound(Missing::Offering(OfferingId::new(4)));
        assert_eq!(err.user_message(), "No such offering 4.");
    }

    #[test]
    fn storage_text_never_reaches_users() {
        let err = RegistrationError::Unavailable("disk on fire".into());
        assert!(!err.user_message().contains("disk"));
        assert!(err.to_string().contains("disk"));
        let err = RegistrationError::Internal("dangling offering".into());
        assert!(!err.user_message().contains("dangling"));
    }

    #[test]
    fn store_errors_map_to_kinds() {
        let err: RegistrationError = StoreError::UniqueViolation {
            student: StudentId::new(1),
            offering: OfferingId::new(1),
            existing: RegistrationId::new(5),
        }
        .into();
        assert_eq!(
            err,
            RegistrationError::AlreadyEnrolled {
                registration: RegistrationId::new(5)
            }
        );

        let err: RegistrationError = StoreError::Unavailable("disk full".into()).into();
        assert_eq!(err, RegistrationError::Unavailable("disk full".into()));
    }

    #[test]
    fn corrupt_state_is_not_retryable() {
        let errors: Vec<RegistrationError> = vec![
            StoreError::Corrupt("registration 3 has a dangling reference".into()).into(),
            StoreError::Catalog(crate::core::catalog::CatalogError::CourseNotFound(
                CourseId::new(7),
            ))
            .into(),
        ];
        for err in errors {
            assert_eq!(err.kind(), FailureKind::Internal);
            assert!(!err.is_transient());
            assert!(!err.is_retryable());
            assert!(!err.user_message().contains("dangling"));
        }
    }

    #[test]
    fn lock_timeout_is_transient() {
        let err: RegistrationError = LockError::Timeout {
            keys: "offering:1".into(),
            waited: Duration::from_millis(5),
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::CapacityBelowEnrollment).unwrap();
        assert_eq!(json, "\"capacity_below_enrollment\"");
        assert_eq!(FailureKind::TimeConflict.to_string(), "time_conflict");
    }
}
