//! engine
//!
//! The registration engine: validates and applies enrollment changes.
//!
//! # Architecture
//!
//! Every mutating operation follows the same lifecycle:
//!
//! ```text
//! Authorize -> Lock -> Read -> Validate -> Stage -> Commit -> Audit
//! ```
//!
//! 1. **Authorize**: check the principal's role against the request
//! 2. **Lock**: acquire the offering and student keys the operation touches
//! 3. **Read**: load the minimal snapshot under the locks
//! 4. **Validate**: run the pure validators in [`validate`], first failure wins
//! 5. **Stage/Commit**: stage store mutations in a [`Transaction`] and apply
//!    them as one batch, after a final deadline check
//! 6. **Audit**: append an [`audit::Event`] for the commit or the rejection
//!
//! # Invariants
//!
//! - Enroll holds both the offering lock and the student lock from the
//!   capacity count until the insert commits, so concurrent enrolls at the
//!   capacity boundary cannot both succeed
//! - No operation waits past its deadline; a timeout is a transient failure
//!   and leaves the store unchanged
//! - The engine keeps no state between calls beyond the store it mutates
//!   and the audit collector
//! - The principal is an explicit argument, never ambient state
//!
//! # Example
//!
//! ```
//! use registrar::core::catalog::{NewCourse, NewOffering};
//! use registrar::core::policy::GradingPolicy;
//! use registrar::engine::{Context, Engine, Principal};
//! use registrar::store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let dept = store.add_department("History").unwrap();
//! let term = store.add_semester("Fall", 1).unwrap();
//! let prof = store.add_faculty("Tuchman", dept).unwrap();
//! let course = store.add_course(NewCourse {
//!     title: "Modern Europe".into(),
//!     credits: 3,
//!     department: dept,
//!     description: String::new(),
//! }).unwrap();
//! let offering = store.add_offering(NewOffering {
//!     course,
//!     semester: term,
//!     section: "01".into(),
//!     faculty: prof,
//!     max_capacity: 30,
//!     meeting: None,
//! }).unwrap();
//! let student = store.add_student("Ada", dept, 2025).unwrap();
//!
//! let engine = Engine::new(store, GradingPolicy::default());
//! let enrolled = engine
//!     .enroll(&Context::new(Principal::Student(student)), student, offering)
//!     .unwrap();
//! assert_eq!(enrolled.seats_remaining, 29);
//! ```

pub mod audit;
pub mod error;
pub mod retry;
pub mod txn;
pub mod validate;

pub use audit::{AuditError, AuditFile, AuditLog, Event};
pub use error::{FailureClass, FailureKind, Missing, RegistrationError};
pub use retry::RetryPolicy;
pub use txn::{OpId, Transaction, TxnPhase};

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::core::config::Config;
use crate::core::policy::GradingPolicy;
use crate::core::registration::Registration;
use crate::core::types::{FacultyId, Grade, OfferingId, RegistrationId, StudentId, UtcTimestamp};
use crate::store::{Applied, LockKey, LockTable, Mutation, RegistrationStore};

/// The role a principal acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

/// The authenticated identity a request acts as.
///
/// Supplied by the caller's authentication layer and trusted as given;
/// ownership is still re-checked on every mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    Student(StudentId),
    Faculty(FacultyId),
    Admin,
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Student(_) => Role::Student,
            Principal::Faculty(_) => Role::Faculty,
            Principal::Admin => Role::Admin,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Student(id) => write!(f, "student:{id}"),
            Principal::Faculty(id) => write!(f, "faculty:{id}"),
            Principal::Admin => f.write_str("admin"),
        }
    }
}

/// Error parsing a principal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid principal '{0}' (expected student:<id>, faculty:<id>, or admin)")]
pub struct InvalidPrincipal(String);

impl FromStr for Principal {
    type Err = InvalidPrincipal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPrincipal(s.to_string());
        let s = s.trim();
        if s.eq_ignore_ascii_case("admin") {
            return Ok(Principal::Admin);
        }
        let (role, id) = s.split_once(':').ok_or_else(invalid)?;
        match role.to_ascii_lowercase().as_str() {
            "student" => id.parse().map(Principal::Student).map_err(|_| invalid()),
            "faculty" => id.parse().map(Principal::Faculty).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// Per-request context.
#[derive(Debug, Clone)]
pub struct Context {
    pub principal: Principal,
    /// Overall budget for the request. Falls back to the engine's lock
    /// timeout when absent.
    pub deadline: Option<Instant>,
}

impl Context {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

/// Successful enroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrolled {
    pub registration: Registration,
    pub seats_remaining: u32,
}

/// Successful drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dropped {
    pub registration: Registration,
    pub seats_remaining: u32,
}

/// Successful grade assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeOutcome {
    /// The registration already had this grade. Nothing was written.
    Unchanged(Registration),
    /// First grade for an in-progress registration.
    Assigned(Registration),
    /// A different grade replaced an earlier one.
    Corrected {
        registration: Registration,
        previous: Grade,
    },
}

impl GradeOutcome {
    pub fn registration(&self) -> &Registration {
        match self {
            GradeOutcome::Unchanged(r) | GradeOutcome::Assigned(r) => r,
            GradeOutcome::Corrected { registration, .. } => registration,
        }
    }
}

/// Successful capacity adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityAdjusted {
    pub offering: OfferingId,
    pub previous: u32,
    pub capacity: u32,
    pub seats_remaining: u32,
}

/// The registration engine.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    locks: LockTable,
    policy: GradingPolicy,
    audit: AuditLog,
    lock_timeout: Duration,
}

impl<S: RegistrationStore> Engine<S> {
    pub fn new(store: S, policy: GradingPolicy) -> Self {
        Self {
            store,
            locks: LockTable::new(),
            policy,
            audit: AuditLog::new(),
            lock_timeout: Duration::from_millis(Config::DEFAULT_LOCK_TIMEOUT_MS),
        }
    }

    /// Build an engine with the configured policy and lock timeout.
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store, config.grading_policy()).with_lock_timeout(config.lock_timeout())
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    fn deadline(&self, ctx: &Context) -> Instant {
        ctx.deadline
            .unwrap_or_else(|| Instant::now() + self.lock_timeout)
    }

    // =========================================================================
    // Enroll
    // =========================================================================

    /// Enroll a student in an offering.
    ///
    /// Allowed for the student themself or an admin. Validators run in the
    /// order prerequisites, time conflict, capacity.
    ///
    /// # Errors
    ///
    /// `NotAuthorized`, `NotFound`, `AlreadyEnrolled`, `PrerequisiteNotMet`,
    /// `TimeConflict`, `CapacityExceeded`, or `Unavailable`.
    pub fn enroll(
        &self,
        ctx: &Context,
        student: StudentId,
        offering: OfferingId,
    ) -> Result<Enrolled, RegistrationError> {
        let mut txn = Transaction::begin("enroll", self.deadline(ctx));
        let span = tracing::info_span!(
            "enroll",
            op_id = %txn.op_id(),
            principal = %ctx.principal,
            %student,
            %offering
        );
        let _enter = span.enter();

        let result = self.enroll_inner(ctx, &mut txn, student, offering);
        self.finish(&mut txn, result)
    }

    fn enroll_inner(
        &self,
        ctx: &Context,
        txn: &mut Transaction,
        student: StudentId,
        offering_id: OfferingId,
    ) -> Result<Enrolled, RegistrationError> {
        match ctx.principal {
            Principal::Student(id) if id == student => {}
            Principal::Admin => {}
            _ => return Err(RegistrationError::NotAuthorized),
        }

        let _guard = self.locks.acquire(
            &[LockKey::Offering(offering_id), LockKey::Student(student)],
            txn.deadline(),
        )?;

        if self.store.student(student)?.is_none() {
            return Err(RegistrationError::NotFound(Missing::Student(student)));
        }
        let offering = self
            .store
            .offering(offering_id)?
            .ok_or(RegistrationError::NotFound(Missing::Offering(offering_id)))?;
        if let Some(existing) = self.store.registration_for(student, offering_id)? {
            return Err(RegistrationError::AlreadyEnrolled {
                registration: existing.id,
            });
        }

        let history = self.store.student_history(student)?;
        let required = self
            .store
            .prerequisites_of(offering.course, self.policy.prerequisite_mode())?;
        validate::check_prerequisites(offering.course, &required, &history, &self.policy)?;
        validate::check_time_conflict(&offering, &history)?;
        let registered = self.store.offering_count(offering_id)?;
        validate::check_capacity(&offering, registered)?;

        txn.stage(Mutation::Insert {
            student,
            offering: offering_id,
            created_at: UtcTimestamp::now(),
        });
        let applied = txn.commit(&self.store)?;
        let registration = inserted(applied)?;

        self.audit.record(Event::enrolled(
            txn.op_id(),
            registration.id,
            student,
            offering_id,
        ));
        let seats_remaining = offering.max_capacity.saturating_sub(registered + 1);
        tracing::info!(registration = %registration.id, seats_remaining, "enrolled");
        Ok(Enrolled {
            registration,
            seats_remaining,
        })
    }

    // =========================================================================
    // Drop
    // =========================================================================

    /// Drop an in-progress registration.
    ///
    /// Allowed for the owning student or an admin.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotOwner`, `AlreadyGraded`, or `Unavailable`.
    pub fn drop_registration(
        &self,
        ctx: &Context,
        registration: RegistrationId,
    ) -> Result<Dropped, RegistrationError> {
        let mut txn = Transaction::begin("drop", self.deadline(ctx));
        let span = tracing::info_span!(
            "drop",
            op_id = %txn.op_id(),
            principal = %ctx.principal,
            %registration
        );
        let _enter = span.enter();

        let result = self.drop_inner(ctx, &mut txn, registration);
        self.finish(&mut txn, result)
    }

    fn drop_inner(
        &self,
        ctx: &Context,
        txn: &mut Transaction,
        id: RegistrationId,
    ) -> Result<Dropped, RegistrationError> {
        let owner_check = |row: &Registration| match ctx.principal {
            Principal::Student(s) if s == row.student => Ok(()),
            Principal::Admin => Ok(()),
            _ => Err(RegistrationError::NotOwner),
        };

        let row = self.load_registration(id)?;
        owner_check(&row)?;

        let _guard = self.locks.acquire(
            &[LockKey::Offering(row.offering), LockKey::Student(row.student)],
            txn.deadline(),
        )?;

        // Re-read under the locks: the row may have been dropped or graded
        // while we waited.
        let row = self.load_registration(id)?;
        owner_check(&row)?;
        if let Some(grade) = row.grade {
            return Err(RegistrationError::AlreadyGraded {
                registration: id,
                grade,
            });
        }

        txn.stage(Mutation::Delete { registration: id });
        txn.commit(&self.store)?;

        let capacity = self
            .store
            .offering(row.offering)?
            .map_or(0, |o| o.max_capacity);
        let seats_remaining = capacity.saturating_sub(self.store.offering_count(row.offering)?);

        self.audit
            .record(Event::dropped(txn.op_id(), id, row.student, row.offering));
        tracing::info!(seats_remaining, "dropped");
        Ok(Dropped {
            registration: row,
            seats_remaining,
        })
    }

    // =========================================================================
    // Assign grade
    // =========================================================================

    /// Set or correct a registration's grade.
    ///
    /// Allowed for the faculty member teaching the offering or an admin.
    /// Re-assigning the current grade is a successful no-op. A correction
    /// that turns a passing grade into a non-passing one is refused while an
    /// active registration of the same student depends on it.
    ///
    /// # Errors
    ///
    /// `InvalidGrade`, `PrerequisiteInUse`, `NotFound`, `NotAuthorized`, or
    /// `Unavailable`.
    pub fn assign_grade(
        &self,
        ctx: &Context,
        registration: RegistrationId,
        grade: &str,
    ) -> Result<GradeOutcome, RegistrationError> {
        let mut txn = Transaction::begin("assign_grade", self.deadline(ctx));
        let span = tracing::info_span!(
            "assign_grade",
            op_id = %txn.op_id(),
            principal = %ctx.principal,
            %registration,
            grade
        );
        let _enter = span.enter();

        let result = self.assign_grade_inner(ctx, &mut txn, registration, grade);
        self.finish(&mut txn, result)
    }

    fn assign_grade_inner(
        &self,
        ctx: &Context,
        txn: &mut Transaction,
        id: RegistrationId,
        token: &str,
    ) -> Result<GradeOutcome, RegistrationError> {
        let grade = validate::parse_grade(token)?;
        if ctx.principal.role() == Role::Student {
            return Err(RegistrationError::NotAuthorized);
        }

        let row = self.load_registration(id)?;
        self.authorize_offering(ctx, row.offering)?;

        let _guard = self.locks.acquire(
            &[LockKey::Offering(row.offering), LockKey::Student(row.student)],
            txn.deadline(),
        )?;

        let row = self.load_registration(id)?;
        if row.grade == Some(grade) {
            tracing::debug!("grade unchanged");
            return Ok(GradeOutcome::Unchanged(row));
        }
        if row.grade.is_some_and(|g| self.policy.is_passing(g)) && !self.policy.is_passing(grade) {
            let history = self.store.student_history(row.student)?;
            let mut requirements = Vec::new();
            for d in history.iter().filter(|d| d.registration.is_active()) {
                let required = self
                    .store
                    .prerequisites_of(d.course.id, self.policy.prerequisite_mode())?;
                requirements.push((d.offering.id, required));
            }
            validate::check_grade_correction(id, grade, &history, &requirements, &self.policy)?;
        }

        txn.stage(Mutation::SetGrade {
            registration: id,
            grade,
        });
        let (previous, registration) = match txn.commit(&self.store)?.pop() {
            Some(Applied::GradeSet {
                previous,
                registration,
            }) => (previous, registration),
            other => {
                return Err(RegistrationError::Internal(format!(
                    "unexpected store result {other:?}"
                )))
            }
        };

        let faculty = match ctx.principal {
            Principal::Faculty(f) => Some(f),
            _ => None,
        };
        self.audit.record(Event::grade_assigned(
            txn.op_id(),
            id,
            previous,
            grade,
            faculty,
        ));
        tracing::info!(previous = ?previous, "grade assigned");

        Ok(match previous {
            None => GradeOutcome::Assigned(registration),
            Some(previous) => GradeOutcome::Corrected {
                registration,
                previous,
            },
        })
    }

    // =========================================================================
    // Adjust capacity
    // =========================================================================

    /// Change an offering's maximum capacity.
    ///
    /// Allowed for the faculty member teaching the offering or an admin.
    ///
    /// # Errors
    ///
    /// `NotAuthorized`, `NotFound`, `InvalidCapacity`,
    /// `CapacityBelowEnrollment`, or `Unavailable`.
    pub fn adjust_capacity(
        &self,
        ctx: &Context,
        offering: OfferingId,
        capacity: u32,
    ) -> Result<CapacityAdjusted, RegistrationError> {
        let mut txn = Transaction::begin("adjust_capacity", self.deadline(ctx));
        let span = tracing::info_span!(
            "adjust_capacity",
            op_id = %txn.op_id(),
            principal = %ctx.principal,
            %offering,
            capacity
        );
        let _enter = span.enter();

        let result = self.adjust_capacity_inner(ctx, &mut txn, offering, capacity);
        self.finish(&mut txn, result)
    }

    fn adjust_capacity_inner(
        &self,
        ctx: &Context,
        txn: &mut Transaction,
        offering: OfferingId,
        capacity: u32,
    ) -> Result<CapacityAdjusted, RegistrationError> {
        if ctx.principal.role() == Role::Student {
            return Err(RegistrationError::NotAuthorized);
        }
        self.authorize_offering(ctx, offering)?;

        let _guard = self
            .locks
            .acquire(&[LockKey::Offering(offering)], txn.deadline())?;

        let registered = self.store.offering_count(offering)?;
        validate::check_new_capacity(capacity, registered)?;

        txn.stage(Mutation::SetCapacity { offering, capacity });
        let previous = match txn.commit(&self.store)?.pop() {
            Some(Applied::CapacitySet { previous, .. }) => previous,
            other => {
                return Err(RegistrationError::Internal(format!(
                    "unexpected store result {other:?}"
                )))
            }
        };

        self.audit.record(Event::capacity_adjusted(
            txn.op_id(),
            offering,
            previous,
            capacity,
        ));
        tracing::info!(previous, "capacity adjusted");
        Ok(CapacityAdjusted {
            offering,
            previous,
            capacity,
            seats_remaining: capacity - registered,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn load_registration(&self, id: RegistrationId) -> Result<Registration, RegistrationError> {
        self.store
            .registration(id)?
            .ok_or(RegistrationError::NotFound(Missing::Registration(id)))
    }

    /// Faculty may act only on offerings they teach. Admins may act on any.
    fn authorize_offering(
        &self,
        ctx: &Context,
        offering: OfferingId,
    ) -> Result<(), RegistrationError> {
        let row = self.store.offering(offering)?;
        match (ctx.principal, row) {
            (Principal::Admin, Some(_)) => Ok(()),
            (Principal::Admin, None) => Err(RegistrationError::NotFound(Missing::Offering(offering))),
            (Principal::Faculty(f), Some(o)) if o.faculty == f => Ok(()),
            (Principal::Faculty(_), None) => {
                Err(RegistrationError::NotFound(Missing::Offering(offering)))
            }
            _ => Err(RegistrationError::NotAuthorized),
        }
    }

    /// Log and audit a failed operation; pass the result through.
    fn finish<T>(
        &self,
        txn: &mut Transaction,
        result: Result<T, RegistrationError>,
    ) -> Result<T, RegistrationError> {
        if let Err(err) = &result {
            txn.abort();
            let kind = err.kind();
            match err.class() {
                FailureClass::Transient => tracing::warn!(%kind, error = %err, "operation failed"),
                FailureClass::Internal => tracing::error!(%kind, error = %err, "operation failed"),
                _ => tracing::debug!(%kind, error = %err, "rejected"),
            }
            self.audit
                .record(Event::rejected(txn.op_id(), txn.operation(), kind));
        }
        result
    }
}

fn inserted(applied: Vec<Applied>) -> Result<Registration, RegistrationError> {
    match applied.into_iter().next() {
        Some(Applied::Inserted(registration)) => Ok(registration),
        other => Err(RegistrationError::Internal(format!(
            "unexpected store result {other:?}"
        ))),
    }
}
