//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves the acting principal and target records
//! 2. Opens the state file (taking its exclusive lock)
//! 3. Calls the engine, the store's admin operations, or a view
//! 4. Saves on success, appends audit events, and formats output
//!
//! Handlers never check registration rules themselves.

mod admin;
mod register;
mod report;

pub use admin::{
    add_course, add_department, add_faculty, add_offering, add_prerequisite, add_semester,
    add_student, create_course, init, remove_course, remove_offering,
};
pub use register::{adjust_capacity, assign_grade, drop_registration, enroll};
pub use report::{audit, available, credits, gpa, seats, teaching, transcript};

use anyhow::{Context as _, Result};

use super::args::{
    Command, CourseAction, DepartmentAction, FacultyAction, OfferingAction, PrereqAction,
    SemesterAction, StudentAction,
};
use super::Context;
use crate::engine::{self, AuditFile, Engine, RegistrationError, RetryPolicy};
use crate::store::{LockedState, MemoryStore, StateFile, StateFileError};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init { force } => init(ctx, force),

        // Catalog and roster administration
        Command::Department {
            action: DepartmentAction::Add { name },
        } => add_department(ctx, &name),
        Command::Semester {
            action: SemesterAction::Add { label, ordinal },
        } => add_semester(ctx, &label, ordinal),
        Command::Course { action } => match action {
            CourseAction::Add {
                title,
                credits,
                department,
                description,
            } => add_course(ctx, &title, credits, department, &description),
            CourseAction::Create(args) => create_course(ctx, args),
            CourseAction::Remove { course } => remove_course(ctx, course),
        },
        Command::Prereq {
            action: PrereqAction::Add { course, requires },
        } => add_prerequisite(ctx, course, requires),
        Command::Offering { action } => match action {
            OfferingAction::Add {
                course,
                semester,
                section,
                faculty,
                capacity,
                meets,
            } => add_offering(ctx, course, semester, &section, faculty, capacity, meets),
            OfferingAction::Capacity { offering, capacity } => {
                adjust_capacity(ctx, offering, capacity)
            }
            OfferingAction::Remove { offering } => remove_offering(ctx, offering),
        },
        Command::Student {
            action:
                StudentAction::Add {
                    name,
                    department,
                    year,
                },
        } => add_student(ctx, &name, department, year),
        Command::Faculty {
            action: FacultyAction::Add { name, department },
        } => add_faculty(ctx, &name, department),

        // Engine operations
        Command::Enroll { offering, student } => enroll(ctx, offering, student),
        Command::Drop { registration } => drop_registration(ctx, registration),
        Command::Grade {
            registration,
            grade,
        } => assign_grade(ctx, registration, &grade),

        // Views
        Command::Gpa { student, fresh } => gpa(ctx, student, fresh),
        Command::Credits { student, fresh } => credits(ctx, student, fresh),
        Command::Seats { offering } => seats(ctx, offering),
        Command::Transcript { student } => transcript(ctx, student),
        Command::Available { student } => available(ctx, student),
        Command::Teaching { faculty } => teaching(ctx, faculty),
        Command::Audit { limit } => audit(ctx, limit),
    }
}

/// Open and lock the state file.
///
/// Another `reg` process holding the lock is a transient condition, so the
/// open is retried under the configured policy before giving up.
fn open_state(ctx: &Context) -> Result<LockedState> {
    let path = ctx.state_path();
    let state = StateFile::new(&path);
    let opened = RetryPolicy::from_config(&ctx.config).run(|| match state.open() {
        Err(StateFileError::AlreadyLocked(p)) => Err(RegistrationError::Unavailable(format!(
            "state file '{}' is locked",
            p.display()
        ))),
        other => Ok(other),
    })?;
    opened.with_context(|| format!("Failed to open state file '{}'", path.display()))
}

/// Run a read-only closure against the store.
fn read_store<T>(ctx: &Context, op: impl FnOnce(&MemoryStore) -> Result<T>) -> Result<T> {
    let locked = open_state(ctx)?;
    op(locked.store())
}

/// Run an admin mutation and save the result.
fn write_store<T>(ctx: &Context, op: impl FnOnce(&MemoryStore) -> Result<T>) -> Result<T> {
    ctx.require_admin()?;
    save_store(ctx, op)
}

/// Run a catalog mutation and save the result. The caller authorizes.
fn save_store<T>(ctx: &Context, op: impl FnOnce(&MemoryStore) -> Result<T>) -> Result<T> {
    let locked = open_state(ctx)?;
    let value = op(locked.store())?;
    locked.save().context("Failed to save state file")?;
    Ok(value)
}

/// Run an engine operation as the acting principal.
///
/// Transient failures are retried. On success the state is saved; audit
/// events (commits and rejections) are appended either way.
fn with_engine<T>(
    ctx: &Context,
    mut op: impl FnMut(&Engine<&MemoryStore>, &engine::Context) -> Result<T, RegistrationError>,
) -> Result<T> {
    let principal = ctx.principal()?;
    let path = ctx.state_path();
    let locked = open_state(ctx)?;
    let engine = Engine::from_config(locked.store(), &ctx.config);

    let result = RetryPolicy::from_config(&ctx.config)
        .run(|| op(&engine, &engine::Context::new(principal)));

    if result.is_ok() {
        locked.save().context("Failed to save state file")?;
    }
    let events = engine.audit().drain();
    AuditFile::beside(&path)
        .append(&events)
        .context("Failed to append audit events")?;

    Ok(result?)
}
