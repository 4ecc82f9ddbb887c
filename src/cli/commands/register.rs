//! Registration commands: enroll, drop, grade, capacity
//!
//! Thin wrappers over the engine. Every rule (ownership, prerequisites,
//! schedule, capacity, grade format) is enforced by [`crate::engine::Engine`].

use anyhow::{anyhow, Result};
use serde_json::json;

use super::{with_engine, Context};
use crate::core::types::{OfferingId, RegistrationId, StudentId};
use crate::engine::{GradeOutcome, Principal};
use crate::ui::output;

/// Enroll a student in an offering.
///
/// Without `--student`, the acting student enrolls themself.
pub fn enroll(ctx: &Context, offering: OfferingId, student: Option<StudentId>) -> Result<()> {
    let student = match (student, ctx.principal()?) {
        (Some(id), _) => id,
        (None, Principal::Student(me)) => me,
        (None, _) => return Err(anyhow!("--student is required when not acting as a student")),
    };

    let enrolled = with_engine(ctx, |engine, req| engine.enroll(req, student, offering))?;

    if ctx.json {
        output::json(&json!({
            "registration": enrolled.registration,
            "seats_remaining": enrolled.seats_remaining,
        }))?;
    } else {
        output::success(
            format!(
                "Enrolled student {} in offering {} (registration {}, {} seat(s) left)",
                student, offering, enrolled.registration.id, enrolled.seats_remaining
            ),
            ctx.verbosity,
        );
    }
    Ok(())
}

pub fn drop_registration(ctx: &Context, registration: RegistrationId) -> Result<()> {
    let dropped = with_engine(ctx, |engine, req| {
        engine.drop_registration(req, registration)
    })?;

    if ctx.json {
        output::json(&json!({
            "registration": dropped.registration,
            "seats_remaining": dropped.seats_remaining,
        }))?;
    } else {
        output::success(
            format!(
                "Dropped registration {} (offering {} now has {} seat(s) left)",
                registration, dropped.registration.offering, dropped.seats_remaining
            ),
            ctx.verbosity,
        );
    }
    Ok(())
}

pub fn assign_grade(ctx: &Context, registration: RegistrationId, grade: &str) -> Result<()> {
    let outcome = with_engine(ctx, |engine, req| {
        engine.assign_grade(req, registration, grade)
    })?;

    let (status, previous) = match &outcome {
        GradeOutcome::Unchanged(_) => ("unchanged", None),
        GradeOutcome::Assigned(_) => ("assigned", None),
        GradeOutcome::Corrected { previous, .. } => ("corrected", Some(*previous)),
    };
    let current = outcome.registration();

    if ctx.json {
        output::json(&json!({
            "status": status,
            "registration": current,
            "previous": previous,
        }))?;
    } else {
        let grade = output::format_grade(current.grade);
        let message = match previous {
            Some(p) => format!("Corrected registration {registration}: {p} -> {grade}"),
            None if status == "unchanged" => {
                format!("Registration {registration} already has grade {grade}")
            }
            None => format!("Graded registration {registration}: {grade}"),
        };
        output::success(message, ctx.verbosity);
    }
    Ok(())
}

pub fn adjust_capacity(ctx: &Context, offering: OfferingId, capacity: u32) -> Result<()> {
    let adjusted = with_engine(ctx, |engine, req| {
        engine.adjust_capacity(req, offering, capacity)
    })?;

    if ctx.json {
        output::json(&json!({
            "offering": adjusted.offering,
            "previous": adjusted.previous,
            "capacity": adjusted.capacity,
            "seats_remaining": adjusted.seats_remaining,
        }))?;
    } else {
        output::success(
            format!(
                "Offering {} capacity {} -> {} ({} seat(s) left)",
                offering, adjusted.previous, adjusted.capacity, adjusted.seats_remaining
            ),
            ctx.verbosity,
        );
    }
    Ok(())
}
