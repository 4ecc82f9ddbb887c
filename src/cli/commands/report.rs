//! Read-only reports: aggregates, dashboards, audit
//!
//! Store errors are routed through [`RegistrationError`] so the user sees the
//! same masked text the engine would produce.

use anyhow::{Context as _, Result};
use serde_json::json;

use super::{read_store, Context};
use crate::core::types::{FacultyId, OfferingId, StudentId};
use crate::engine::{AuditFile, Missing, RegistrationError};
use crate::store::{MemoryStore, RegistrationStore};
use crate::ui::output;
use crate::views;

/// Fail with a masked not-found unless the student exists.
fn require_student(store: &MemoryStore, student: StudentId) -> Result<(), RegistrationError> {
    match store.student(student)? {
        Some(_) => Ok(()),
        None => Err(RegistrationError::NotFound(Missing::Student(student))),
    }
}

pub fn gpa(ctx: &Context, student: Option<StudentId>, fresh: bool) -> Result<()> {
    let student = ctx.student_target(student)?;
    let policy = ctx.config.grading_policy();
    let value = read_store(ctx, |store| {
        require_student(store, student)?;
        let value = if fresh {
            views::fresh::gpa(store, &policy, student)
        } else {
            views::gpa(store, &policy, student)
        };
        Ok(value.map_err(RegistrationError::from)?)
    })?;

    if ctx.json {
        output::json(&json!({ "student": student, "gpa": value }))?;
    } else {
        output::print(output::format_gpa(value), ctx.verbosity);
    }
    Ok(())
}

pub fn credits(ctx: &Context, student: Option<StudentId>, fresh: bool) -> Result<()> {
    let student = ctx.student_target(student)?;
    let policy = ctx.config.grading_policy();
    let summary = read_store(ctx, |store| {
        require_student(store, student)?;
        let summary = if fresh {
            views::fresh::credit_summary(store, &policy, student)
        } else {
            views::credit_summary(store, &policy, student)
        };
        Ok(summary.map_err(RegistrationError::from)?)
    })?;

    if ctx.json {
        output::json(&summary)?;
    } else {
        output::print(
            format!(
                "completed: {}\nin progress: {}",
                summary.completed, summary.in_progress
            ),
            ctx.verbosity,
        );
    }
    Ok(())
}

pub fn seats(ctx: &Context, offering: OfferingId) -> Result<()> {
    ctx.principal()?;
    let remaining = read_store(ctx, |store| {
        Ok(views::seats_remaining(store, offering).map_err(RegistrationError::from)?)
    })?;

    if ctx.json {
        output::json(&json!({ "offering": offering, "seats_remaining": remaining }))?;
    } else {
        output::print(remaining, ctx.verbosity);
    }
    Ok(())
}

pub fn transcript(ctx: &Context, student: Option<StudentId>) -> Result<()> {
    let student = ctx.student_target(student)?;
    let lines = read_store(ctx, |store| {
        require_student(store, student)?;
        Ok(views::transcript(store, student).map_err(RegistrationError::from)?)
    })?;

    if ctx.json {
        return Ok(output::json(&lines)?);
    }
    if lines.is_empty() {
        output::print("No registrations.", ctx.verbosity);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|l| {
            vec![
                l.registration.to_string(),
                l.semester.clone(),
                l.course.clone(),
                l.section.clone(),
                l.credits.to_string(),
                output::format_grade(l.grade),
            ]
        })
        .collect();
    output::print(
        output::format_table(
            &["REG", "SEMESTER", "COURSE", "SECTION", "CREDITS", "GRADE"],
            &rows,
        ),
        ctx.verbosity,
    );
    Ok(())
}

pub fn available(ctx: &Context, student: Option<StudentId>) -> Result<()> {
    let student = ctx.student_target(student)?;
    let offerings = read_store(ctx, |store| {
        require_student(store, student)?;
        Ok(views::available_offerings(store, student).map_err(RegistrationError::from)?)
    })?;

    if ctx.json {
        return Ok(output::json(&offerings)?);
    }
    let rows: Vec<Vec<String>> = offerings
        .iter()
        .map(|a| {
            vec![
                a.offering.id.to_string(),
                a.course.title.clone(),
                a.offering.section.clone(),
                a.course.credits.to_string(),
                a.offering
                    .meeting
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "TBA".to_string()),
                a.seats_remaining.to_string(),
            ]
        })
        .collect();
    output::print(
        output::format_table(
            &["OFFERING", "COURSE", "SECTION", "CREDITS", "MEETS", "SEATS"],
            &rows,
        ),
        ctx.verbosity,
    );
    Ok(())
}

pub fn teaching(ctx: &Context, faculty: Option<FacultyId>) -> Result<()> {
    let faculty = ctx.faculty_target(faculty)?;
    let load = read_store(ctx, |store| {
        Ok(views::teaching_load(store, faculty).map_err(RegistrationError::from)?)
    })?;

    if ctx.json {
        return Ok(output::json(&load)?);
    }
    if load.is_empty() {
        output::print("No offerings.", ctx.verbosity);
        return Ok(());
    }
    let mut blocks = Vec::with_capacity(load.len());
    for line in &load {
        let header = format!(
            "Offering {}: {} (section {}, {}/{} registered)",
            line.offering.id,
            line.course.title,
            line.offering.section,
            line.students.len(),
            line.offering.max_capacity
        );
        let rows: Vec<Vec<String>> = line
            .students
            .iter()
            .map(|s| {
                vec![
                    s.registration.to_string(),
                    s.student.to_string(),
                    s.name.clone(),
                    output::format_grade(s.grade),
                ]
            })
            .collect();
        blocks.push(format!(
            "{header}\n{}",
            output::format_table(&["REG", "STUDENT", "NAME", "GRADE"], &rows)
        ));
    }
    output::print(blocks.join("\n\n"), ctx.verbosity);
    Ok(())
}

/// Show the most recent audit events.
pub fn audit(ctx: &Context, limit: usize) -> Result<()> {
    ctx.require_admin()?;
    let file = AuditFile::beside(&ctx.state_path());
    let events = file
        .recent(limit)
        .with_context(|| format!("Failed to read '{}'", file.path().display()))?;

    if ctx.json {
        return Ok(output::json(&events)?);
    }
    if events.is_empty() {
        output::print("No audit events.", ctx.verbosity);
        return Ok(());
    }
    let lines: Vec<String> = events
        .iter()
        .map(|e| format!("{}  {}  {}", e.timestamp(), e.op_id(), e.summary()))
        .collect();
    output::print(output::format_list(&lines, ""), ctx.verbosity);
    Ok(())
}
