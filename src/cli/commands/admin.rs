//! Catalog and roster administration commands
//!
//! All of these require `--as admin`, except `course create`, which faculty
//! run for courses they teach. They write through the store's admin
//! operations, which enforce referential integrity; none of them touch the
//! registration ledger.

use anyhow::{Context as _, Result};
use serde_json::json;

use super::{save_store, write_store, Context};
use crate::cli::args::CreateCourse;
use crate::core::catalog::{NewCourse, NewOffering};
use crate::core::types::{CourseId, DepartmentId, FacultyId, MeetingTime, OfferingId, SemesterId};
use crate::store::{RegistrationStore, StateFile, StoreError};
use crate::ui::output;

/// Create an empty state file.
pub fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = ctx.state_path();
    StateFile::new(&path)
        .init(force)
        .with_context(|| format!("Failed to initialize '{}'", path.display()))?;

    if ctx.json {
        output::json(&json!({ "state_file": path }))?;
    } else {
        output::success(
            format!("Initialized empty registrar state at {}", path.display()),
            ctx.verbosity,
        );
    }
    Ok(())
}

/// Print a newly created id.
fn created(ctx: &Context, kind: &str, id: impl std::fmt::Display + serde::Serialize) -> Result<()> {
    if ctx.json {
        output::json(&json!({ "kind": kind, "id": id }))?;
    } else {
        output::success(format!("Created {kind} {id}"), ctx.verbosity);
    }
    Ok(())
}

pub fn add_department(ctx: &Context, name: &str) -> Result<()> {
    let id = write_store(ctx, |store| Ok(store.add_department(name)?))?;
    created(ctx, "department", id)
}

pub fn add_semester(ctx: &Context, label: &str, ordinal: u32) -> Result<()> {
    let id = write_store(ctx, |store| Ok(store.add_semester(label, ordinal)?))?;
    created(ctx, "semester", id)
}

pub fn add_course(
    ctx: &Context,
    title: &str,
    credits: u32,
    department: DepartmentId,
    description: &str,
) -> Result<()> {
    let id = write_store(ctx, |store| {
        Ok(store.add_course(NewCourse {
            title: title.to_string(),
            credits,
            department,
            description: description.to_string(),
        })?)
    })?;
    created(ctx, "course", id)
}

/// Create a course in the instructor's department with its first offering.
pub fn create_course(ctx: &Context, args: CreateCourse) -> Result<()> {
    let faculty = ctx.faculty_target(args.faculty)?;
    let (course, offering) = save_store(ctx, |store| {
        let department = store
            .faculty(faculty)?
            .ok_or(StoreError::FacultyNotFound(faculty))?
            .department;
        Ok(store.create_course_with_offering(
            NewCourse {
                title: args.title,
                credits: args.credits,
                department,
                description: args.description,
            },
            args.semester,
            &args.section,
            faculty,
            args.capacity,
            args.meets,
        )?)
    })?;

    if ctx.json {
        output::json(&json!({ "course": course, "offering": offering }))?;
    } else {
        output::success(
            format!("Created course {course} with offering {offering}"),
            ctx.verbosity,
        );
    }
    Ok(())
}

pub fn remove_course(ctx: &Context, course: CourseId) -> Result<()> {
    let removed = write_store(ctx, |store| Ok(store.remove_course(course)?))?;
    if ctx.json {
        output::json(&removed)?;
    } else {
        output::success(
            format!("Removed course {} ({})", removed.id, removed.title),
            ctx.verbosity,
        );
    }
    Ok(())
}

pub fn add_prerequisite(ctx: &Context, course: CourseId, requires: CourseId) -> Result<()> {
    write_store(ctx, |store| Ok(store.add_prerequisite(course, requires)?))?;
    if ctx.json {
        output::json(&json!({ "course": course, "requires": requires }))?;
    } else {
        output::success(
            format!("Course {course} now requires course {requires}"),
            ctx.verbosity,
        );
    }
    Ok(())
}

pub fn add_offering(
    ctx: &Context,
    course: CourseId,
    semester: SemesterId,
    section: &str,
    faculty: FacultyId,
    capacity: u32,
    meets: Option<MeetingTime>,
) -> Result<()> {
    let id = write_store(ctx, |store| {
        Ok(store.add_offering(NewOffering {
            course,
            semester,
            section: section.to_string(),
            faculty,
            max_capacity: capacity,
            meeting: meets,
        })?)
    })?;
    created(ctx, "offering", id)
}

pub fn remove_offering(ctx: &Context, offering: OfferingId) -> Result<()> {
    let removed = write_store(ctx, |store| Ok(store.remove_offering(offering)?))?;
    if ctx.json {
        output::json(&removed)?;
    } else {
        output::success(
            format!("Removed offering {} (section {})", removed.id, removed.section),
            ctx.verbosity,
        );
    }
    Ok(())
}

pub fn add_student(ctx: &Context, name: &str, department: DepartmentId, year: u16) -> Result<()> {
    let id = write_store(ctx, |store| Ok(store.add_student(name, department, year)?))?;
    created(ctx, "student", id)
}

pub fn add_faculty(ctx: &Context, name: &str, department: DepartmentId) -> Result<()> {
    let id = write_store(ctx, |store| Ok(store.add_faculty(name, department)?))?;
    created(ctx, "faculty", id)
}
