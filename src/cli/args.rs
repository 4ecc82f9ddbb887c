//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--state <path>`: State file to operate on
//! - `--as <principal>`: Identity the request acts as
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::types::{
    CourseId, DepartmentId, FacultyId, MeetingTime, OfferingId, RegistrationId, SemesterId,
    StudentId,
};
use crate::engine::Principal;

/// reg - Course registration from the command line
#[derive(Parser, Debug)]
#[command(name = "reg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// State file (default: config `state_file`, then ./registrar.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Act as student:<id>, faculty:<id>, or admin
    #[arg(long = "as", global = true, value_name = "PRINCIPAL")]
    pub principal: Option<Principal>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty state file
    #[command(
        long_about = "Create an empty state file.\n\n\
            The state file holds the catalog, the roster, and every registration. \
            An audit ledger is kept beside it as <state>.audit.jsonl.",
        after_help = "\
EXAMPLES:
    reg init
    reg --state term.json init --force"
    )]
    Init {
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Manage departments (admin)
    Department {
        #[command(subcommand)]
        action: DepartmentAction,
    },

    /// Manage semesters (admin)
    Semester {
        #[command(subcommand)]
        action: SemesterAction,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },

    /// Manage prerequisite edges (admin)
    Prereq {
        #[command(subcommand)]
        action: PrereqAction,
    },

    /// Manage offerings
    Offering {
        #[command(subcommand)]
        action: OfferingAction,
    },

    /// Manage students (admin)
    Student {
        #[command(subcommand)]
        action: StudentAction,
    },

    /// Manage faculty (admin)
    Faculty {
        #[command(subcommand)]
        action: FacultyAction,
    },

    /// Enroll a student in an offering
    #[command(
        long_about = "Enroll a student in an offering.\n\n\
            Checks run in order: prerequisites, meeting-time conflicts, capacity. \
            The first failing check is reported and nothing is written.",
        after_help = "\
EXAMPLES:
    # Enroll yourself
    reg --as student:3 enroll 12

    # Enroll someone else (admin only)
    reg --as admin enroll 12 --student 3"
    )]
    Enroll {
        /// Offering to enroll in
        offering: OfferingId,

        /// Student to enroll (defaults to the acting student)
        #[arg(long)]
        student: Option<StudentId>,
    },

    /// Drop an ungraded registration
    Drop {
        /// Registration to drop
        registration: RegistrationId,
    },

    /// Assign or correct a grade
    #[command(after_help = "\
GRADES:
    A B C D F   letter grades
    W           withdrawal
    I           incomplete

EXAMPLES:
    reg --as faculty:2 grade 40 B")]
    Grade {
        /// Registration to grade
        registration: RegistrationId,

        /// Grade token
        grade: String,
    },

    /// Show a student's GPA
    Gpa {
        /// Student (defaults to the acting student)
        #[arg(long)]
        student: Option<StudentId>,

        /// Recompute from history instead of maintained totals
        #[arg(long)]
        fresh: bool,
    },

    /// Show completed and in-progress credits
    Credits {
        /// Student (defaults to the acting student)
        #[arg(long)]
        student: Option<StudentId>,

        /// Recompute from history instead of maintained totals
        #[arg(long)]
        fresh: bool,
    },

    /// Show seats remaining in an offering
    Seats {
        /// Offering to inspect
        offering: OfferingId,
    },

    /// Show a student's registrations and grades
    Transcript {
        /// Student (defaults to the acting student)
        #[arg(long)]
        student: Option<StudentId>,
    },

    /// List offerings a student could still enroll in
    Available {
        /// Student (defaults to the acting student)
        #[arg(long)]
        student: Option<StudentId>,
    },

    /// Show offerings taught with their class lists
    Teaching {
        /// Faculty member (defaults to the acting faculty member)
        #[arg(long)]
        faculty: Option<FacultyId>,
    },

    /// Show recent audit events (admin)
    Audit {
        /// Number of events to show, newest first
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

/// Department subcommands.
#[derive(Subcommand, Debug)]
pub enum DepartmentAction {
    /// Add a department
    Add {
        /// Department name
        name: String,
    },
}

/// Semester subcommands.
#[derive(Subcommand, Debug)]
pub enum SemesterAction {
    /// Add a semester
    Add {
        /// Display label, e.g. "Fall 2026"
        label: String,

        /// Chronological position; later semesters have larger ordinals
        #[arg(long)]
        ordinal: u32,
    },
}

/// Course subcommands.
#[derive(Subcommand, Debug)]
pub enum CourseAction {
    /// Add a course (admin)
    Add {
        /// Course title
        title: String,

        /// Credit hours (at least 1)
        #[arg(long)]
        credits: u32,

        /// Owning department
        #[arg(long)]
        department: DepartmentId,

        /// Catalog description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Create a course in your department with its first offering (faculty)
    #[command(after_help = "\
EXAMPLES:
    # Create a course you will teach this semester
    reg --as faculty:4 course create \"Topology\" --credits 3 --semester 2 --capacity 25 \\
        --meets \"TR 10:30-11:45\"

    # Create one on behalf of an instructor
    reg --as admin course create \"Topology\" --credits 3 --semester 2 --capacity 25 --faculty 4")]
    Create(CreateCourse),
    /// Remove a course with no offerings (admin)
    Remove {
        /// Course to remove
        course: CourseId,
    },
}

/// Arguments for `course create`.
#[derive(Args, Debug)]
pub struct CreateCourse {
    /// Course title
    pub title: String,

    /// Credit hours (at least 1)
    #[arg(long)]
    pub credits: u32,

    /// Semester the first offering runs in
    #[arg(long)]
    pub semester: SemesterId,

    /// Section label of the first offering
    #[arg(long, default_value = "A")]
    pub section: String,

    /// Maximum number of registrations
    #[arg(long)]
    pub capacity: u32,

    /// Weekly meeting time
    #[arg(long)]
    pub meets: Option<MeetingTime>,

    /// Instructor (admin only; faculty always teach their own course)
    #[arg(long)]
    pub faculty: Option<FacultyId>,

    /// Catalog description
    #[arg(long, default_value = "")]
    pub description: String,
}

/// Prerequisite subcommands.
#[derive(Subcommand, Debug)]
pub enum PrereqAction {
    /// Require a passing grade in one course before another
    Add {
        /// Course gaining the requirement
        course: CourseId,

        /// Course that must be passed first
        #[arg(long)]
        requires: CourseId,
    },
}

/// Offering subcommands.
#[derive(Subcommand, Debug)]
pub enum OfferingAction {
    /// Schedule an offering of a course (admin)
    #[command(after_help = "\
MEETING TIMES:
    Day letters M T W R F S U, then a 24h range:
        --meets \"MWF 09:00-09:50\"
        --meets \"TR 13:30-14:45\"")]
    Add {
        /// Course being offered
        course: CourseId,

        /// Semester it runs in
        #[arg(long)]
        semester: SemesterId,

        /// Section label, unique per course and semester
        #[arg(long, default_value = "A")]
        section: String,

        /// Instructor
        #[arg(long)]
        faculty: FacultyId,

        /// Maximum number of registrations
        #[arg(long)]
        capacity: u32,

        /// Weekly meeting time
        #[arg(long)]
        meets: Option<MeetingTime>,
    },
    /// Change an offering's capacity (owning faculty or admin)
    Capacity {
        /// Offering to adjust
        offering: OfferingId,

        /// New maximum, not below current registrations
        capacity: u32,
    },
    /// Remove an offering with no registrations (admin)
    Remove {
        /// Offering to remove
        offering: OfferingId,
    },
}

/// Student subcommands.
#[derive(Subcommand, Debug)]
pub enum StudentAction {
    /// Add a student
    Add {
        /// Full name
        name: String,

        /// Home department
        #[arg(long)]
        department: DepartmentId,

        /// Year of first enrollment
        #[arg(long)]
        year: u16,
    },
}

/// Faculty subcommands.
#[derive(Subcommand, Debug)]
pub enum FacultyAction {
    /// Add a faculty member
    Add {
        /// Full name
        name: String,

        /// Home department
        #[arg(long)]
        department: DepartmentId,
    },
}
