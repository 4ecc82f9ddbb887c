//! cli
//!
//! Command-line interface for the registrar.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and install logging
//! - Delegate to command handlers
//! - Map failures to user text and exit status
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! handlers that open the state file, run [`crate::engine`] operations or
//! [`crate::views`] reads, and print the result. No registration rule is
//! checked here.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};

use crate::core::config::Config;
use crate::core::types::{FacultyId, StudentId};
use crate::engine::{FailureClass, Principal, RegistrationError};
use crate::telemetry;
use crate::ui::output::{self, Verbosity};

/// State file used when neither `--state` nor the config names one.
pub const DEFAULT_STATE_FILE: &str = "registrar.json";

/// Exit statuses for engine failures. Anything else exits with 1.
pub mod exit {
    pub const VALIDATION: u8 = 2;
    /// Authorization failures and not-found lookups of protected records.
    pub const NO_ACCESS: u8 = 3;
    pub const NOT_FOUND: u8 = 4;
    /// EX_TEMPFAIL
    pub const TRANSIENT: u8 = 75;
    /// EX_SOFTWARE
    pub const INTERNAL: u8 = 70;
}

/// Settings shared by every command handler.
#[derive(Debug)]
pub struct Context {
    pub state: Option<PathBuf>,
    pub principal: Option<Principal>,
    pub verbosity: Verbosity,
    pub json: bool,
    pub config: Config,
}

impl Context {
    /// Resolve the state file path.
    pub fn state_path(&self) -> PathBuf {
        self.state
            .clone()
            .or_else(|| self.config.state_file().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    /// The acting principal, required by every command except `init`.
    pub fn principal(&self) -> Result<Principal> {
        self.principal
            .ok_or_else(|| anyhow!("This command needs --as <student:ID|faculty:ID|admin>"))
    }

    pub fn require_admin(&self) -> Result<()> {
        match self.principal()? {
            Principal::Admin => Ok(()),
            _ => Err(RegistrationError::NotAuthorized.into()),
        }
    }

    /// Resolve which student a read refers to.
    ///
    /// Students may only read their own records; staff may read anyone's.
    pub fn student_target(&self, explicit: Option<StudentId>) -> Result<StudentId> {
        match (self.principal()?, explicit) {
            (Principal::Student(me), None) => Ok(me),
            (Principal::Student(me), Some(id)) if id == me => Ok(me),
            (Principal::Student(_), Some(_)) => Err(RegistrationError::NotAuthorized.into()),
            (_, Some(id)) => Ok(id),
            (_, None) => Err(anyhow!("--student is required when not acting as a student")),
        }
    }

    /// Resolve which faculty member a teaching view refers to.
    pub fn faculty_target(&self, explicit: Option<FacultyId>) -> Result<FacultyId> {
        match (self.principal()?, explicit) {
            (Principal::Faculty(me), None) => Ok(me),
            (Principal::Faculty(me), Some(id)) if id == me => Ok(me),
            (Principal::Admin, Some(id)) => Ok(id),
            (Principal::Admin, None) => Err(anyhow!("--faculty is required when acting as admin")),
            _ => Err(RegistrationError::NotAuthorized.into()),
        }
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    let config = Config::load().context("Failed to load config")?;
    telemetry::init(verbosity, config.file.logging.as_ref());
    if let Some(path) = config.loaded_from() {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    let ctx = Context {
        state: cli.state,
        principal: cli.principal,
        verbosity,
        json: cli.json,
        config,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Print a failure for the user.
///
/// Engine failures show their user message only, so storage details and
/// record existence never leak to the terminal.
pub fn report(err: &anyhow::Error) {
    match err.downcast_ref::<RegistrationError>() {
        Some(e) => output::error(e.user_message()),
        None => output::error(format!("{err:#}")),
    }
}

/// Exit status for a failure.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(e) = err.downcast_ref::<RegistrationError>() else {
        return 1;
    };
    if e.is_masked() {
        return exit::NO_ACCESS;
    }
    match e.class() {
        FailureClass::Validation => exit::VALIDATION,
        FailureClass::Authorization => exit::NO_ACCESS,
        FailureClass::NotFound => exit::NOT_FOUND,
        FailureClass::Transient => exit::TRANSIENT,
        FailureClass::Internal => exit::INTERNAL,
    }
}
