//! Registrar - A transactional course registration engine
//!
//! Registrar enrolls students in course offerings, drops and grades their
//! registrations, and keeps credit and GPA aggregates consistent with the
//! registration ledger, under concurrent load.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Authorize → lock → validate → commit for every mutation
//! - [`views`] - Credit, GPA, and seat aggregates plus dashboard projections
//! - [`store`] - Record store, keyed locks, and state file persistence
//! - [`core`] - Domain types, catalog, roster, policy, and configuration
//! - [`telemetry`] - Logging setup
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! Registrar maintains the following invariants:
//!
//! 1. An offering never holds more registrations than its capacity
//! 2. A student holds at most one registration per offering
//! 3. A failed operation leaves no trace in the ledger
//! 4. Maintained aggregates always equal a fresh recomputation

pub mod cli;
pub mod core;
pub mod engine;
pub mod store;
pub mod telemetry;
pub mod ui;
pub mod views;
