//! core
//!
//! Core domain types, records, and configuration for the registrar.
//!
//! # Modules
//!
//! - [`types`] - Strong types: identifiers, Grade, MeetingTime, UtcTimestamp
//! - [`catalog`] - Departments, courses, prerequisites, semesters, offerings
//! - [`roster`] - Student and faculty records
//! - [`registration`] - The registration ledger row
//! - [`policy`] - Grading policy and prerequisite mode
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Records validate on insert; nothing here knows about concurrency
//! - Schemas are strict and self-describing

pub mod catalog;
pub mod config;
pub mod policy;
pub mod registration;
pub mod roster;
pub mod types;
