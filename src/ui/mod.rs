//! ui
//!
//! User-facing output for the `reg` CLI.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All terminal output goes through this module so quiet mode and `--json`
//! are honored in one place. Nothing here reads or writes registrar state.

pub mod output;
