//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.

use std::fmt::Display;

use serde::Serialize;

use crate::core::types::Grade;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a success message (respects quiet mode).
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a value as pretty JSON. Always shown, even when quiet.
pub fn json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a grade cell. In-progress registrations show `IP`.
pub fn format_grade(grade: Option<Grade>) -> String {
    match grade {
        Some(g) => g.to_string(),
        None => "IP".to_string(),
    }
}

/// Format a GPA to two decimals.
pub fn format_gpa(gpa: f64) -> String {
    format!("{:.2}", gpa)
}

/// Format rows as a left-aligned table with a header line.
///
/// Rows shorter than the header are padded with empty cells.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| -> String {
        let line = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).copied().unwrap_or("");
                format!("{:<width$}", cell, width = *width)
            })
            .collect::<Vec<_>>()
            .join("  ");
        line.trim_end().to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render(headers.to_vec()));
    for row in rows {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn grades_and_gpa() {
        assert_eq!(format_grade(Some(Grade::B)), "B");
        assert_eq!(format_grade(None), "IP");
        assert_eq!(format_gpa(3.5), "3.50");
        assert_eq!(format_gpa(0.0), "0.00");
    }

    #[test]
    fn table_columns_align() {
        let table = format_table(
            &["ID", "COURSE", "GRADE"],
            &[
                vec!["1".into(), "Linear Algebra".into(), "A".into()],
                vec!["12".into(), "Logic".into()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "ID  COURSE          GRADE");
        assert_eq!(lines[1], "1   Linear Algebra  A");
        assert_eq!(lines[2], "12  Logic");
    }

    #[test]
    fn list_prefix() {
        assert_eq!(format_list(&["a", "b"], "- "), "- a\n- b");
    }
}
