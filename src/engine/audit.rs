//! engine::audit
//!
//! Audit event ledger.
//!
//! # Architecture
//!
//! Every committed engine mutation appends one [`Event`]; every rejected
//! request appends a `Rejected` event carrying its failure kind. Events are
//! collected in memory by [`AuditLog`] and may be flushed to an append-only
//! JSON Lines file through [`AuditFile`].
//!
//! **Important:** the ledger is evidence, not authority. Validators never
//! read it, and losing it never changes registration state.
//!
//! # Storage
//!
//! - `<state>.audit.jsonl` - one JSON event per line, fsynced on append

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::FailureKind;
use super::txn::OpId;
use crate::core::types::{FacultyId, Grade, OfferingId, RegistrationId, StudentId};

/// Errors from audit file operations.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("audit file '{path}' line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// An event in the audit ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A registration was created.
    Enrolled {
        op_id: String,
        registration: RegistrationId,
        student: StudentId,
        offering: OfferingId,
        timestamp: String,
    },

    /// A registration was deleted.
    Dropped {
        op_id: String,
        registration: RegistrationId,
        student: StudentId,
        offering: OfferingId,
        timestamp: String,
    },

    /// A grade was set or corrected.
    GradeAssigned {
        op_id: String,
        registration: RegistrationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<Grade>,
        grade: Grade,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        faculty: Option<FacultyId>,
        timestamp: String,
    },

    /// An offering's capacity changed.
    CapacityAdjusted {
        op_id: String,
        offering: OfferingId,
        previous: u32,
        capacity: u32,
        timestamp: String,
    },

    /// A request was refused. Carries the kind only, never record details.
    Rejected {
        op_id: String,
        operation: String,
        kind: FailureKind,
        timestamp: String,
    },
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Event {
    pub fn enrolled(
        op_id: &OpId,
        registration: RegistrationId,
        student: StudentId,
        offering: OfferingId,
    ) -> Self {
        Event::Enrolled {
            op_id: op_id.to_string(),
            registration,
            student,
            offering,
            timestamp: now(),
        }
    }

    pub fn dropped(
        op_id: &OpId,
        registration: RegistrationId,
        student: StudentId,
        offering: OfferingId,
    ) -> Self {
        Event::Dropped {
            op_id: op_id.to_string(),
            registration,
            student,
            offering,
            timestamp: now(),
        }
    }

    pub fn grade_assigned(
        op_id: &OpId,
        registration: RegistrationId,
        previous: Option<Grade>,
        grade: Grade,
        faculty: Option<FacultyId>,
    ) -> Self {
        Event::GradeAssigned {
            op_id: op_id.to_string(),
            registration,
            previous,
            grade,
            faculty,
            timestamp: now(),
        }
    }

    pub fn capacity_adjusted(op_id: &OpId, offering: OfferingId, previous: u32, capacity: u32) -> Self {
        Event::CapacityAdjusted {
            op_id: op_id.to_string(),
            offering,
            previous,
            capacity,
            timestamp: now(),
        }
    }

    pub fn rejected(op_id: &OpId, operation: &str, kind: FailureKind) -> Self {
        Event::Rejected {
            op_id: op_id.to_string(),
            operation: operation.to_string(),
            kind,
            timestamp: now(),
        }
    }

    pub fn op_id(&self) -> &str {
        match self {
            Event::Enrolled { op_id, .. }
            | Event::Dropped { op_id, .. }
            | Event::GradeAssigned { op_id, .. }
            | Event::CapacityAdjusted { op_id, .. }
            | Event::Rejected { op_id, .. } => op_id,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Event::Enrolled { timestamp, .. }
            | Event::Dropped { timestamp, .. }
            | Event::GradeAssigned { timestamp, .. }
            | Event::CapacityAdjusted { timestamp, .. }
            | Event::Rejected { timestamp, .. } => timestamp,
        }
    }

    /// Check if this event records a committed mutation.
    pub fn is_commit(&self) -> bool {
        !matches!(self, Event::Rejected { .. })
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            Event::Enrolled {
                registration,
                student,
                offering,
                ..
            } => format!("enrolled student {student} in offering {offering} (registration {registration})"),
            Event::Dropped {
                registration,
                student,
                offering,
                ..
            } => format!("dropped registration {registration} (student {student}, offering {offering})"),
            Event::GradeAssigned {
                registration,
                previous: Some(previous),
                grade,
                ..
            } => format!("corrected registration {registration}: {previous} -> {grade}"),
            Event::GradeAssigned {
                registration,
                grade,
                ..
            } => format!("graded registration {registration}: {grade}"),
            Event::CapacityAdjusted {
                offering,
                previous,
                capacity,
                ..
            } => format!("offering {offering} capacity {previous} -> {capacity}"),
            Event::Rejected {
                operation, kind, ..
            } => format!("rejected {operation}: {kind}"),
        }
    }
}

/// In-memory collector shared by concurrent engine calls.
#[derive(Debug, Default)]
pub struct AuditLog {
    events: Mutex<Vec<Event>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        tracing::trace!(op_id = event.op_id(), "audit: {}", event.summary());
        self.events.lock().push(event);
    }

    /// Copy of every event recorded so far, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Take every recorded event, leaving the log empty.
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Append-only JSON Lines audit file.
#[derive(Debug, Clone)]
pub struct AuditFile {
    path: PathBuf,
}

impl AuditFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The audit file that accompanies a state file.
    pub fn beside(state_path: &Path) -> Self {
        let mut name = state_path.as_os_str().to_os_string();
        name.push(".audit.jsonl");
        Self::new(PathBuf::from(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append events and fsync.
    pub fn append(&self, events: &[Event]) -> Result<(), AuditError> {
        if events.is_empty() {
            return Ok(());
        }
        let io_err = |source| AuditError::Io {
            path: self.path.clone(),
            source,
        };

        let mut buf = String::new();
        for (i, event) in events.iter().enumerate() {
            let line = serde_json::to_string(event).map_err(|source| AuditError::Json {
                path: self.path.clone(),
                line: i + 1,
                source,
            })?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(buf.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    }

    /// Read every event. A missing file reads as empty.
    pub fn read(&self) -> Result<Vec<Event>, AuditError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AuditError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|source| AuditError::Json {
                    path: self.path.clone(),
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }

    /// Read the last `count` events, most recent first.
    pub fn recent(&self, count: usize) -> Result<Vec<Event>, AuditError> {
        let mut events = self.read()?;
        events.reverse();
        events.truncate(count);
        Ok(events)
    }
}
