//! core::roster
//!
//! Per-person records: students and faculty.
//!
//! Credentials belong to the external authentication collaborator and are
//! never stored or checked here. The roster only answers "does this person
//! exist, and which department do they belong to".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{DepartmentId, FacultyId, StudentId};

/// Errors from roster mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("department {0} not found")]
    DepartmentNotFound(DepartmentId),
}

/// A student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub department: DepartmentId,
    pub enrollment_year: u16,
}

/// A faculty member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
    pub department: DepartmentId,
}

/// Student and faculty records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    students: BTreeMap<StudentId, Student>,
    faculty: BTreeMap<FacultyId, Faculty>,
    next_id: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn student(&self, id: StudentId) -> Option<&Student> {
        self.students.get(&id)
    }

    pub fn faculty(&self, id: FacultyId) -> Option<&Faculty> {
        self.faculty.get(&id)
    }

    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    pub fn all_faculty(&self) -> impl Iterator<Item = &Faculty> {
        self.faculty.values()
    }

    /// Add a student. `department_exists` is supplied by the caller, which
    /// owns the catalog.
    pub fn add_student(
        &mut self,
        name: impl Into<String>,
        department: DepartmentId,
        enrollment_year: u16,
        department_exists: bool,
    ) -> Result<StudentId, RosterError> {
        let name = Self::validate(name.into(), department, department_exists)?;
        self.next_id += 1;
        let id = StudentId::new(self.next_id);
        self.students.insert(
            id,
            Student {
                id,
                name,
                department,
                enrollment_year,
            },
        );
        Ok(id)
    }

    /// Add a faculty member.
    pub fn add_faculty(
        &mut self,
        name: impl Into<String>,
        department: DepartmentId,
        department_exists: bool,
    ) -> Result<FacultyId, RosterError> {
        let name = Self::validate(name.into(), department, department_exists)?;
        self.next_id += 1;
        let id = FacultyId::new(self.next_id);
        self.faculty.insert(
            id,
            Faculty {
                id,
                name,
                department,
            },
        );
        Ok(id)
    }

    fn validate(
        name: String,
        department: DepartmentId,
        department_exists: bool,
    ) -> Result<String, RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }
        if !department_exists {
            return Err(RosterError::DepartmentNotFound(department));
        }
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup() {
        let mut roster = Roster::new();
        let dept = DepartmentId::new(1);
        let s = roster.add_student("Ada", dept, 2025, true).unwrap();
        let f = roster.add_faculty("Grace", dept, true).unwrap();

        assert_eq!(roster.student(s).unwrap().name, "Ada");
        assert_eq!(roster.faculty(f).unwrap().name, "Grace");
        assert!(roster.student(StudentId::new(f.get())).is_none());
    }

    #[test]
    fn rejects_blank_name_and_unknown_department() {
        let mut roster = Roster::new();
        let dept = DepartmentId::new(7);
        assert_eq!(
            roster.add_student("  ", dept, 2025, true),
            Err(RosterError::EmptyName)
        );
        assert_eq!(
            roster.add_faculty("Grace", dept, false),
            Err(RosterError::DepartmentNotFound(dept))
        );
    }
}
