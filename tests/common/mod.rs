//! Shared fixtures for integration tests.

#![allow(dead_code)]

use registrar::core::catalog::{NewCourse, NewOffering};
use registrar::core::policy::GradingPolicy;
use registrar::core::types::{CourseId, DepartmentId, FacultyId, OfferingId, SemesterId, StudentId};
use registrar::engine::{Context, Engine, Principal};
use registrar::store::{MemoryStore, RegistrationStore};

/// A small campus: one department, one semester, one instructor.
pub struct Campus<S = MemoryStore> {
    pub engine: Engine<S>,
    pub dept: DepartmentId,
    pub term: SemesterId,
    pub prof: FacultyId,
}

impl Campus<MemoryStore> {
    pub fn new() -> Self {
        Self::with_policy(GradingPolicy::default())
    }

    pub fn with_policy(policy: GradingPolicy) -> Self {
        let store = MemoryStore::new();
        let (dept, term, prof) = seed(&store);
        Self {
            engine: Engine::new(store, policy),
            dept,
            term,
            prof,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        self.engine.store()
    }

    pub fn student(&self, name: &str) -> StudentId {
        self.store().add_student(name, self.dept, 2024).unwrap()
    }

    pub fn semester(&self, label: &str, ordinal: u32) -> SemesterId {
        self.store().add_semester(label, ordinal).unwrap()
    }

    pub fn course(&self, title: &str, credits: u32) -> CourseId {
        self.store()
            .add_course(NewCourse {
                title: title.into(),
                credits,
                department: self.dept,
                description: String::new(),
            })
            .unwrap()
    }

    pub fn offering(&self, course: CourseId, capacity: u32, meets: Option<&str>) -> OfferingId {
        self.offering_in(course, self.term, capacity, meets)
    }

    pub fn offering_in(
        &self,
        course: CourseId,
        term: SemesterId,
        capacity: u32,
        meets: Option<&str>,
    ) -> OfferingId {
        let section = format!("S{}", self.store().offerings().unwrap().len() + 1);
        self.store()
            .add_offering(NewOffering {
                course,
                semester: term,
                section,
                faculty: self.prof,
                max_capacity: capacity,
                meeting: meets.map(|m| m.parse().unwrap()),
            })
            .unwrap()
    }
}

/// Seed the reference data every campus needs.
pub fn seed(store: &MemoryStore) -> (DepartmentId, SemesterId, FacultyId) {
    let dept = store.add_department("Computer Science").unwrap();
    let term = store.add_semester("Fall 2026", 1).unwrap();
    let prof = store.add_faculty("Hopper", dept).unwrap();
    (dept, term, prof)
}

pub fn as_student(id: StudentId) -> Context {
    Context::new(Principal::Student(id))
}

pub fn as_faculty(id: FacultyId) -> Context {
    Context::new(Principal::Faculty(id))
}

pub fn as_admin() -> Context {
    Context::new(Principal::Admin)
}

/// Registrations currently held in an offering.
pub fn headcount<S: RegistrationStore>(store: &S, offering: OfferingId) -> usize {
    store.offering_registrations(offering).unwrap().len()
}
