//! core::catalog
//!
//! The catalog store: departments, courses, prerequisite edges, semesters,
//! and offerings.
//!
//! # Architecture
//!
//! The catalog is read-mostly. It is mutated by administrative operations
//! between terms, and read by the registration engine on every request.
//! All inserts are validated against referential rules so the catalog can
//! never hold a dangling reference.
//!
//! # Invariants
//!
//! - Every course belongs to an existing department and has credits > 0
//! - Prerequisite edges reference existing courses and are never self-loops
//! - Every offering references an existing course and semester
//! - Offering capacity is always > 0
//! - Section labels are unique per (course, semester)
//! - A course cannot be removed while any offering references it
//!
//! Cycles in the prerequisite graph are not rejected here; transitive
//! evaluation guards against them instead.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{CourseId, DepartmentId, FacultyId, MeetingTime, OfferingId, SemesterId};

/// Errors from catalog mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("department {0} not found")]
    DepartmentNotFound(DepartmentId),

    #[error("course {0} not found")]
    CourseNotFound(CourseId),

    #[error("semester {0} not found")]
    SemesterNotFound(SemesterId),

    #[error("offering {0} not found")]
    OfferingNotFound(OfferingId),

    #[error("course credits must be positive")]
    InvalidCredits,

    #[error("offering capacity must be positive")]
    InvalidCapacity,

    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("course {0} cannot require itself")]
    SelfPrerequisite(CourseId),

    #[error("course {course} already requires {required}")]
    DuplicatePrerequisite { course: CourseId, required: CourseId },

    #[error("section '{section}' already exists for course {course} in semester {semester}")]
    DuplicateSection {
        course: CourseId,
        semester: SemesterId,
        section: String,
    },

    #[error("course {course} is referenced by {offerings} offering(s)")]
    CourseInUse { course: CourseId, offerings: usize },
}

/// A department. Immutable reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}

/// A course in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub credits: u32,
    pub department: DepartmentId,
    #[serde(default)]
    pub description: String,
}

/// A prerequisite edge: `course` requires `required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Prerequisite {
    pub course: CourseId,
    pub required: CourseId,
}

/// A semester. `ordinal` orders semesters chronologically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub id: SemesterId,
    pub label: String,
    pub ordinal: u32,
}

/// A scheduled offering of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: OfferingId,
    pub course: CourseId,
    pub semester: SemesterId,
    pub section: String,
    pub faculty: FacultyId,
    pub max_capacity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingTime>,
}

/// Fields for a new course. The id is assigned by the catalog.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub credits: u32,
    pub department: DepartmentId,
    pub description: String,
}

/// Fields for a new offering. The id is assigned by the catalog.
#[derive(Debug, Clone)]
pub struct NewOffering {
    pub course: CourseId,
    pub semester: SemesterId,
    pub section: String,
    pub faculty: FacultyId,
    pub max_capacity: u32,
    pub meeting: Option<MeetingTime>,
}

/// The catalog container.
///
/// Serializable as a whole so the store can snapshot it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    departments: BTreeMap<DepartmentId, Department>,
    courses: BTreeMap<CourseId, Course>,
    prerequisites: BTreeSet<Prerequisite>,
    semesters: BTreeMap<SemesterId, Semester>,
    offerings: BTreeMap<OfferingId, Offering>,
    next_id: u64,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn department(&self, id: DepartmentId) -> Option<&Department> {
        self.departments.get(&id)
    }

    pub fn course(&self, id: CourseId) -> Option<&Course> {
        self.courses.get(&id)
    }

    pub fn semester(&self, id: SemesterId) -> Option<&Semester> {
        self.semesters.get(&id)
    }

    pub fn offering(&self, id: OfferingId) -> Option<&Offering> {
        self.offerings.get(&id)
    }

    pub fn departments(&self) -> impl Iterator<Item = &Department> {
        self.departments.values()
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    pub fn semesters(&self) -> impl Iterator<Item = &Semester> {
        self.semesters.values()
    }

    pub fn offerings(&self) -> impl Iterator<Item = &Offering> {
        self.offerings.values()
    }

    /// Direct prerequisites of a course.
    pub fn prerequisites_of(&self, course: CourseId) -> Vec<CourseId> {
        self.prerequisites
            .range(
                Prerequisite {
                    course,
                    required: CourseId::new(0),
                }..,
            )
            .take_while(|edge| edge.course == course)
            .map(|edge| edge.required)
            .collect()
    }

    /// Every prerequisite reachable from `course`, in breadth-first order.
    ///
    /// Terminates on cyclic data: each course is visited once, and `course`
    /// itself is never reported even if a cycle leads back to it.
    pub fn transitive_prerequisites_of(&self, course: CourseId) -> Vec<CourseId> {
        let mut seen = BTreeSet::from([course]);
        let mut order = Vec::new();
        let mut frontier = vec![course];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for c in frontier {
                for required in self.prerequisites_of(c) {
                    if seen.insert(required) {
                        order.push(required);
                        next.push(required);
                    }
                }
            }
            frontier = next;
        }
        order
    }

    /// Offerings of a given course.
    pub fn offerings_of(&self, course: CourseId) -> impl Iterator<Item = &Offering> {
        self.offerings.values().filter(move |o| o.course == course)
    }

    /// Offerings taught by a faculty member.
    pub fn offerings_taught_by(&self, faculty: FacultyId) -> impl Iterator<Item = &Offering> {
        self.offerings.values().filter(move |o| o.faculty == faculty)
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Add a department.
    pub fn add_department(&mut self, name: impl Into<String>) -> Result<DepartmentId, CatalogError> {
        let name = non_empty(name.into(), "department name")?;
        let id = DepartmentId::new(self.allocate());
        self.departments.insert(id, Department { id, name });
        Ok(id)
    }

    /// Add a semester.
    pub fn add_semester(
        &mut self,
        label: impl Into<String>,
        ordinal: u32,
    ) -> Result<SemesterId, CatalogError> {
        let label = non_empty(label.into(), "semester label")?;
        let id = SemesterId::new(self.allocate());
        self.semesters.insert(id, Semester { id, label, ordinal });
        Ok(id)
    }

    /// Add a course.
    pub fn add_course(&mut self, course: NewCourse) -> Result<CourseId, CatalogError> {
        if course.credits == 0 {
            return Err(CatalogError::InvalidCredits);
        }
        if !self.departments.contains_key(&course.department) {
            return Err(CatalogError::DepartmentNotFound(course.department));
        }
        let title = non_empty(course.title, "course title")?;
        let id = CourseId::new(self.allocate());
        self.courses.insert(
            id,
            Course {
                id,
                title,
                credits: course.credits,
                department: course.department,
                description: course.description,
            },
        );
        Ok(id)
    }

    /// Record that `course` requires `required`.
    pub fn add_prerequisite(
        &mut self,
        course: CourseId,
        required: CourseId,
    ) -> Result<(), CatalogError> {
        if course == required {
            return Err(CatalogError::SelfPrerequisite(course));
        }
        for id in [course, required] {
            if !self.courses.contains_key(&id) {
                return Err(CatalogError::CourseNotFound(id));
            }
        }
        if !self.prerequisites.insert(Prerequisite { course, required }) {
            return Err(CatalogError::DuplicatePrerequisite { course, required });
        }
        Ok(())
    }

    /// Add an offering.
    ///
    /// Faculty existence is checked by the store, which owns the roster.
    pub fn add_offering(&mut self, offering: NewOffering) -> Result<OfferingId, CatalogError> {
        if offering.max_capacity == 0 {
            return Err(CatalogError::InvalidCapacity);
        }
        if !self.courses.contains_key(&offering.course) {
            return Err(CatalogError::CourseNotFound(offering.course));
        }
        if !self.semesters.contains_key(&offering.semester) {
            return Err(CatalogError::SemesterNotFound(offering.semester));
        }
        let section = non_empty(offering.section, "section label")?;
        let duplicate = self.offerings.values().any(|o| {
            o.course == offering.course && o.semester == offering.semester && o.section == section
        });
        if duplicate {
            return Err(CatalogError::DuplicateSection {
                course: offering.course,
                semester: offering.semester,
                section,
            });
        }
        let id = OfferingId::new(self.allocate());
        self.offerings.insert(
            id,
            Offering {
                id,
                course: offering.course,
                semester: offering.semester,
                section,
                faculty: offering.faculty,
                max_capacity: offering.max_capacity,
                meeting: offering.meeting,
            },
        );
        Ok(id)
    }

    /// Remove a course and its prerequisite edges.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::CourseInUse` if any offering references the course.
    pub fn remove_course(&mut self, course: CourseId) -> Result<Course, CatalogError> {
        if !self.courses.contains_key(&course) {
            return Err(CatalogError::CourseNotFound(course));
        }
        let offerings = self.offerings_of(course).count();
        if offerings > 0 {
            return Err(CatalogError::CourseInUse { course, offerings });
        }
        self.prerequisites
            .retain(|edge| edge.course != course && edge.required != course);
        self.courses
            .remove(&course)
            .ok_or(CatalogError::CourseNotFound(course))
    }

    /// Remove an offering. The caller is responsible for checking that no
    /// registration references it.
    pub(crate) fn remove_offering(&mut self, offering: OfferingId) -> Result<Offering, CatalogError> {
        self.offerings
            .remove(&offering)
            .ok_or(CatalogError::OfferingNotFound(offering))
    }

    /// Change an offering's capacity. The caller is responsible for checking
    /// the new capacity against current registrations.
    pub(crate) fn set_capacity(
        &mut self,
        offering: OfferingId,
        capacity: u32,
    ) -> Result<(), CatalogError> {
        if capacity == 0 {
            return Err(CatalogError::InvalidCapacity);
        }
        let entry = self
            .offerings
            .get_mut(&offering)
            .ok_or(CatalogError::OfferingNotFound(offering))?;
        entry.max_capacity = capacity;
        Ok(())
    }
}

fn non_empty(value: String, field: &'static str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_course() -> (Catalog, DepartmentId, CourseId) {
        let mut catalog = Catalog::new();
        let dept = catalog.add_department("Mathematics").unwrap();
        let course = catalog
            .add_course(NewCourse {
                title: "Calculus I".into(),
                credits: 4,
                department: dept,
                description: String::new(),
            })
            .unwrap();
        (catalog, dept, course)
    }

    fn add_course(catalog: &mut Catalog, dept: DepartmentId, title: &str) -> CourseId {
        catalog
            .add_course(NewCourse {
                title: title.into(),
                credits: 3,
                department: dept,
                description: String::new(),
            })
            .unwrap()
    }

    fn new_offering(course: CourseId, semester: SemesterId, section: &str) -> NewOffering {
        NewOffering {
            course,
            semester,
            section: section.into(),
            faculty: FacultyId::new(1),
            max_capacity: 30,
            meeting: None,
        }
    }

    #[test]
    fn course_requires_positive_credits() {
        let (mut catalog, dept, _) = catalog_with_course();
        let result = catalog.add_course(NewCourse {
            title: "Nothing".into(),
            credits: 0,
            department: dept,
            description: String::new(),
        });
        assert_eq!(result, Err(CatalogError::InvalidCredits));
    }

    #[test]
    fn course_requires_existing_department() {
        let mut catalog = Catalog::new();
        let result = catalog.add_course(NewCourse {
            title: "Orphan".into(),
            credits: 3,
            department: DepartmentId::new(99),
            description: String::new(),
        });
        assert_eq!(
            result,
            Err(CatalogError::DepartmentNotFound(DepartmentId::new(99)))
        );
    }

    #[test]
    fn prerequisite_rejects_self_loop_and_duplicates() {
        let (mut catalog, dept, calc1) = catalog_with_course();
        let calc2 = add_course(&mut catalog, dept, "Calculus II");

        assert_eq!(
            catalog.add_prerequisite(calc1, calc1),
            Err(CatalogError::SelfPrerequisite(calc1))
        );
        catalog.add_prerequisite(calc2, calc1).unwrap();
        assert!(matches!(
            catalog.add_prerequisite(calc2, calc1),
            Err(CatalogError::DuplicatePrerequisite { .. })
        ));
        assert_eq!(catalog.prerequisites_of(calc2), vec![calc1]);
        assert!(catalog.prerequisites_of(calc1).is_empty());
    }

    #[test]
    fn transitive_prerequisites_follow_chain_and_survive_cycles() {
        let (mut catalog, dept, a) = catalog_with_course();
        let b = add_course(&mut catalog, dept, "B");
        let c = add_course(&mut catalog, dept, "C");
        catalog.add_prerequisite(c, b).unwrap();
        catalog.add_prerequisite(b, a).unwrap();
        assert_eq!(catalog.transitive_prerequisites_of(c), vec![b, a]);

        // Close the loop a -> c; traversal must still terminate.
        catalog.add_prerequisite(a, c).unwrap();
        assert_eq!(catalog.transitive_prerequisites_of(c), vec![b, a]);
    }

    #[test]
    fn offering_validates_references_and_capacity() {
        let (mut catalog, _, course) = catalog_with_course();
        let fall = catalog.add_semester("Fall 2026", 1).unwrap();

        let mut zero = new_offering(course, fall, "A");
        zero.max_capacity = 0;
        assert_eq!(catalog.add_offering(zero), Err(CatalogError::InvalidCapacity));

        let missing = new_offering(course, SemesterId::new(404), "A");
        assert_eq!(
            catalog.add_offering(missing),
            Err(CatalogError::SemesterNotFound(SemesterId::new(404)))
        );

        catalog.add_offering(new_offering(course, fall, "A")).unwrap();
        assert!(matches!(
            catalog.add_offering(new_offering(course, fall, "A")),
            Err(CatalogError::DuplicateSection { .. })
        ));
        catalog.add_offering(new_offering(course, fall, "B")).unwrap();
        assert_eq!(catalog.offerings_of(course).count(), 2);
    }

    #[test]
    fn course_removal_blocked_by_offerings() {
        let (mut catalog, dept, course) = catalog_with_course();
        let fall = catalog.add_semester("Fall 2026", 1).unwrap();
        let offering = catalog.add_offering(new_offering(course, fall, "A")).unwrap();

        assert_eq!(
            catalog.remove_course(course),
            Err(CatalogError::CourseInUse {
                course,
                offerings: 1
            })
        );

        catalog.remove_offering(offering).unwrap();
        let other = add_course(&mut catalog, dept, "Other");
        catalog.add_prerequisite(other, course).unwrap();
        catalog.remove_course(course).unwrap();
        assert!(catalog.course(course).is_none());
        assert!(catalog.prerequisites_of(other).is_empty());
    }

    #[test]
    fn blank_names_rejected() {
        let mut catalog = Catalog::new();
        assert_eq!(
            catalog.add_department("   "),
            Err(CatalogError::EmptyField("department name"))
        );
    }
}
