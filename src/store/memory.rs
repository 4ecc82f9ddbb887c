//! store::memory
//!
//! Transactional in-memory record store.
//!
//! # Architecture
//!
//! All tables live behind a single `parking_lot::RwLock`. Reads take the
//! shared lock; [`MemoryStore::apply`] takes the exclusive lock for the whole
//! batch, so a batch is never observed half-applied.
//!
//! Each mutation in a batch records its reverse. If a later mutation in the
//! same batch fails, the recorded reversals are replayed newest-first and the
//! error is returned with the tables restored.
//!
//! # Indexes
//!
//! - `(student, offering)` -> registration (uniqueness constraint)
//! - student -> registrations
//! - offering -> registrations (the size of this set is the offering count)
//! - student -> [`StudentTotals`] credit buckets
//!
//! Indexes are maintained by the same three row primitives (`insert_row`,
//! `remove_row`, `regrade_row`), so they cannot drift from the rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{
    Applied, Mutation, RegistrationDetail, RegistrationStore, StoreError, StudentTotals,
};
use crate::core::catalog::{
    Catalog, Course, CatalogError, NewCourse, NewOffering, Offering, Semester,
};
use crate::core::policy::PrerequisiteMode;
use crate::core::registration::Registration;
use crate::core::roster::{Faculty, Roster, Student};
use crate::core::types::{
    CourseId, DepartmentId, FacultyId, Grade, MeetingTime, OfferingId, RegistrationId, SemesterId,
    StudentId,
};

/// Serializable image of the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub catalog: Catalog,
    pub roster: Roster,
    pub registrations: Vec<Registration>,
    pub next_registration: u64,
}

#[derive(Debug, Default)]
struct Tables {
    catalog: Catalog,
    roster: Roster,
    registrations: BTreeMap<RegistrationId, Registration>,
    by_pair: HashMap<(StudentId, OfferingId), RegistrationId>,
    by_student: HashMap<StudentId, BTreeSet<RegistrationId>>,
    by_offering: HashMap<OfferingId, BTreeSet<RegistrationId>>,
    totals: HashMap<StudentId, StudentTotals>,
    next_registration: u64,
}

impl Tables {
    fn credits_for(&self, offering: OfferingId) -> Result<u32, StoreError> {
        let offering = self
            .catalog
            .offering(offering)
            .ok_or(StoreError::OfferingNotFound(offering))?;
        self.catalog
            .course(offering.course)
            .map(|c| c.credits)
            .ok_or_else(|| StoreError::Catalog(CatalogError::CourseNotFound(offering.course)))
    }

    fn insert_row(&mut self, registration: Registration) -> Result<(), StoreError> {
        if self.roster.student(registration.student).is_none() {
            return Err(StoreError::StudentNotFound(registration.student));
        }
        let credits = self.credits_for(registration.offering)?;
        let pair = (registration.student, registration.offering);
        if let Some(existing) = self.by_pair.get(&pair) {
            return Err(StoreError::UniqueViolation {
                student: registration.student,
                offering: registration.offering,
                existing: *existing,
            });
        }

        self.by_pair.insert(pair, registration.id);
        self.by_student
            .entry(registration.student)
            .or_default()
            .insert(registration.id);
        self.by_offering
            .entry(registration.offering)
            .or_default()
            .insert(registration.id);
        self.totals
            .entry(registration.student)
            .or_default()
            .add(registration.grade, credits);
        self.registrations.insert(registration.id, registration);
        Ok(())
    }

    fn remove_row(&mut self, id: RegistrationId) -> Result<Registration, StoreError> {
        let registration = self
            .registrations
            .remove(&id)
            .ok_or(StoreError::RegistrationNotFound(id))?;

        self.by_pair
            .remove(&(registration.student, registration.offering));
        if let Some(set) = self.by_student.get_mut(&registration.student) {
            set.remove(&id);
        }
        if let Some(set) = self.by_offering.get_mut(&registration.offering) {
            set.remove(&id);
        }
        if let Ok(credits) = self.credits_for(registration.offering) {
            if let Some(totals) = self.totals.get_mut(&registration.student) {
                totals.remove(registration.grade, credits);
            }
        }
        Ok(registration)
    }

    fn regrade_row(
        &mut self,
        id: RegistrationId,
        grade: Option<Grade>,
    ) -> Result<(Option<Grade>, Registration), StoreError> {
        let (student, offering, previous) = {
            let row = self
                .registrations
                .get(&id)
                .ok_or(StoreError::RegistrationNotFound(id))?;
            (row.student, row.offering, row.grade)
        };
        let credits = self.credits_for(offering)?;

        let row = self
            .registrations
            .get_mut(&id)
            .ok_or(StoreError::RegistrationNotFound(id))?;
        row.grade = grade;
        let updated = row.clone();

        let totals = self.totals.entry(student).or_default();
        totals.remove(previous, credits);
        totals.add(grade, credits);
        Ok((previous, updated))
    }

    fn apply_one(&mut self, mutation: &Mutation) -> Result<Applied, StoreError> {
        match mutation {
            Mutation::Insert {
                student,
                offering,
                created_at,
            } => {
                let id = RegistrationId::new(self.next_registration + 1);
                let registration = Registration {
                    id,
                    student: *student,
                    offering: *offering,
                    grade: None,
                    created_at: created_at.clone(),
                };
                self.insert_row(registration.clone())?;
                self.next_registration += 1;
                Ok(Applied::Inserted(registration))
            }
            Mutation::Delete { registration } => {
                self.remove_row(*registration).map(Applied::Deleted)
            }
            Mutation::SetGrade {
                registration,
                grade,
            } => {
                let (previous, registration) = self.regrade_row(*registration, Some(*grade))?;
                Ok(Applied::GradeSet {
                    previous,
                    registration,
                })
            }
            Mutation::SetCapacity { offering, capacity } => {
                let previous = self
                    .catalog
                    .offering(*offering)
                    .map(|o| o.max_capacity)
                    .ok_or(StoreError::OfferingNotFound(*offering))?;
                self.catalog.set_capacity(*offering, *capacity)?;
                Ok(Applied::CapacitySet {
                    offering: *offering,
                    previous,
                    capacity: *capacity,
                })
            }
        }
    }

    /// Reverse an applied mutation. Reversal of a just-applied step cannot
    /// fail on consistent tables; a failure here means the tables were
    /// already corrupt.
    fn reverse(&mut self, applied: &Applied) -> Result<(), StoreError> {
        match applied {
            Applied::Inserted(registration) => {
                self.remove_row(registration.id)?;
                if registration.id.get() == self.next_registration {
                    self.next_registration -= 1;
                }
            }
            Applied::Deleted(registration) => {
                self.insert_row(registration.clone())?;
            }
            Applied::GradeSet {
                previous,
                registration,
            } => {
                self.regrade_row(registration.id, *previous)?;
            }
            Applied::CapacitySet {
                offering, previous, ..
            } => {
                self.catalog.set_capacity(*offering, *previous)?;
            }
        }
        Ok(())
    }

    fn detail(&self, registration: &Registration) -> Option<RegistrationDetail> {
        let offering = self.catalog.offering(registration.offering)?;
        let course = self.catalog.course(offering.course)?;
        Some(RegistrationDetail {
            registration: registration.clone(),
            offering: offering.clone(),
            course: course.clone(),
        })
    }

    fn offering_count(&self, offering: OfferingId) -> usize {
        self.by_offering.get(&offering).map_or(0, BTreeSet::len)
    }
}

/// In-memory implementation of [`RegistrationStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot, re-deriving every index.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the snapshot violates a constraint
    /// (dangling reference, duplicate pair, id beyond the counter).
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut tables = Tables {
            catalog: snapshot.catalog,
            roster: snapshot.roster,
            next_registration: snapshot.next_registration,
            ..Tables::default()
        };
        for registration in snapshot.registrations {
            if registration.id.get() > tables.next_registration {
                return Err(StoreError::Corrupt(format!(
                    "registration {} is beyond the id counter {}",
                    registration.id, tables.next_registration
                )));
            }
            if tables.registrations.contains_key(&registration.id) {
                return Err(StoreError::Corrupt(format!(
                    "registration {} appears twice",
                    registration.id
                )));
            }
            let id = registration.id;
            tables
                .insert_row(registration)
                .map_err(|e| StoreError::Corrupt(format!("registration {id}: {e}")))?;
        }
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Take a consistent image of the whole store.
    pub fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read();
        Snapshot {
            catalog: tables.catalog.clone(),
            roster: tables.roster.clone(),
            registrations: tables.registrations.values().cloned().collect(),
            next_registration: tables.next_registration,
        }
    }

    /// Run a read-only closure over the catalog and roster.
    pub fn read_catalog<R>(&self, f: impl FnOnce(&Catalog, &Roster) -> R) -> R {
        let tables = self.tables.read();
        f(&tables.catalog, &tables.roster)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub fn add_department(&self, name: &str) -> Result<DepartmentId, StoreError> {
        Ok(self.tables.write().catalog.add_department(name)?)
    }

    pub fn add_semester(&self, label: &str, ordinal: u32) -> Result<SemesterId, StoreError> {
        Ok(self.tables.write().catalog.add_semester(label, ordinal)?)
    }

    pub fn add_course(&self, course: NewCourse) -> Result<CourseId, StoreError> {
        Ok(self.tables.write().catalog.add_course(course)?)
    }

    pub fn add_prerequisite(&self, course: CourseId, required: CourseId) -> Result<(), StoreError> {
        Ok(self
            .tables
            .write()
            .catalog
            .add_prerequisite(course, required)?)
    }

    /// Add an offering taught by an existing faculty member.
    pub fn add_offering(&self, offering: NewOffering) -> Result<OfferingId, StoreError> {
        let mut tables = self.tables.write();
        if tables.roster.faculty(offering.faculty).is_none() {
            return Err(StoreError::FacultyNotFound(offering.faculty));
        }
        Ok(tables.catalog.add_offering(offering)?)
    }

    /// Create a course together with its first offering, atomically.
    ///
    /// If the offering is rejected the course is removed again before the
    /// write lock is released.
    pub fn create_course_with_offering(
        &self,
        course: NewCourse,
        semester: SemesterId,
        section: &str,
        faculty: FacultyId,
        max_capacity: u32,
        meeting: Option<MeetingTime>,
    ) -> Result<(CourseId, OfferingId), StoreError> {
        let mut tables = self.tables.write();
        if tables.roster.faculty(faculty).is_none() {
            return Err(StoreError::FacultyNotFound(faculty));
        }
        let course = tables.catalog.add_course(course)?;
        let offering = tables.catalog.add_offering(NewOffering {
            course,
            semester,
            section: section.to_string(),
            faculty,
            max_capacity,
            meeting,
        });
        match offering {
            Ok(offering) => Ok((course, offering)),
            Err(e) => {
                tables.catalog.remove_course(course)?;
                Err(e.into())
            }
        }
    }

    /// Remove a course. Fails while any offering references it.
    pub fn remove_course(&self, course: CourseId) -> Result<Course, StoreError> {
        Ok(self.tables.write().catalog.remove_course(course)?)
    }

    /// Remove an offering. Fails while any registration references it.
    pub fn remove_offering(&self, offering: OfferingId) -> Result<Offering, StoreError> {
        let mut tables = self.tables.write();
        let registrations = tables.offering_count(offering);
        if registrations > 0 {
            return Err(StoreError::OfferingInUse {
                offering,
                registrations,
            });
        }
        tables.by_offering.remove(&offering);
        Ok(tables.catalog.remove_offering(offering)?)
    }

    pub fn add_student(
        &self,
        name: &str,
        department: DepartmentId,
        enrollment_year: u16,
    ) -> Result<StudentId, StoreError> {
        let mut tables = self.tables.write();
        let exists = tables.catalog.department(department).is_some();
        Ok(tables
            .roster
            .add_student(name, department, enrollment_year, exists)?)
    }

    pub fn add_faculty(&self, name: &str, department: DepartmentId) -> Result<FacultyId, StoreError> {
        let mut tables = self.tables.write();
        let exists = tables.catalog.department(department).is_some();
        Ok(tables.roster.add_faculty(name, department, exists)?)
    }
}

impl RegistrationStore for MemoryStore {
    fn offering(&self, id: OfferingId) -> Result<Option<Offering>, StoreError> {
        Ok(self.tables.read().catalog.offering(id).cloned())
    }

    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        Ok(self.tables.read().catalog.course(id).cloned())
    }

    fn semester(&self, id: SemesterId) -> Result<Option<Semester>, StoreError> {
        Ok(self.tables.read().catalog.semester(id).cloned())
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        Ok(self.tables.read().roster.student(id).cloned())
    }

    fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, StoreError> {
        Ok(self.tables.read().roster.faculty(id).cloned())
    }

    fn offerings(&self) -> Result<Vec<Offering>, StoreError> {
        Ok(self.tables.read().catalog.offerings().cloned().collect())
    }

    fn prerequisites_of(
        &self,
        course: CourseId,
        mode: PrerequisiteMode,
    ) -> Result<Vec<CourseId>, StoreError> {
        let tables = self.tables.read();
        Ok(match mode {
            PrerequisiteMode::Direct => tables.catalog.prerequisites_of(course),
            PrerequisiteMode::Transitive => tables.catalog.transitive_prerequisites_of(course),
        })
    }

    fn registration(&self, id: RegistrationId) -> Result<Option<Registration>, StoreError> {
        Ok(self.tables.read().registrations.get(&id).cloned())
    }

    fn registration_for(
        &self,
        student: StudentId,
        offering: OfferingId,
    ) -> Result<Option<Registration>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .by_pair
            .get(&(student, offering))
            .and_then(|id| tables.registrations.get(id))
            .cloned())
    }

    fn student_history(&self, student: StudentId) -> Result<Vec<RegistrationDetail>, StoreError> {
        let tables = self.tables.read();
        let Some(ids) = tables.by_student.get(&student) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .map(|id| {
                tables
                    .registrations
                    .get(id)
                    .and_then(|r| tables.detail(r))
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!("registration {id} has a dangling reference"))
                    })
            })
            .collect()
    }

    fn offering_registrations(
        &self,
        offering: OfferingId,
    ) -> Result<Vec<Registration>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .by_offering
            .get(&offering)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.registrations.get(id).cloned())
            .collect())
    }

    fn offering_count(&self, offering: OfferingId) -> Result<u32, StoreError> {
        let count = self.tables.read().offering_count(offering);
        u32::try_from(count)
            .map_err(|_| StoreError::Corrupt(format!("offering {offering} count overflow")))
    }

    fn student_totals(&self, student: StudentId) -> Result<StudentTotals, StoreError> {
        Ok(self
            .tables
            .read()
            .totals
            .get(&student)
            .cloned()
            .unwrap_or_default())
    }

    fn apply(&self, batch: &[Mutation]) -> Result<Vec<Applied>, StoreError> {
        let mut tables = self.tables.write();
        let mut applied = Vec::with_capacity(batch.len());
        for mutation in batch {
            match tables.apply_one(mutation) {
                Ok(step) => applied.push(step),
                Err(err) => {
                    for step in applied.iter().rev() {
                        tables.reverse(step).map_err(|e| {
                            StoreError::Corrupt(format!("rollback failed after '{err}': {e}"))
                        })?;
                    }
                    return Err(err);
                }
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UtcTimestamp;

    struct Fixture {
        store: MemoryStore,
        alice: StudentId,
        bob: StudentId,
        offering: OfferingId,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let dept = store.add_department("Physics").unwrap();
        let fall = store.add_semester("Fall", 1).unwrap();
        let prof = store.add_faculty("Noether", dept).unwrap();
        let course = store
            .add_course(NewCourse {
                title: "Mechanics".into(),
                credits: 4,
                department: dept,
                description: String::new(),
            })
            .unwrap();
        let offering = store
            .add_offering(NewOffering {
                course,
                semester: fall,
                section: "01".into(),
                faculty: prof,
                max_capacity: 2,
                meeting: None,
            })
            .unwrap();
        let alice = store.add_student("Alice", dept, 2025).unwrap();
        let bob = store.add_student("Bob", dept, 2025).unwrap();
        Fixture {
            store,
            alice,
            bob,
            offering,
        }
    }

    fn insert(student: StudentId, offering: OfferingId) -> Mutation {
        Mutation::Insert {
            student,
            offering,
            created_at: UtcTimestamp::now(),
        }
    }

    fn inserted_id(applied: &[Applied]) -> RegistrationId {
        match &applied[0] {
            Applied::Inserted(r) => r.id,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn insert_maintains_indexes_and_totals() {
        let f = fixture();
        let applied = f.store.apply(&[insert(f.alice, f.offering)]).unwrap();
        let id = inserted_id(&applied);

        assert_eq!(f.store.offering_count(f.offering).unwrap(), 1);
        assert_eq!(
            f.store.registration_for(f.alice, f.offering).unwrap().unwrap().id,
            id
        );
        assert_eq!(f.store.student_totals(f.alice).unwrap().in_progress_credits, 4);
    }

    #[test]
    fn unique_pair_enforced() {
        let f = fixture();
        f.store.apply(&[insert(f.alice, f.offering)]).unwrap();
        let err = f.store.apply(&[insert(f.alice, f.offering)]).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
        assert_eq!(f.store.offering_count(f.offering).unwrap(), 1);
    }

    #[test]
    fn failed_batch_is_rolled_back() {
        let f = fixture();
        let before = f.store.snapshot();

        // Second mutation references a missing registration.
        let err = f
            .store
            .apply(&[
                insert(f.bob, f.offering),
                Mutation::Delete {
                    registration: RegistrationId::new(999),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::RegistrationNotFound(_)));

        assert_eq!(f.store.snapshot(), before);
        assert_eq!(f.store.offering_count(f.offering).unwrap(), 0);
        assert_eq!(f.store.student_totals(f.bob).unwrap(), StudentTotals::default());
    }

    #[test]
    fn regrade_moves_credits_between_buckets() {
        let f = fixture();
        let id = inserted_id(&f.store.apply(&[insert(f.alice, f.offering)]).unwrap());
        f.store
            .apply(&[Mutation::SetGrade {
                registration: id,
                grade: Grade::B,
            }])
            .unwrap();

        let totals = f.store.student_totals(f.alice).unwrap();
        assert_eq!(totals.in_progress_credits, 0);
        assert_eq!(totals.credits_by_grade.get(&Grade::B), Some(&4));

        let history = f.store.student_history(f.alice).unwrap();
        assert_eq!(StudentTotals::from_history(&history), totals);
    }

    #[test]
    fn snapshot_round_trip_rebuilds_indexes() {
        let f = fixture();
        f.store
            .apply(&[insert(f.alice, f.offering), insert(f.bob, f.offering)])
            .unwrap();

        let restored = MemoryStore::from_snapshot(f.store.snapshot()).unwrap();
        assert_eq!(restored.offering_count(f.offering).unwrap(), 2);
        assert_eq!(
            restored.student_totals(f.bob).unwrap(),
            f.store.student_totals(f.bob).unwrap()
        );

        // Ids continue after the restored counter.
        let first = restored.registration_for(f.alice, f.offering).unwrap().unwrap();
        restored
            .apply(&[Mutation::Delete {
                registration: first.id,
            }])
            .unwrap();
        let again = inserted_id(&restored.apply(&[insert(f.alice, f.offering)]).unwrap());
        assert_eq!(again, RegistrationId::new(3));
    }

    #[test]
    fn corrupt_snapshot_rejected() {
        let f = fixture();
        f.store.apply(&[insert(f.alice, f.offering)]).unwrap();
        let mut snapshot = f.store.snapshot();
        let mut dup = snapshot.registrations[0].clone();
        snapshot.next_registration += 1;
        dup.id = RegistrationId::new(snapshot.next_registration);
        snapshot.registrations.push(dup);

        assert!(matches!(
            MemoryStore::from_snapshot(snapshot),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn offering_removal_blocked_by_registrations() {
        let f = fixture();
        f.store.apply(&[insert(f.alice, f.offering)]).unwrap();
        assert!(matches!(
            f.store.remove_offering(f.offering),
            Err(StoreError::OfferingInUse {
                registrations: 1,
                ..
            })
        ));
    }

    #[test]
    fn course_with_offering_is_created_together() {
        let f = fixture();
        let (dept, fall, prof) = f.store.read_catalog(|c, r| {
            let o = c.offering(f.offering).unwrap();
            (r.faculty(o.faculty).unwrap().department, o.semester, o.faculty)
        });
        let (course, offering) = f
            .store
            .create_course_with_offering(
                NewCourse {
                    title: "Optics".into(),
                    credits: 3,
                    department: dept,
                    description: String::new(),
                },
                fall,
                "A",
                prof,
                20,
                Some("TR 10:00-11:15".parse().unwrap()),
            )
            .unwrap();

        let o = f.store.offering(offering).unwrap().unwrap();
        assert_eq!((o.course, o.faculty, o.max_capacity), (course, prof, 20));
        assert!(o.meeting.is_some());
        assert_eq!(f.store.course(course).unwrap().unwrap().title, "Optics");
    }

    #[test]
    fn rejected_offering_rolls_back_the_course() {
        let f = fixture();
        let (dept, fall, prof) = f.store.read_catalog(|c, r| {
            let o = c.offering(f.offering).unwrap();
            (r.faculty(o.faculty).unwrap().department, o.semester, o.faculty)
        });
        let courses = || f.store.read_catalog(|c, _| c.courses().count());
        let before = courses();
        let new_course = || NewCourse {
            title: "Acoustics".into(),
            credits: 3,
            department: dept,
            description: String::new(),
        };

        // Zero capacity and an unknown semester both fail after the course insert.
        let err = f
            .store
            .create_course_with_offering(new_course(), fall, "A", prof, 0, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Catalog(_)));
        let err = f
            .store
            .create_course_with_offering(new_course(), SemesterId::new(404), "A", prof, 5, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Catalog(_)));
        assert_eq!(courses(), before);
        assert!(f
            .store
            .read_catalog(|c, _| c.courses().all(|course| course.title != "Acoustics")));

        // An unknown instructor is refused before anything is written.
        let err = f
            .store
            .create_course_with_offering(new_course(), fall, "A", FacultyId::new(404), 5, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::FacultyNotFound(_)));
        assert_eq!(courses(), before);
    }

    #[test]
    fn offering_requires_existing_faculty() {
        let f = fixture();
        let (course, semester) = f
            .store
            .read_catalog(|c, _| {
                let o = c.offering(f.offering).unwrap();
                (o.course, o.semester)
            });
        let err = f
            .store
            .add_offering(NewOffering {
                course,
                semester,
                section: "02".into(),
                faculty: FacultyId::new(404),
                max_capacity: 10,
                meeting: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::FacultyNotFound(_)));
    }
}
