//! views
//!
//! Aggregation views: derived, read-only projections of the ledger.
//!
//! # Architecture
//!
//! Two families of functions compute the same figures:
//!
//! - The top-level functions ([`credit_summary`], [`gpa`],
//!   [`seats_remaining`]) read the aggregates the store maintains
//!   incrementally as batches commit. These are the fast path.
//! - [`fresh`] recomputes each figure from the full registration history.
//!
//! The two must always agree. Grade points are summed in integer tenths, so
//! agreement is exact, not approximate.
//!
//! Views take no engine locks. They observe every committed batch (the
//! store's read-committed contract) and may miss in-flight ones.
//!
//! The dashboard projections ([`transcript`], [`available_offerings`],
//! [`teaching_load`]) join ledger rows with catalog and roster records for
//! display.

use serde::Serialize;

use crate::core::catalog::{Course, Offering};
use crate::core::policy::GradingPolicy;
use crate::core::registration::Registration;
use crate::core::types::{FacultyId, Grade, OfferingId, RegistrationId, StudentId};
use crate::store::{RegistrationStore, StoreError, StudentTotals};

/// Completed and in-progress credits, kept apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CreditSummary {
    /// Credits with a passing grade.
    pub completed: u32,
    /// Credits for registrations without a grade.
    pub in_progress: u32,
}

/// Exact GPA accumulator: sum of (points in tenths x credits) over graded
/// credits that carry points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct GpaSum {
    weighted_tenths: u64,
    credits: u64,
}

impl GpaSum {
    fn add(&mut self, policy: &GradingPolicy, grade: Grade, credits: u32) {
        if let Some(points) = policy.points_tenths(grade) {
            self.weighted_tenths += u64::from(points) * u64::from(credits);
            self.credits += u64::from(credits);
        }
    }

    fn value(self) -> f64 {
        if self.credits == 0 {
            0.0
        } else {
            self.weighted_tenths as f64 / (self.credits as f64 * 10.0)
        }
    }
}

fn summarize(totals: &StudentTotals, policy: &GradingPolicy) -> CreditSummary {
    CreditSummary {
        completed: totals
            .credits_by_grade
            .iter()
            .filter(|(g, _)| policy.is_passing(**g))
            .map(|(_, c)| *c)
            .sum(),
        in_progress: totals.in_progress_credits,
    }
}

fn gpa_of(totals: &StudentTotals, policy: &GradingPolicy) -> f64 {
    let mut sum = GpaSum::default();
    for (grade, credits) in &totals.credits_by_grade {
        sum.add(policy, *grade, *credits);
    }
    sum.value()
}

/// Completed and in-progress credits from the maintained aggregates.
pub fn credit_summary<S>(
    store: &S,
    policy: &GradingPolicy,
    student: StudentId,
) -> Result<CreditSummary, StoreError>
where
    S: RegistrationStore + ?Sized,
{
    Ok(summarize(&store.student_totals(student)?, policy))
}

/// Credit-weighted GPA from the maintained aggregates.
///
/// Returns 0.0 when the student has no graded registration with points.
pub fn gpa<S>(store: &S, policy: &GradingPolicy, student: StudentId) -> Result<f64, StoreError>
where
    S: RegistrationStore + ?Sized,
{
    Ok(gpa_of(&store.student_totals(student)?, policy))
}

/// Seats left in an offering.
pub fn seats_remaining<S>(store: &S, offering: OfferingId) -> Result<u32, StoreError>
where
    S: RegistrationStore + ?Sized,
{
    let row = store
        .offering(offering)?
        .ok_or(StoreError::OfferingNotFound(offering))?;
    Ok(row
        .max_capacity
        .saturating_sub(store.offering_count(offering)?))
}

/// Recomputation from full history.
pub mod fresh {
    use super::*;

    pub fn credit_summary<S>(
        store: &S,
        policy: &GradingPolicy,
        student: StudentId,
    ) -> Result<CreditSummary, StoreError>
    where
        S: RegistrationStore + ?Sized,
    {
        let mut summary = CreditSummary::default();
        for detail in store.student_history(student)? {
            match detail.registration.grade {
                None => summary.in_progress += detail.course.credits,
                Some(g) if policy.is_passing(g) => summary.completed += detail.course.credits,
                Some(_) => {}
            }
        }
        Ok(summary)
    }

    pub fn gpa<S>(store: &S, policy: &GradingPolicy, student: StudentId) -> Result<f64, StoreError>
    where
        S: RegistrationStore + ?Sized,
    {
        let mut sum = GpaSum::default();
        for detail in store.student_history(student)? {
            if let Some(grade) = detail.registration.grade {
                sum.add(policy, grade, detail.course.credits);
            }
        }
        Ok(sum.value())
    }

    pub fn seats_remaining<S>(store: &S, offering: OfferingId) -> Result<u32, StoreError>
    where
        S: RegistrationStore + ?Sized,
    {
        let row = store
            .offering(offering)?
            .ok_or(StoreError::OfferingNotFound(offering))?;
        let registered = store.offering_registrations(offering)?.len();
        let registered = u32::try_from(registered).unwrap_or(u32::MAX);
        Ok(row.max_capacity.saturating_sub(registered))
    }
}

// =============================================================================
// Dashboards
// =============================================================================

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptLine {
    pub registration: RegistrationId,
    pub offering: OfferingId,
    pub course: String,
    pub credits: u32,
    pub semester: String,
    pub section: String,
    pub grade: Option<Grade>,
}

/// A student's registrations, ordered by semester then course title.
pub fn transcript<S>(store: &S, student: StudentId) -> Result<Vec<TranscriptLine>, StoreError>
where
    S: RegistrationStore + ?Sized,
{
    let mut lines = Vec::new();
    for detail in store.student_history(student)? {
        let semester = store.semester(detail.offering.semester)?;
        let (ordinal, label) = semester.map_or((u32::MAX, String::new()), |s| (s.ordinal, s.label));
        lines.push((
            ordinal,
            TranscriptLine {
                registration: detail.registration.id,
                offering: detail.offering.id,
                course: detail.course.title,
                credits: detail.course.credits,
                semester: label,
                section: detail.offering.section,
                grade: detail.registration.grade,
            },
        ));
    }
    lines.sort_by(|(a, la), (b, lb)| a.cmp(b).then_with(|| la.course.cmp(&lb.course)));
    Ok(lines.into_iter().map(|(_, line)| line).collect())
}

/// An offering a student could still register in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableOffering {
    pub offering: Offering,
    pub course: Course,
    pub seats_remaining: u32,
}

/// Offerings the student holds no registration in, with seat counts.
///
/// Full offerings are listed too (with zero seats); prerequisite and
/// schedule checks happen only at enroll time.
pub fn available_offerings<S>(
    store: &S,
    student: StudentId,
) -> Result<Vec<AvailableOffering>, StoreError>
where
    S: RegistrationStore + ?Sized,
{
    let mut available = Vec::new();
    for offering in store.offerings()? {
        if store.registration_for(student, offering.id)?.is_some() {
            continue;
        }
        let Some(course) = store.course(offering.course)? else {
            continue;
        };
        let registered = store.offering_count(offering.id)?;
        available.push(AvailableOffering {
            seats_remaining: offering.max_capacity.saturating_sub(registered),
            offering,
            course,
        });
    }
    Ok(available)
}

/// A student on a class list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassListEntry {
    pub registration: RegistrationId,
    pub student: StudentId,
    pub name: String,
    pub grade: Option<Grade>,
}

/// One offering a faculty member teaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeachingLine {
    pub offering: Offering,
    pub course: Course,
    pub students: Vec<ClassListEntry>,
}

/// Offerings taught by a faculty member, each with its class list.
pub fn teaching_load<S>(store: &S, faculty: FacultyId) -> Result<Vec<TeachingLine>, StoreError>
where
    S: RegistrationStore + ?Sized,
{
    let mut lines = Vec::new();
    for offering in store.offerings()?.into_iter().filter(|o| o.faculty == faculty) {
        let Some(course) = store.course(offering.course)? else {
            continue;
        };
        let students = store
            .offering_registrations(offering.id)?
            .into_iter()
            .map(|r: Registration| -> Result<ClassListEntry, StoreError> {
                let name = store
                    .student(r.student)?
                    .map(|s| s.name)
                    .unwrap_or_default();
                Ok(ClassListEntry {
                    registration: r.id,
                    student: r.student,
                    name,
                    grade: r.grade,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        lines.push(TeachingLine {
            offering,
            course,
            students,
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{NewCourse, NewOffering};
    use crate::core::policy::PrerequisiteMode;
    use crate::core::types::UtcTimestamp;
    use crate::store::{Applied, MemoryStore, Mutation};

    struct Fixture {
        store: MemoryStore,
        student: StudentId,
        prof: FacultyId,
        three: OfferingId,
        four: OfferingId,
        one: OfferingId,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let dept = store.add_department("Biology").unwrap();
        let fall = store.add_semester("Fall", 2).unwrap();
        let spring = store.add_semester("Spring", 1).unwrap();
        let prof = store.add_faculty("McClintock", dept).unwrap();
        let offering = |title: &str, credits: u32, semester| {
            let course = store
                .add_course(NewCourse {
                    title: title.into(),
                    credits,
                    department: dept,
                    description: String::new(),
                })
                .unwrap();
            store
                .add_offering(NewOffering {
                    course,
                    semester,
                    section: "01".into(),
                    faculty: prof,
                    max_capacity: 3,
                    meeting: None,
                })
                .unwrap()
        };
        let three = offering("Genetics", 3, fall);
        let four = offering("Botany", 4, spring);
        let one = offering("Lab", 1, fall);
        let student = store.add_student("Barbara", dept, 2023).unwrap();
        Fixture {
            store,
            student,
            prof,
            three,
            four,
            one,
        }
    }

    fn enroll(f: &Fixture, offering: OfferingId) -> RegistrationId {
        match &f
            .store
            .apply(&[Mutation::Insert {
                student: f.student,
                offering,
                created_at: UtcTimestamp::now(),
            }])
            .unwrap()[0]
        {
            Applied::Inserted(r) => r.id,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn grade(f: &Fixture, registration: RegistrationId, grade: Grade) {
        f.store
            .apply(&[Mutation::SetGrade { registration, grade }])
            .unwrap();
    }

    #[test]
    fn empty_student_has_zero_everything() {
        let f = fixture();
        let policy = GradingPolicy::default();
        assert_eq!(
            credit_summary(&f.store, &policy, f.student).unwrap(),
            CreditSummary::default()
        );
        assert_eq!(gpa(&f.store, &policy, f.student).unwrap(), 0.0);
        assert_eq!(fresh::gpa(&f.store, &policy, f.student).unwrap(), 0.0);
    }

    #[test]
    fn completed_and_in_progress_are_separate() {
        let f = fixture();
        let policy = GradingPolicy::default();
        let a = enroll(&f, f.three);
        enroll(&f, f.four);
        let c = enroll(&f, f.one);
        grade(&f, a, Grade::A);
        grade(&f, c, Grade::F);

        let summary = credit_summary(&f.store, &policy, f.student).unwrap();
        assert_eq!(
            summary,
            CreditSummary {
                completed: 3,
                in_progress: 4
            }
        );
        assert_eq!(summary, fresh::credit_summary(&f.store, &policy, f.student).unwrap());
    }

    #[test]
    fn gpa_is_credit_weighted_and_skips_w_and_i() {
        let f = fixture();
        let policy = GradingPolicy::default();
        let a = enroll(&f, f.three);
        let b = enroll(&f, f.four);
        let w = enroll(&f, f.one);
        grade(&f, a, Grade::A);
        grade(&f, b, Grade::C);
        grade(&f, w, Grade::W);

        // (4.0 * 3 + 2.0 * 4) / 7
        let expected = 20.0 / 7.0;
        let incremental = gpa(&f.store, &policy, f.student).unwrap();
        assert!((incremental - expected).abs() < 1e-12);
        assert_eq!(incremental, fresh::gpa(&f.store, &policy, f.student).unwrap());
    }

    #[test]
    fn policy_changes_apply_to_existing_buckets() {
        let f = fixture();
        let a = enroll(&f, f.three);
        grade(&f, a, Grade::D);
        let lenient = GradingPolicy::default();
        let strict = GradingPolicy::new([Grade::A, Grade::B, Grade::C], PrerequisiteMode::Direct);
        assert_eq!(
            credit_summary(&f.store, &lenient, f.student).unwrap().completed,
            3
        );
        assert_eq!(
            credit_summary(&f.store, &strict, f.student).unwrap().completed,
            0
        );
    }

    #[test]
    fn seats_remaining_matches_fresh_count() {
        let f = fixture();
        enroll(&f, f.three);
        assert_eq!(seats_remaining(&f.store, f.three).unwrap(), 2);
        assert_eq!(fresh::seats_remaining(&f.store, f.three).unwrap(), 2);
        assert!(matches!(
            seats_remaining(&f.store, OfferingId::new(999)),
            Err(StoreError::OfferingNotFound(_))
        ));
    }

    #[test]
    fn transcript_is_ordered_by_semester() {
        let f = fixture();
        enroll(&f, f.three);
        enroll(&f, f.four);
        let lines = transcript(&f.store, f.student).unwrap();
        let titles: Vec<&str> = lines.iter().map(|l| l.course.as_str()).collect();
        assert_eq!(titles, vec!["Botany", "Genetics"]);
        assert_eq!(lines[0].semester, "Spring");
    }

    #[test]
    fn available_excludes_held_offerings() {
        let f = fixture();
        enroll(&f, f.three);
        let ids: Vec<OfferingId> = available_offerings(&f.store, f.student)
            .unwrap()
            .into_iter()
            .map(|a| a.offering.id)
            .collect();
        assert_eq!(ids, vec![f.four, f.one]);
    }

    #[test]
    fn teaching_load_lists_class() {
        let f = fixture();
        enroll(&f, f.three);
        let load = teaching_load(&f.store, f.prof).unwrap();
        assert_eq!(load.len(), 3);
        let genetics = load.iter().find(|l| l.offering.id == f.three).unwrap();
        assert_eq!(genetics.students.len(), 1);
        assert_eq!(genetics.students[0].name, "Barbara");
        assert!(teaching_load(&f.store, FacultyId::new(404)).unwrap().is_empty());
    }
}
