//! engine::validate
//!
//! Constraint validators.
//!
//! Each validator is a pure function over data the engine has already read
//! under its locks. None of them touch the store, so they can be tested
//! against hand-built histories and reused by dry-run callers.
//!
//! The engine calls them in a fixed order and stops at the first failure:
//!
//! 1. [`check_prerequisites`]
//! 2. [`check_time_conflict`]
//! 3. [`check_capacity`]
//!
//! Grade corrections run [`check_grade_correction`] so a passing grade that an
//! active registration still depends on cannot be taken away.

use crate::core::catalog::Offering;
use crate::core::policy::GradingPolicy;
use crate::core::types::{CourseId, Grade, OfferingId, RegistrationId};
use crate::store::RegistrationDetail;

use super::error::RegistrationError;

/// Check that every required course has a passing registration.
///
/// `required` is the prerequisite list already expanded per the policy's
/// prerequisite mode. Any offering of a required course counts.
pub fn check_prerequisites(
    course: CourseId,
    required: &[CourseId],
    history: &[RegistrationDetail],
    policy: &GradingPolicy,
) -> Result<(), RegistrationError> {
    let missing: Vec<CourseId> = required
        .iter()
        .copied()
        .filter(|req| {
            !history.iter().any(|d| {
                d.course.id == *req && d.registration.grade.is_some_and(|g| policy.is_passing(g))
            })
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RegistrationError::PrerequisiteNotMet { course, missing })
    }
}

/// Check the target offering against the student's active registrations in
/// the same semester.
///
/// Offerings without a meeting time never conflict.
pub fn check_time_conflict(
    target: &Offering,
    history: &[RegistrationDetail],
) -> Result<(), RegistrationError> {
    let Some(meeting) = target.meeting.as_ref() else {
        return Ok(());
    };

    let conflict = history
        .iter()
        .filter(|d| d.registration.is_active())
        .filter(|d| d.offering.semester == target.semester && d.offering.id != target.id)
        .find(|d| d.offering.meeting.as_ref().is_some_and(|m| m.overlaps(meeting)));

    match conflict {
        Some(d) => Err(RegistrationError::TimeConflict {
            offering: target.id,
            conflicting: d.offering.id,
        }),
        None => Ok(()),
    }
}

/// Check that one more registration fits.
pub fn check_capacity(offering: &Offering, registered: u32) -> Result<(), RegistrationError> {
    if registered < offering.max_capacity {
        Ok(())
    } else {
        Err(RegistrationError::CapacityExceeded {
            offering: offering.id,
            capacity: offering.max_capacity,
        })
    }
}

/// Check a capacity adjustment against the current registration count.
pub fn check_new_capacity(capacity: u32, registered: u32) -> Result<(), RegistrationError> {
    if capacity == 0 {
        return Err(RegistrationError::InvalidCapacity { capacity });
    }
    if capacity < registered {
        return Err(RegistrationError::CapacityBelowEnrollment {
            capacity,
            enrolled: registered,
        });
    }
    Ok(())
}

/// Check that regrading `registration` to `grade` leaves every active
/// registration's prerequisites satisfied.
///
/// `requirements` pairs each of the student's active offerings with its
/// prerequisite list, expanded per the policy's mode. Offerings that were
/// already unsatisfied before the change are not blamed on it.
pub fn check_grade_correction(
    registration: RegistrationId,
    grade: Grade,
    history: &[RegistrationDetail],
    requirements: &[(OfferingId, Vec<CourseId>)],
    policy: &GradingPolicy,
) -> Result<(), RegistrationError> {
    let passed = |course: CourseId, regraded: bool| {
        history.iter().any(|d| {
            let g = if regraded && d.registration.id == registration {
                Some(grade)
            } else {
                d.registration.grade
            };
            d.course.id == course && g.is_some_and(|g| policy.is_passing(g))
        })
    };

    let dependents: Vec<OfferingId> = requirements
        .iter()
        .filter(|(_, required)| {
            required.iter().all(|&c| passed(c, false)) && !required.iter().all(|&c| passed(c, true))
        })
        .map(|(offering, _)| *offering)
        .collect();

    if dependents.is_empty() {
        Ok(())
    } else {
        Err(RegistrationError::PrerequisiteInUse {
            registration,
            dependents,
        })
    }
}

/// Parse a grade token from the fixed enumeration.
pub fn parse_grade(token: &str) -> Result<Grade, RegistrationError> {
    token
        .parse()
        .map_err(|_| RegistrationError::InvalidGrade(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Course;
    use crate::core::policy::PrerequisiteMode;
    use crate::core::registration::Registration;
    use crate::core::types::{
        DaySet, DepartmentId, FacultyId, MeetingTime, OfferingId, RegistrationId, SemesterId,
        StudentId, UtcTimestamp,
    };

    fn course(id: u64) -> Course {
        Course {
            id: CourseId::new(id),
            title: format!("Course {id}"),
            credits: 3,
            department: DepartmentId::new(1),
            description: String::new(),
        }
    }

    fn offering(id: u64, course: u64, semester: u64, meeting: Option<&str>) -> Offering {
        Offering {
            id: OfferingId::new(id),
            course: CourseId::new(course),
            semester: SemesterId::new(semester),
            section: "01".into(),
            faculty: FacultyId::new(1),
            max_capacity: 2,
            meeting: meeting.map(|m| m.parse().unwrap()),
        }
    }

    fn detail(offering: Offering, grade: Option<Grade>) -> RegistrationDetail {
        RegistrationDetail {
            registration: Registration {
                id: RegistrationId::new(offering.id.get()),
                student: StudentId::new(1),
                offering: offering.id,
                grade,
                created_at: UtcTimestamp::now(),
            },
            course: course(offering.course.get()),
            offering,
        }
    }

    mod prerequisites {
        use super::*;

        #[test]
        fn passing_grade_in_any_offering_satisfies() {
            let history = vec![
                detail(offering(1, 10, 1, None), Some(Grade::F)),
                detail(offering(2, 10, 2, None), Some(Grade::C)),
            ];
            let policy = GradingPolicy::default();
            assert!(
                check_prerequisites(CourseId::new(20), &[CourseId::new(10)], &history, &policy)
                    .is_ok()
            );
        }

        #[test]
        fn failing_withdrawn_and_in_progress_do_not_count() {
            let policy = GradingPolicy::default();
            for grade in [Some(Grade::F), Some(Grade::W), Some(Grade::I), None] {
                let history = vec![detail(offering(1, 10, 1, None), grade)];
                let err =
                    check_prerequisites(CourseId::new(20), &[CourseId::new(10)], &history, &policy)
                        .unwrap_err();
                assert_eq!(
                    err,
                    RegistrationError::PrerequisiteNotMet {
                        course: CourseId::new(20),
                        missing: vec![CourseId::new(10)],
                    },
                    "grade {grade:?}"
                );
            }
        }

        #[test]
        fn reports_every_missing_course() {
            let history = vec![detail(offering(1, 10, 1, None), Some(Grade::A))];
            let err = check_prerequisites(
                CourseId::new(40),
                &[CourseId::new(10), CourseId::new(20), CourseId::new(30)],
                &history,
                &GradingPolicy::default(),
            )
            .unwrap_err();
            match err {
                RegistrationError::PrerequisiteNotMet { missing, .. } => {
                    assert_eq!(missing, vec![CourseId::new(20), CourseId::new(30)]);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn stricter_policy_rejects_d() {
            let policy = GradingPolicy::new([Grade::A, Grade::B, Grade::C], PrerequisiteMode::Direct);
            let history = vec![detail(offering(1, 10, 1, None), Some(Grade::D))];
            assert!(
                check_prerequisites(CourseId::new(20), &[CourseId::new(10)], &history, &policy)
                    .is_err()
            );
        }

        #[test]
        fn no_requirements_always_pass() {
            assert!(
                check_prerequisites(CourseId::new(1), &[], &[], &GradingPolicy::default()).is_ok()
            );
        }
    }

    mod time_conflict {
        use super::*;

        #[test]
        fn overlapping_same_semester_conflicts() {
            let target = offering(2, 20, 1, Some("MWF 09:30-10:20"));
            let history = vec![detail(offering(1, 10, 1, Some("MW 09:00-09:50")), None)];
            assert_eq!(
                check_time_conflict(&target, &history),
                Err(RegistrationError::TimeConflict {
                    offering: OfferingId::new(2),
                    conflicting: OfferingId::new(1),
                })
            );
        }

        #[test]
        fn disjoint_times_or_days_pass() {
            let target = offering(2, 20, 1, Some("MWF 10:00-10:50"));
            let history = vec![
                detail(offering(1, 10, 1, Some("MWF 09:00-10:00")), None),
                detail(offering(3, 30, 1, Some("TR 10:00-10:50")), None),
            ];
            assert!(check_time_conflict(&target, &history).is_ok());
        }

        #[test]
        fn other_semester_and_graded_rows_ignored() {
            let target = offering(2, 20, 1, Some("MWF 09:00-09:50"));
            let history = vec![
                detail(offering(1, 10, 2, Some("MWF 09:00-09:50")), None),
                detail(offering(3, 30, 1, Some("MWF 09:00-09:50")), Some(Grade::A)),
            ];
            assert!(check_time_conflict(&target, &history).is_ok());
        }

        #[test]
        fn absent_meeting_never_conflicts() {
            let history = vec![detail(offering(1, 10, 1, Some("MWF 09:00-09:50")), None)];
            assert!(check_time_conflict(&offering(2, 20, 1, None), &history).is_ok());

            let history = vec![detail(offering(1, 10, 1, None), None)];
            assert!(
                check_time_conflict(&offering(2, 20, 1, Some("MWF 09:00-09:50")), &history)
                    .is_ok()
            );
        }

        #[test]
        fn meeting_time_helper_agrees() {
            let a = MeetingTime::new(DaySet::parse("M").unwrap(), 540, 600).unwrap();
            let b = MeetingTime::new(DaySet::parse("M").unwrap(), 599, 660).unwrap();
            assert!(a.overlaps(&b));
        }
    }

    mod capacity {
        use super::*;

        #[test]
        fn strictly_less_than_max() {
            let o = offering(1, 10, 1, None);
            assert!(check_capacity(&o, 0).is_ok());
            assert!(check_capacity(&o, 1).is_ok());
            assert_eq!(
                check_capacity(&o, 2),
                Err(RegistrationError::CapacityExceeded {
                    offering: OfferingId::new(1),
                    capacity: 2,
                })
            );
        }

        #[test]
        fn new_capacity_bounds() {
            assert!(check_new_capacity(5, 5).is_ok());
            assert_eq!(
                check_new_capacity(0, 0),
                Err(RegistrationError::InvalidCapacity { capacity: 0 })
            );
            assert_eq!(
                check_new_capacity(2, 3),
                Err(RegistrationError::CapacityBelowEnrollment {
                    capacity: 2,
                    enrolled: 3,
                })
            );
        }
    }

    mod grade_format {
        use super::*;

        #[test]
        fn accepts_enumeration() {
            for grade in Grade::ALL {
                assert_eq!(parse_grade(grade.as_str()), Ok(grade));
            }
            assert_eq!(parse_grade(" b "), Ok(Grade::B));
        }

        #[test]
        fn rejects_everything_else() {
            for token in ["Z", "", "A+", "AB", "4.0"] {
                assert_eq!(
                    parse_grade(token),
                    Err(RegistrationError::InvalidGrade(token.to_string()))
                );
            }
        }
    }

    mod grade_correction {
        use super::*;

        fn chain() -> (Vec<RegistrationDetail>, Vec<(OfferingId, Vec<CourseId>)>) {
            let history = vec![
                detail(offering(1, 10, 1, None), Some(Grade::A)),
                detail(offering(2, 20, 2, None), None),
            ];
            (history, vec![(OfferingId::new(2), vec![CourseId::new(10)])])
        }

        #[test]
        fn failing_a_relied_on_prerequisite_is_rejected() {
            let (history, requirements) = chain();
            let policy = GradingPolicy::default();
            for grade in [Grade::F, Grade::W, Grade::I] {
                assert_eq!(
                    check_grade_correction(
                        RegistrationId::new(1),
                        grade,
                        &history,
                        &requirements,
                        &policy
                    ),
                    Err(RegistrationError::PrerequisiteInUse {
                        registration: RegistrationId::new(1),
                        dependents: vec![OfferingId::new(2)],
                    })
                );
            }
            assert!(check_grade_correction(
                RegistrationId::new(1),
                Grade::C,
                &history,
                &requirements,
                &policy
            )
            .is_ok());
        }

        #[test]
        fn another_passing_attempt_keeps_it_satisfied() {
            let (mut history, requirements) = chain();
            history.push(detail(offering(3, 10, 1, None), Some(Grade::B)));
            assert!(check_grade_correction(
                RegistrationId::new(1),
                Grade::F,
                &history,
                &requirements,
                &GradingPolicy::default()
            )
            .is_ok());
        }

        #[test]
        fn already_unsatisfied_dependents_are_not_blamed() {
            let (history, _) = chain();
            let requirements = vec![(OfferingId::new(2), vec![CourseId::new(10), CourseId::new(99)])];
            assert!(check_grade_correction(
                RegistrationId::new(1),
                Grade::F,
                &history,
                &requirements,
                &GradingPolicy::default()
            )
            .is_ok());
        }
    }
}
