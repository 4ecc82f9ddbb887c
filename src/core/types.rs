//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - Identifiers: [`DepartmentId`], [`CourseId`], [`SemesterId`], [`OfferingId`],
//!   [`StudentId`], [`FacultyId`], [`RegistrationId`]
//! - [`Grade`] - A grade token from the fixed enumeration
//! - [`DaySet`] and [`MeetingTime`] - Meeting-time descriptor used for conflict detection
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use registrar::core::types::{Grade, MeetingTime};
//!
//! // Valid constructions
//! let grade: Grade = "B".parse().unwrap();
//! let slot: MeetingTime = "MWF 09:00-09:50".parse().unwrap();
//! assert_eq!(grade.as_str(), "B");
//! assert_eq!(slot.to_string(), "MWF 09:00-09:50");
//!
//! // Invalid constructions fail at creation time
//! assert!("Z".parse::<Grade>().is_err());
//! assert!("MWF 10:00-09:00".parse::<MeetingTime>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid grade '{0}', must be one of: A, B, C, D, F, W, I")]
    InvalidGrade(String),

    #[error("invalid meeting time: {0}")]
    InvalidMeetingTime(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw identifier.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw identifier.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| TypeError::InvalidId(format!("{} id '{}'", $label, s)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a department.
    DepartmentId,
    "department"
);
define_id!(
    /// Identifier of a course in the catalog.
    CourseId,
    "course"
);
define_id!(
    /// Identifier of a semester.
    SemesterId,
    "semester"
);
define_id!(
    /// Identifier of a scheduled offering of a course.
    OfferingId,
    "offering"
);
define_id!(
    /// Identifier of a student.
    StudentId,
    "student"
);
define_id!(
    /// Identifier of a faculty member.
    FacultyId,
    "faculty"
);
define_id!(
    /// Identifier of a registration (a ledger row).
    RegistrationId,
    "registration"
);

/// A grade token.
///
/// The enumeration is closed: anything outside it is rejected at parse time,
/// so a `Grade` value in the ledger is always valid.
///
/// # Example
///
/// ```
/// use registrar::core::types::Grade;
///
/// assert_eq!("a".parse::<Grade>().unwrap(), Grade::A);
/// assert_eq!(Grade::W.as_str(), "W");
/// assert!("A+".parse::<Grade>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
    /// Withdrawal.
    W,
    /// Incomplete.
    I,
}

impl Grade {
    /// Every grade token, in display order.
    pub const ALL: [Grade; 7] = [
        Grade::A,
        Grade::B,
        Grade::C,
        Grade::D,
        Grade::F,
        Grade::W,
        Grade::I,
    ];

    /// Get the canonical token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
            Grade::W => "W",
            Grade::I => "I",
        }
    }
}

impl FromStr for Grade {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            "W" => Ok(Grade::W),
            "I" => Ok(Grade::I),
            _ => Err(TypeError::InvalidGrade(s.to_string())),
        }
    }
}

impl TryFrom<String> for Grade {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Grade> for String {
    fn from(grade: Grade) -> Self {
        grade.as_str().to_string()
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of weekdays, stored as a bitmask (Monday = bit 0).
///
/// Day letters follow the usual timetable convention:
/// `M T W R F S U` (R is Thursday, U is Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DaySet(u8);

impl DaySet {
    const LETTERS: [char; 7] = ['M', 'T', 'W', 'R', 'F', 'S', 'U'];

    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Parse day letters such as `"MWF"` or `"TR"`.
    pub fn parse(letters: &str) -> Result<Self, TypeError> {
        let mut bits = 0u8;
        for c in letters.chars() {
            let idx = Self::LETTERS
                .iter()
                .position(|l| *l == c.to_ascii_uppercase())
                .ok_or_else(|| {
                    TypeError::InvalidMeetingTime(format!("unknown day letter '{c}'"))
                })?;
            let bit = 1u8 << idx;
            if bits & bit != 0 {
                return Err(TypeError::InvalidMeetingTime(format!(
                    "day letter '{c}' repeated"
                )));
            }
            bits |= bit;
        }
        Ok(Self(bits))
    }

    /// Check whether two sets share at least one day.
    pub fn intersects(self, other: DaySet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, letter) in Self::LETTERS.iter().enumerate() {
            if self.0 & (1 << idx) != 0 {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

/// A weekly meeting-time descriptor: a set of days plus a half-open
/// minute range `[start, end)` measured from midnight.
///
/// The textual form is `"<days> HH:MM-HH:MM"`, e.g. `"TR 13:30-14:45"`.
///
/// # Example
///
/// ```
/// use registrar::core::types::MeetingTime;
///
/// let a: MeetingTime = "MWF 09:00-09:50".parse().unwrap();
/// let b: MeetingTime = "W 09:30-11:00".parse().unwrap();
/// let c: MeetingTime = "TR 09:00-10:15".parse().unwrap();
///
/// assert!(a.overlaps(&b));
/// assert!(!a.overlaps(&c));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeetingTime {
    days: DaySet,
    start: u16,
    end: u16,
}

impl MeetingTime {
    const MINUTES_PER_DAY: u16 = 24 * 60;

    /// Create a validated meeting time.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidMeetingTime` if no day is given, the range is
    /// empty or reversed, or a bound lies outside the day.
    pub fn new(days: DaySet, start: u16, end: u16) -> Result<Self, TypeError> {
        if days.is_empty() {
            return Err(TypeError::InvalidMeetingTime(
                "at least one meeting day is required".into(),
            ));
        }
        if end > Self::MINUTES_PER_DAY {
            return Err(TypeError::InvalidMeetingTime(
                "time range must end within the day".into(),
            ));
        }
        if start >= end {
            return Err(TypeError::InvalidMeetingTime(
                "start time must be before end time".into(),
            ));
        }
        Ok(Self { days, start, end })
    }

    pub fn days(&self) -> DaySet {
        self.days
    }

    /// Start, in minutes after midnight.
    pub fn start(&self) -> u16 {
        self.start
    }

    /// End (exclusive), in minutes after midnight.
    pub fn end(&self) -> u16 {
        self.end
    }

    /// Two descriptors overlap when they share a day and their time ranges
    /// intersect. Back-to-back ranges (one ends when the other starts) do not.
    pub fn overlaps(&self, other: &MeetingTime) -> bool {
        self.days.intersects(other.days) && self.start < other.end && other.start < self.end
    }

    fn parse_clock(s: &str) -> Result<u16, TypeError> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| TypeError::InvalidMeetingTime(format!("expected HH:MM, got '{s}'")))?;
        let h: u16 = h
            .parse()
            .map_err(|_| TypeError::InvalidMeetingTime(format!("invalid hour in '{s}'")))?;
        let m: u16 = m
            .parse()
            .map_err(|_| TypeError::InvalidMeetingTime(format!("invalid minute in '{s}'")))?;
        if m >= 60 || h > 24 || (h == 24 && m != 0) {
            return Err(TypeError::InvalidMeetingTime(format!(
                "clock value out of range: '{s}'"
            )));
        }
        Ok(h * 60 + m)
    }
}

impl FromStr for MeetingTime {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (days, range) = s.trim().split_once(char::is_whitespace).ok_or_else(|| {
            TypeError::InvalidMeetingTime(format!("expected '<days> HH:MM-HH:MM', got '{s}'"))
        })?;
        let (start, end) = range.trim().split_once('-').ok_or_else(|| {
            TypeError::InvalidMeetingTime(format!("expected a time range, got '{range}'"))
        })?;
        Self::new(
            DaySet::parse(days)?,
            Self::parse_clock(start.trim())?,
            Self::parse_clock(end.trim())?,
        )
    }
}

impl TryFrom<String> for MeetingTime {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MeetingTime> for String {
    fn from(slot: MeetingTime) -> Self {
        slot.to_string()
    }
}

impl fmt::Display for MeetingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02}-{:02}:{:02}",
            self.days,
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

/// A UTC timestamp.
///
/// # Example
///
/// ```
/// use registrar::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// println!("Current time: {}", now);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
