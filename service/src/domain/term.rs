//! Contract term calculations.
//!
//! A year is split into four calendar quarters: `Jan-Mar`, `Apr-Jun`,
//! `Jul-Sep` and `Oct-Dec`. Contracts always end on the last day of a quarter.

use common::{Date, Month};
use derive_more::{Display, Error};

/// Day of a quarter's middle month starting from which a contract is pushed
/// to the end of the next quarter.
const PUSH_DAY: u8 = 15;

/// Maximum number of days a move-in may happen after the registration.
const MAX_MOVE_IN_DELAY_DAYS: i64 = 3;

/// Calendar quarter of a year.
#[derive(Clone, Copy, Debug, Display, Eq, Ord, PartialEq, PartialOrd)]
#[display("Q{number}/{year}")]
pub struct Quarter {
    /// Year of this [`Quarter`].
    year: i32,

    /// Number of this [`Quarter`] in `1..=4` range.
    number: u8,
}

impl Quarter {
    /// Returns the [`Quarter`] the provided `date` belongs to.
    #[must_use]
    pub fn of(date: Date) -> Self {
        Self {
            year: date.year(),
            number: (date.month() - 1) / 3 + 1,
        }
    }

    /// Returns the number of this [`Quarter`] in `1..=4` range.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.number
    }

    /// Returns the year of this [`Quarter`].
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Returns the [`Quarter`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.number == 4 {
            Self {
                year: self.year + 1,
                number: 1,
            }
        } else {
            Self {
                year: self.year,
                number: self.number + 1,
            }
        }
    }

    /// Returns the middle [`Month`] of this [`Quarter`].
    #[expect(clippy::missing_panics_doc, reason = "always in range")]
    #[must_use]
    pub fn middle_month(self) -> Month {
        Month::new(self.year, (self.number - 1) * 3 + 2)
            .expect("quarter month is always in range")
    }

    /// Returns the last day of this [`Quarter`].
    #[expect(clippy::missing_panics_doc, reason = "always in range")]
    #[must_use]
    pub fn last_day(self) -> Date {
        Month::new(self.year, self.number * 3)
            .expect("quarter month is always in range")
            .last_day()
    }
}

/// Calculates the date a contract starting on the `move_in` date ends.
///
/// Moving in on or after the 15th day of the quarter's middle (or last) month
/// pushes the end to the next quarter.
#[must_use]
pub fn end_date(move_in: Date) -> Date {
    let quarter = Quarter::of(move_in);
    let pushed = Month::of(move_in) >= quarter.middle_month()
        && move_in.day() >= PUSH_DAY;
    if pushed {
        quarter.next().last_day()
    } else {
        quarter.last_day()
    }
}

/// Validates the `move_in` date against the date of `registration`.
///
/// # Errors
///
/// If the `move_in` date is before the `registration` date, or is more than 3
/// days after it.
pub fn validate_move_in(
    move_in: Date,
    registration: Date,
) -> Result<(), MoveInError> {
    let delay = registration.days_until(move_in);
    if delay < 0 {
        return Err(MoveInError::BeforeRegistration {
            move_in,
            registration,
        });
    }
    if delay > MAX_MOVE_IN_DELAY_DAYS {
        return Err(MoveInError::TooLate {
            move_in,
            registration,
        });
    }
    Ok(())
}

/// Error of [`validate_move_in()`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum MoveInError {
    /// Move-in date is before the registration date.
    #[display("move-in date {move_in} is before registration {registration}")]
    BeforeRegistration {
        /// Requested move-in date.
        move_in: Date,

        /// Date of the registration.
        registration: Date,
    },

    /// Move-in date is too far after the registration date.
    #[display(
        "move-in date {move_in} is more than 3 days after registration \
         {registration}"
    )]
    TooLate {
        /// Requested move-in date.
        move_in: Date,

        /// Date of the registration.
        registration: Date,
    },
}

/// Semester a contract term falls into.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Semester {
    /// Summer term (quarters 1 and 2).
    #[display("summer term")]
    Summer,

    /// First term (quarter 3).
    #[display("term 1")]
    First,

    /// Second term (quarter 4).
    #[display("term 2")]
    Second,
}

impl From<Quarter> for Semester {
    fn from(q: Quarter) -> Self {
        match q.number() {
            3 => Self::First,
            4 => Self::Second,
            _ => Self::Summer,
        }
    }
}

/// Academic year running from July till June of the next year.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[display("{start}-{}", start + 1)]
pub struct AcademicYear {
    /// Calendar year the [`AcademicYear`] starts in.
    pub start: i32,
}

impl From<Quarter> for AcademicYear {
    fn from(q: Quarter) -> Self {
        Self {
            start: if q.number() >= 3 { q.year() } else { q.year() - 1 },
        }
    }
}

/// Description of a contract term starting on some move-in date.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Term {
    /// [`Quarter`] of the move-in date.
    pub quarter: Quarter,

    /// [`Semester`] of the move-in date.
    pub semester: Semester,

    /// [`AcademicYear`] of the move-in date.
    pub academic_year: AcademicYear,

    /// Date the contract ends.
    pub end_date: Date,
}

impl Term {
    /// Describes the contract [`Term`] starting on the `move_in` date.
    #[must_use]
    pub fn starting(move_in: Date) -> Self {
        let quarter = Quarter::of(move_in);
        Self {
            quarter,
            semester: quarter.into(),
            academic_year: quarter.into(),
            end_date: end_date(move_in),
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Date;

    use super::{end_date, validate_move_in, MoveInError, Semester, Term};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn stays_within_current_quarter() {
        assert_eq!(end_date(date("2024-09-01")), date("2024-09-30"));
        assert_eq!(end_date(date("2024-07-20")), date("2024-09-30"));
        assert_eq!(end_date(date("2024-08-14")), date("2024-09-30"));
        assert_eq!(end_date(date("2025-01-31")), date("2025-03-31"));
    }

    #[test]
    fn pushes_to_next_quarter() {
        assert_eq!(end_date(date("2024-08-15")), date("2024-12-31"));
        assert_eq!(end_date(date("2024-09-15")), date("2024-12-31"));
        assert_eq!(end_date(date("2025-05-20")), date("2025-09-30"));
    }

    #[test]
    fn wraps_year() {
        assert_eq!(end_date(date("2024-11-15")), date("2025-03-31"));
        assert_eq!(end_date(date("2024-12-31")), date("2025-03-31"));
        assert_eq!(end_date(date("2024-10-31")), date("2024-12-31"));
    }

    #[test]
    fn validates_move_in() {
        let registered = date("2025-03-10");
        assert!(validate_move_in(registered, registered).is_ok());
        assert!(validate_move_in(date("2025-03-13"), registered).is_ok());
        assert!(matches!(
            validate_move_in(date("2025-03-14"), registered),
            Err(MoveInError::TooLate { .. }),
        ));
        assert!(matches!(
            validate_move_in(date("2025-03-09"), registered),
            Err(MoveInError::BeforeRegistration { .. }),
        ));
    }

    #[test]
    fn describes_term() {
        let term = Term::starting(date("2024-09-20"));
        assert_eq!(term.quarter.number(), 3);
        assert_eq!(term.semester, Semester::First);
        assert_eq!(term.academic_year.to_string(), "2024-2025");
        assert_eq!(term.end_date, date("2024-12-31"));

        let term = Term::starting(date("2025-02-03"));
        assert_eq!(term.semester, Semester::Summer);
        assert_eq!(term.semester.to_string(), "summer term");
        assert_eq!(term.academic_year.to_string(), "2024-2025");

        let term = Term::starting(date("2025-11-01"));
        assert_eq!(term.semester, Semester::Second);
        assert_eq!(term.quarter.to_string(), "Q4/2025");
    }
}
