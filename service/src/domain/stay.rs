//! [`Stay`] definitions.

use common::{unit, Date, DateOf, Month};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Room, Student};
use crate::domain::{room, student};

/// Span of a [`Student`] living in a [`Room`].
///
/// Records are append-only, except the closing of an open [`Stay`].
#[derive(Clone, Debug)]
pub struct Stay {
    /// ID of this [`Stay`].
    pub id: Id,

    /// ID of the [`Student`] staying.
    pub student_id: student::Id,

    /// ID of the [`Room`] the [`Student`] stays in.
    pub room_id: room::Id,

    /// First day of this [`Stay`].
    pub start_date: StartDate,

    /// Last day of this [`Stay`], if it has ended.
    pub end_date: Option<EndDate>,
}

impl Stay {
    /// Indicates whether this [`Stay`] is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }

    /// Closes this [`Stay`] on the provided `date`.
    ///
    /// The `date` is clamped to be not earlier than the start of this
    /// [`Stay`].
    pub fn close(&mut self, date: EndDate) {
        let start = self.start_date.coerce();
        self.end_date = Some(if date < start { start } else { date });
    }

    /// Returns the number of days of this [`Stay`] within the provided
    /// [`Month`].
    #[must_use]
    pub fn days_within(&self, month: Month) -> u32 {
        let (first, last): (Date, Date) = (month.first_day(), month.last_day());
        let start = self.start_date.coerce::<()>().max(first);
        let end = self.end_date.map_or(last, |d| d.coerce::<()>()).min(last);
        u32::try_from(start.days_until(end) + 1).unwrap_or(0)
    }
}

/// ID of a [`Stay`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// First day of a [`Stay`].
pub type StartDate = DateOf<(Stay, unit::Start)>;

/// Last day of a [`Stay`].
pub type EndDate = DateOf<(Stay, unit::End)>;

#[cfg(test)]
mod spec {
    use common::Month;

    use crate::domain::{room, student};

    use super::{Id, Stay};

    fn stay(start: &str, end: Option<&str>) -> Stay {
        Stay {
            id: Id::new(),
            student_id: student::Id::new(),
            room_id: room::Id::new(),
            start_date: start.parse().unwrap(),
            end_date: end.map(|e| e.parse().unwrap()),
        }
    }

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    #[test]
    fn counts_days_within_month() {
        let march = month("03/2025");
        assert_eq!(stay("2025-01-10", None).days_within(march), 31);
        assert_eq!(stay("2025-03-10", None).days_within(march), 22);
        assert_eq!(
            stay("2025-03-10", Some("2025-03-10")).days_within(march),
            1,
        );
        assert_eq!(
            stay("2025-02-01", Some("2025-03-05")).days_within(march),
            5,
        );
        assert_eq!(stay("2025-04-01", None).days_within(march), 0);
        assert_eq!(
            stay("2025-01-01", Some("2025-02-28")).days_within(march),
            0,
        );
    }

    #[test]
    fn closes_not_before_start() {
        let mut s = stay("2025-03-10", None);
        s.close("2025-03-09".parse().unwrap());
        assert_eq!(s.end_date, Some("2025-03-10".parse().unwrap()));
        assert!(!s.is_open());
    }
}
