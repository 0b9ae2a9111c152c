//! Calendar date utilities.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{cmp::Ordering, fmt, hash, marker::PhantomData, str::FromStr};

use derive_more::Debug;
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::{format_description::FormatItem, macros::format_description};

use crate::DateTime;

/// Untyped calendar date.
pub type Date = DateOf;

/// Format of a [`Date`] in its textual representation.
const FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Calendar date (without time and offset), in UTC.
#[derive(Debug)]
pub struct DateOf<Of: ?Sized = ()> {
    /// Inner representation of the date.
    #[debug("{inner}")]
    inner: time::Date,

    /// Type parameter describing the kind of date.
    #[debug(skip)]
    _of: PhantomData<Of>,
}

impl<Of: ?Sized> DateOf<Of> {
    /// Creates a new [`Date`] out of the provided components.
    ///
    /// [`None`] is returned if the components don't form a valid date.
    #[must_use]
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = time::Month::try_from(month).ok()?;
        time::Date::from_calendar_date(year, month, day)
            .ok()
            .map(Self::from)
    }

    /// Returns the current UTC [`Date`].
    #[must_use]
    pub fn today() -> Self {
        DateTime::now().date()
    }

    /// Returns the year of this [`Date`].
    #[must_use]
    pub fn year(&self) -> i32 {
        self.inner.year()
    }

    /// Returns the month of this [`Date`] in `1..=12` range.
    #[must_use]
    pub fn month(&self) -> u8 {
        self.inner.month().into()
    }

    /// Returns the day of month of this [`Date`] in `1..=31` range.
    #[must_use]
    pub fn day(&self) -> u8 {
        self.inner.day()
    }

    /// Returns the [`Date`] following this one.
    #[expect(clippy::missing_panics_doc, reason = "out of domain range")]
    #[must_use]
    pub fn next_day(self) -> Self {
        Self::from(self.inner.next_day().expect("date overflow"))
    }

    /// Returns the [`Date`] preceding this one.
    #[expect(clippy::missing_panics_doc, reason = "out of domain range")]
    #[must_use]
    pub fn previous_day(self) -> Self {
        Self::from(self.inner.previous_day().expect("date underflow"))
    }

    /// Returns this [`Date`] shifted by the provided number of `days`.
    #[must_use]
    pub fn add_days(self, days: i64) -> Self {
        Self::from(self.inner + time::Duration::days(days))
    }

    /// Returns the number of whole days from this [`Date`] to the `other`
    /// one (negative if the `other` one is earlier).
    #[must_use]
    pub fn days_until<O: ?Sized>(&self, other: DateOf<O>) -> i64 {
        (other.inner - self.inner).whole_days()
    }

    /// Returns the first [`Date`] of this [`Date`]'s month.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn first_day_of_month(self) -> Self {
        Self::from(self.inner.replace_day(1).expect("day 1 always exists"))
    }

    /// Returns the last [`Date`] of this [`Date`]'s month.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn last_day_of_month(self) -> Self {
        let last = time::util::days_in_year_month(
            self.inner.year(),
            self.inner.month(),
        );
        Self::from(self.inner.replace_day(last).expect("last day exists"))
    }

    /// Coerces one kind of [`Date`] into another.
    #[must_use]
    pub fn coerce<NewOf: ?Sized>(self) -> DateOf<NewOf> {
        DateOf {
            inner: self.inner,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> Copy for DateOf<Of> {}
impl<Of: ?Sized> Clone for DateOf<Of> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Of: ?Sized> Eq for DateOf<Of> {}
impl<Of: ?Sized> PartialEq for DateOf<Of> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<Of: ?Sized> hash::Hash for DateOf<Of> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl<Of: ?Sized> Ord for DateOf<Of> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<Of: ?Sized> PartialOrd for DateOf<Of> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Of: ?Sized> From<time::Date> for DateOf<Of> {
    fn from(inner: time::Date) -> Self {
        Self {
            inner,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> From<DateOf<Of>> for time::Date {
    fn from(date: DateOf<Of>) -> Self {
        date.inner
    }
}

impl<Of: ?Sized> fmt::Display for DateOf<Of> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.inner.format(FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl<Of: ?Sized> FromStr for DateOf<Of> {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time::Date::parse(s, FORMAT).map(Self::from)
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> FromSql<'_> for DateOf<Of> {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Self::from)
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> ToSql for DateOf<Of> {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.inner.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

    use super::DateOf;

    impl<Of: ?Sized> Serialize for DateOf<Of> {
        fn serialize<S: serde::Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de, Of: ?Sized> Deserialize<'de> for DateOf<Of> {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Self::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use super::Date;

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_formats() {
        let d = date("2024-02-09");
        assert_eq!((d.year(), d.month(), d.day()), (2024, 2, 9));
        assert_eq!(d.to_string(), "2024-02-09");
        assert!("2024-02-30".parse::<Date>().is_err());
        assert!("09/02/2024".parse::<Date>().is_err());
    }

    #[test]
    fn month_bounds() {
        assert_eq!(date("2024-02-09").last_day_of_month(), date("2024-02-29"));
        assert_eq!(date("2025-02-09").last_day_of_month(), date("2025-02-28"));
        assert_eq!(date("2025-12-31").first_day_of_month(), date("2025-12-01"));
    }

    #[test]
    fn day_arithmetic() {
        assert_eq!(date("2024-12-31").next_day(), date("2025-01-01"));
        assert_eq!(date("2025-03-01").previous_day(), date("2025-02-28"));
        assert_eq!(date("2025-01-30").add_days(3), date("2025-02-02"));
        assert_eq!(date("2025-01-01").days_until(date("2025-01-31")), 30);
        assert_eq!(date("2025-01-31").days_until(date("2025-01-01")), -30);
    }
}
