//! [`Month`] definitions.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};

use crate::date::DateOf;

/// Calendar month of a year, labeled as `MM/YYYY`.
///
/// Serves as the billing key of meter readings and payments.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Month {
    /// Year of this [`Month`].
    year: i32,

    /// Number of this [`Month`] in `1..=12` range.
    month: u8,
}

impl Month {
    /// Creates a new [`Month`] if the provided `month` is in `1..=12` range.
    #[must_use]
    pub fn new(year: i32, month: u8) -> Option<Self> {
        (1..=12)
            .contains(&month)
            .then_some(Self { year, month })
            .filter(|m| DateOf::<()>::from_ymd(m.year, m.month, 1).is_some())
    }

    /// Returns the [`Month`] the provided date belongs to.
    #[must_use]
    pub fn of<Of: ?Sized>(date: DateOf<Of>) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Returns the year of this [`Month`].
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Returns the number of this [`Month`] in `1..=12` range.
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Returns the [`Month`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Returns the [`Month`] preceding this one.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Returns the first day of this [`Month`].
    #[expect(clippy::missing_panics_doc, reason = "checked on creation")]
    #[must_use]
    pub fn first_day<Of: ?Sized>(&self) -> DateOf<Of> {
        DateOf::from_ymd(self.year, self.month, 1)
            .expect("`Month` is always a valid date")
    }

    /// Returns the last day of this [`Month`].
    #[must_use]
    pub fn last_day<Of: ?Sized>(&self) -> DateOf<Of> {
        self.first_day::<Of>().last_day_of_month()
    }

    /// Indicates whether the provided date belongs to this [`Month`].
    #[must_use]
    pub fn contains<Of: ?Sized>(&self, date: DateOf<Of>) -> bool {
        Self::of(date) == *self
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl FromStr for Month {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, year) = s.split_once('/').ok_or("missing `/` separator")?;
        if month.len() != 2 || year.len() != 4 {
            return Err("expected `MM/YYYY` format");
        }
        let month = month.parse().map_err(|_| "invalid month")?;
        let year = year.parse().map_err(|_| "invalid year")?;
        Self::new(year, month).ok_or("month out of range")
    }
}

#[cfg(feature = "postgres")]
impl<'a> FromSql<'a> for Month {
    accepts!(VARCHAR, TEXT, BPCHAR);

    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        <&str>::from_sql(ty, raw)?.parse().map_err(Into::into)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Month {
    accepts!(VARCHAR, TEXT, BPCHAR);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.to_string().to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

    use super::Month;

    impl Serialize for Month {
        fn serialize<S: serde::Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Month {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            String::deserialize(deserializer)?
                .parse()
                .map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::Date;

    use super::Month;

    #[test]
    fn labels() {
        let m = Month::new(2025, 3).unwrap();
        assert_eq!(m.to_string(), "03/2025");
        assert_eq!("03/2025".parse::<Month>(), Ok(m));
        assert!("3/2025".parse::<Month>().is_err());
        assert!("13/2025".parse::<Month>().is_err());
        assert!("2025-03".parse::<Month>().is_err());
    }

    #[test]
    fn wraps_years() {
        let dec = Month::new(2024, 12).unwrap();
        assert_eq!(dec.next(), Month::new(2025, 1).unwrap());
        assert_eq!(dec.next().previous(), dec);
        assert!(dec < dec.next());
    }

    #[test]
    fn bounds() {
        let feb = Month::new(2024, 2).unwrap();
        let first: Date = feb.first_day();
        let last: Date = feb.last_day();
        assert_eq!(first.to_string(), "2024-02-01");
        assert_eq!(last.to_string(), "2024-02-29");
        assert!(feb.contains(last));
        assert!(!feb.contains(last.next_day()));
        assert_eq!(Month::of(last), feb);
    }
}
