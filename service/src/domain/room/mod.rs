//! [`Room`] definitions.

pub mod bed;
pub mod fee;

use std::str::FromStr;

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, Error, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::student::Gender;

pub use self::bed::Bed;

/// Dormitory room.
#[derive(Clone, Debug)]
pub struct Room {
    /// ID of this [`Room`].
    pub id: Id,

    /// Unique [`Number`] of this [`Room`].
    pub number: Number,

    /// [`Capacity`] of this [`Room`].
    pub capacity: Capacity,

    /// Floor [`Area`] of this [`Room`].
    pub area: Area,

    /// Monthly base rent of this [`Room`].
    pub monthly_rent: Money,

    /// [`Gender`] this [`Room`] is designated for.
    pub gender: Gender,

    /// Number of occupied [`Bed`]s in this [`Room`].
    pub occupants: u8,

    /// [`DateTime`] when this [`Room`] was created.
    pub created_at: CreationDateTime,
}

impl Room {
    /// Indicates whether this [`Room`] has a vacant place.
    #[must_use]
    pub fn has_vacancy(&self) -> bool {
        self.occupants < self.capacity.get()
    }

    /// Changes the [`Capacity`] of this [`Room`] having the provided number
    /// of `beds`.
    ///
    /// # Errors
    ///
    /// If the new [`Capacity`] is less than the current number of `beds` or
    /// occupants.
    pub fn change_capacity(
        &mut self,
        capacity: Capacity,
        beds: usize,
    ) -> Result<(), CapacityError> {
        let new = capacity.get();
        if usize::from(new) < beds {
            return Err(CapacityError::LessThanBeds { capacity: new, beds });
        }
        if new < self.occupants {
            return Err(CapacityError::LessThanOccupants {
                capacity: new,
                occupants: self.occupants,
            });
        }
        self.capacity = capacity;
        Ok(())
    }
}

/// Error of changing a [`Room`] [`Capacity`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum CapacityError {
    /// New [`Capacity`] is less than the number of existing [`Bed`]s.
    #[display("capacity {capacity} is less than {beds} existing beds")]
    LessThanBeds {
        /// Requested capacity.
        capacity: u8,

        /// Number of existing [`Bed`]s.
        beds: usize,
    },

    /// New [`Capacity`] is less than the number of current occupants.
    #[display("capacity {capacity} is less than {occupants} occupants")]
    LessThanOccupants {
        /// Requested capacity.
        capacity: u8,

        /// Number of current occupants.
        occupants: u8,
    },
}

/// ID of a [`Room`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    derive_more::FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
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

/// Number of a [`Room`], unique across the dormitory.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Number(String);

impl Number {
    /// Creates a new [`Number`] if the given `number` is valid.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        Self::check(&number).then_some(Self(number))
    }

    /// Checks whether the given `number` is a valid [`Number`].
    fn check(number: impl AsRef<str>) -> bool {
        let number = number.as_ref();
        number.trim() == number && !number.is_empty() && number.len() <= 20
    }
}

impl FromStr for Number {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `room::Number`")
    }
}

/// Maximum number of occupants of a [`Room`], in `1..=10` range.
#[derive(Clone, Copy, Debug, Display, Eq, Into, PartialEq)]
pub struct Capacity(u8);

impl Capacity {
    /// Creates a new [`Capacity`] if the given `capacity` is in `1..=10`
    /// range.
    #[must_use]
    pub fn new(capacity: u8) -> Option<Self> {
        (1..=10).contains(&capacity).then_some(Self(capacity))
    }

    /// Returns the inner value of this [`Capacity`].
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl FromStr for Capacity {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse()
            .ok()
            .and_then(Self::new)
            .ok_or("invalid `room::Capacity`")
    }
}

/// Floor area of a [`Room`] in square meters, in `10..=100` range.
#[derive(Clone, Copy, Debug, Display, Eq, Into, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Area(Decimal);

impl Area {
    /// Creates a new [`Area`] if the given `area` is in `10..=100` range.
    #[must_use]
    pub fn new(area: Decimal) -> Option<Self> {
        (Decimal::TEN..=Decimal::ONE_HUNDRED)
            .contains(&area)
            .then_some(Self(area))
    }
}

/// [`DateTime`] when a [`Room`] was created.
pub type CreationDateTime = DateTimeOf<(Room, unit::Creation)>;

#[cfg(test)]
pub(crate) mod spec {
    use common::{DateTime, Money};
    use rust_decimal::Decimal;

    use crate::domain::student::Gender;

    use super::{Area, Capacity, CapacityError, Id, Number, Room};

    pub(crate) fn room(capacity: u8, gender: Gender) -> Room {
        Room {
            id: Id::new(),
            number: Number::new("A101").unwrap(),
            capacity: Capacity::new(capacity).unwrap(),
            area: Area::new(Decimal::from(24)).unwrap(),
            monthly_rent: Money::vnd(Decimal::from(1_000_000)),
            gender,
            occupants: 0,
            created_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn validates_ranges() {
        assert!(Capacity::new(0).is_none());
        assert!(Capacity::new(1).is_some());
        assert!(Capacity::new(10).is_some());
        assert!(Capacity::new(11).is_none());

        assert!(Area::new(Decimal::from(9)).is_none());
        assert!(Area::new(Decimal::from(10)).is_some());
        assert!(Area::new(Decimal::from(100)).is_some());
        assert!(Area::new(Decimal::from(101)).is_none());
    }

    #[test]
    fn capacity_cannot_drop_below_beds_or_occupants() {
        let mut room = room(4, Gender::Male);
        room.occupants = 2;

        assert!(matches!(
            room.change_capacity(Capacity::new(3).unwrap(), 4),
            Err(CapacityError::LessThanBeds { capacity: 3, beds: 4 }),
        ));
        assert!(matches!(
            room.change_capacity(Capacity::new(1).unwrap(), 1),
            Err(CapacityError::LessThanOccupants {
                capacity: 1,
                occupants: 2,
            }),
        ));
        assert!(room.change_capacity(Capacity::new(2).unwrap(), 2).is_ok());
        assert_eq!(room.capacity.get(), 2);
        assert!(!room.has_vacancy());
    }
}
