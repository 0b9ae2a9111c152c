//! Meter [`Reading`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Month};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Room;
use crate::domain::room;

/// Monthly electricity and water meter reading of a [`Room`].
#[derive(Clone, Debug)]
pub struct Reading {
    /// ID of this [`Reading`].
    pub id: Id,

    /// ID of the [`Room`] the meters belong to.
    pub room_id: room::Id,

    /// [`Month`] of this [`Reading`], unique per [`Room`].
    pub month: Month,

    /// Electricity meter [`Counter`] (kWh).
    pub electricity: Counter,

    /// Water meter [`Counter`] (m³).
    pub water: Counter,

    /// [`DateTime`] when this [`Reading`] was recorded.
    pub created_at: CreationDateTime,
}

/// Previous and current values of a meter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Counter {
    /// Value at the end of the previous [`Month`].
    pub previous: u32,

    /// Value at the end of the [`Month`].
    pub current: u32,
}

impl Counter {
    /// Creates a new [`Counter`] out of the provided values.
    ///
    /// # Errors
    ///
    /// If the `current` value is below the `previous` one.
    pub fn new(previous: u32, current: u32) -> Result<Self, CounterError> {
        if current < previous {
            return Err(CounterError { previous, current });
        }
        Ok(Self { previous, current })
    }

    /// Returns the consumption measured by this [`Counter`].
    #[must_use]
    pub fn consumption(&self) -> Decimal {
        Decimal::from(self.current.saturating_sub(self.previous))
    }
}

/// Error of creating a [`Counter`] going backwards.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("current value {current} is below previous value {previous}")]
pub struct CounterError {
    /// Previous value.
    pub previous: u32,

    /// Current value.
    pub current: u32,
}

/// ID of a [`Reading`].
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

/// [`DateTime`] when a [`Reading`] was recorded.
pub type CreationDateTime = DateTimeOf<(Reading, unit::Creation)>;

#[cfg(test)]
mod spec {
    use rust_decimal::Decimal;

    use super::Counter;

    #[test]
    fn measures_consumption() {
        assert_eq!(
            Counter::new(1200, 1350).unwrap().consumption(),
            Decimal::from(150),
        );
        assert_eq!(Counter::new(0, 0).unwrap().consumption(), Decimal::ZERO);
        assert!(Counter::new(1350, 1200).is_err());
    }
}
