//! Utility costs allocation between [`Room`] occupants.

use std::collections::BTreeMap;

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money, Month};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Room, Student};
use crate::domain::{meter, room, student, Stay, Tariff};

/// Share of a [`meter::Reading`] costs owed by a single [`Student`].
#[derive(Clone, Debug)]
pub struct Share {
    /// ID of this [`Share`].
    pub id: Id,

    /// ID of the [`meter::Reading`] this [`Share`] is calculated from.
    pub reading_id: meter::Id,

    /// ID of the [`Student`] owing this [`Share`].
    pub student_id: student::Id,

    /// ID of the [`Room`] the [`meter::Reading`] belongs to.
    pub room_id: room::Id,

    /// [`Month`] of the [`meter::Reading`].
    pub month: Month,

    /// Number of days the [`Student`] stayed in the [`Room`] in the
    /// [`Month`].
    pub days: u32,

    /// Share of the electricity cost.
    pub electricity_cost: Money,

    /// Share of the water cost.
    pub water_cost: Money,

    /// Total owed amount.
    pub total: Money,

    /// [`DateTime`] when this [`Share`] was created.
    pub created_at: CreationDateTime,
}

/// Costs of a [`meter::Reading`] split between occupants.
#[derive(Clone, Debug)]
pub struct Allocation {
    /// Electricity cost of the whole [`Room`].
    pub electricity_cost: Money,

    /// Water cost of the whole [`Room`].
    pub water_cost: Money,

    /// Total cost of the whole [`Room`].
    pub total: Money,

    /// Per-[`Student`] [`Share`]s, ordered by [`student::Id`].
    pub shares: Vec<Share>,
}

/// Allocates the costs of the provided [`meter::Reading`] between the
/// [`Student`]s proportionally to the days they stayed in the [`Room`] within
/// the [`meter::Reading`]'s [`Month`].
///
/// Days of multiple [`Stay`]s of the same [`Student`] are summed. Students
/// with no days in the [`Month`] are excluded. Each [`Share`] is rounded to
/// the whole currency unit.
///
/// [`None`] is returned if nobody stayed in the [`Room`] in that [`Month`].
#[must_use]
pub fn allocate(
    reading: &meter::Reading,
    tariff: &Tariff,
    stays: &[Stay],
) -> Option<Allocation> {
    let mut days = BTreeMap::<student::Id, u32>::new();
    for stay in stays.iter().filter(|s| s.room_id == reading.room_id) {
        let d = stay.days_within(reading.month);
        if d > 0 {
            *days.entry(stay.student_id).or_default() += d;
        }
    }
    let sum = Decimal::from(days.values().sum::<u32>());
    if sum.is_zero() {
        return None;
    }

    let electricity_cost =
        tariff.electricity_price * reading.electricity.consumption();
    let water_cost = tariff.water_price * reading.water.consumption();
    let total = Money {
        amount: electricity_cost.amount + water_cost.amount,
        currency: electricity_cost.currency,
    };

    let created_at = CreationDateTime::now();
    let shares = days
        .into_iter()
        .map(|(student_id, d)| {
            let ratio = Decimal::from(d) / sum;
            Share {
                id: Id::new(),
                reading_id: reading.id,
                student_id,
                room_id: reading.room_id,
                month: reading.month,
                days: d,
                electricity_cost: (electricity_cost * ratio).round(),
                water_cost: (water_cost * ratio).round(),
                total: (total * ratio).round(),
                created_at,
            }
        })
        .collect();

    Some(Allocation {
        electricity_cost,
        water_cost,
        total,
        shares,
    })
}

/// ID of a [`Share`].
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

/// [`DateTime`] when a [`Share`] was created.
pub type CreationDateTime = DateTimeOf<(Share, unit::Creation)>;
