//! [`Tariff`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, Date, DateOf, DateTimeOf, Money, Month};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Period of utility unit prices.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tariff {
    /// ID of this [`Tariff`].
    pub id: Id,

    /// First day this [`Tariff`] is in effect.
    pub effective_from: EffectiveFrom,

    /// Last day this [`Tariff`] is in effect, if it's not the current one.
    pub effective_to: Option<EffectiveTo>,

    /// Price of a single kWh of electricity.
    pub electricity_price: Money,

    /// Price of a single m³ of water.
    pub water_price: Money,

    /// [`DateTime`] when this [`Tariff`] was created.
    pub created_at: CreationDateTime,
}

impl Tariff {
    /// Indicates whether this [`Tariff`] is in effect on the provided `date`.
    #[must_use]
    pub fn is_effective_on(&self, date: Date) -> bool {
        self.effective_from.coerce::<()>() <= date
            && self.effective_to.map_or(true, |to| date <= to.coerce::<()>())
    }

    /// Indicates whether this [`Tariff`] period intersects the provided
    /// [`Month`].
    #[must_use]
    pub fn overlaps(&self, month: Month) -> bool {
        let (first, last): (Date, Date) = (month.first_day(), month.last_day());
        self.effective_from.coerce::<()>() <= last
            && self.effective_to.map_or(true, |to| first <= to.coerce::<()>())
    }
}

/// Chronologically sorted, contiguous and non-overlapping [`Tariff`]s, with
/// the last one being the only open-ended (current) one.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Timeline(Vec<Tariff>);

impl Timeline {
    /// Returns the [`Tariff`]s of this [`Timeline`] in chronological order.
    #[must_use]
    pub fn tariffs(&self) -> &[Tariff] {
        &self.0
    }

    /// Returns the [`Tariff`] with the provided [`Id`], if any.
    #[must_use]
    pub fn get(&self, id: Id) -> Option<&Tariff> {
        self.0.iter().find(|t| t.id == id)
    }

    /// Returns the current (open-ended) [`Tariff`], if any.
    #[must_use]
    pub fn current(&self) -> Option<&Tariff> {
        self.0.last()
    }

    /// Returns the [`Tariff`] to bill the provided [`Month`] with.
    ///
    /// It's the [`Tariff`] in effect on the first day of the [`Month`], or
    /// the earliest [`Tariff`] starting within the [`Month`] otherwise.
    #[must_use]
    pub fn lookup(&self, month: Month) -> Option<&Tariff> {
        let first = month.first_day();
        self.0.iter().find(|t| t.is_effective_on(first)).or_else(|| {
            self.0
                .iter()
                .find(|t| month.contains(t.effective_from.coerce::<()>()))
        })
    }

    /// Inserts the provided [`Tariff`] into this [`Timeline`], re-deriving
    /// the ends of all the periods.
    ///
    /// # Errors
    ///
    /// If a [`Tariff`] with the same [`EffectiveFrom`] date already exists.
    pub fn insert(&mut self, tariff: Tariff) -> Result<(), DuplicateError> {
        if self
            .0
            .iter()
            .any(|t| t.effective_from == tariff.effective_from)
        {
            return Err(DuplicateError(tariff.effective_from));
        }
        self.0.push(tariff);
        self.rederive();
        Ok(())
    }

    /// Replaces the [`Tariff`] having the same [`Id`] with the provided one,
    /// re-deriving the ends of all the periods.
    ///
    /// # Errors
    ///
    /// If another [`Tariff`] with the same [`EffectiveFrom`] date exists.
    pub fn replace(&mut self, tariff: Tariff) -> Result<(), DuplicateError> {
        if self.0.iter().any(|t| {
            t.id != tariff.id && t.effective_from == tariff.effective_from
        }) {
            return Err(DuplicateError(tariff.effective_from));
        }
        if let Some(existing) = self.0.iter_mut().find(|t| t.id == tariff.id) {
            *existing = tariff;
        }
        self.rederive();
        Ok(())
    }

    /// Removes the [`Tariff`] with the provided [`Id`], re-deriving the ends
    /// of the remaining periods.
    pub fn remove(&mut self, id: Id) -> Option<Tariff> {
        let idx = self.0.iter().position(|t| t.id == id)?;
        let removed = self.0.remove(idx);
        self.rederive();
        Some(removed)
    }

    /// Checks whether the [`Tariff`] with the provided [`Id`] may be edited
    /// on the given `today` date.
    ///
    /// Only [`Tariff`]s not yet in effect, or the current one, are editable.
    ///
    /// # Errors
    ///
    /// With the reason why the [`Tariff`] cannot be edited.
    pub fn can_edit(&self, id: Id, today: Date) -> Result<(), EditError> {
        let tariff = self.get(id).ok_or(EditError::NotExists(id))?;
        let is_future = tariff.effective_from.coerce::<()>() > today;
        let is_current = tariff.effective_to.is_none()
            && self.current().map(|t| t.id) == Some(id);
        if is_future || is_current {
            Ok(())
        } else {
            Err(EditError::AlreadyApplied(id))
        }
    }

    /// Checks whether the [`Tariff`] with the provided [`Id`] may be deleted,
    /// given whether any meter readings fall into its period.
    ///
    /// # Errors
    ///
    /// With the reason why the [`Tariff`] cannot be deleted.
    pub fn can_delete(
        &self,
        id: Id,
        has_readings: bool,
    ) -> Result<(), DeleteError> {
        let tariff = self.get(id).ok_or(DeleteError::NotExists(id))?;
        if tariff.effective_to.is_none() {
            return Err(DeleteError::Current(id));
        }
        if has_readings {
            return Err(DeleteError::HasReadings(id));
        }
        Ok(())
    }

    /// Returns the [`Tariff`]s of this [`Timeline`] differing from the ones
    /// in the `previous` [`Timeline`] (including the new ones).
    pub fn changed_since<'a>(
        &'a self,
        previous: &'a Self,
    ) -> impl Iterator<Item = &'a Tariff> + 'a {
        self.0
            .iter()
            .filter(move |t| previous.get(t.id).map_or(true, |p| p != *t))
    }

    /// Sorts the periods and sets the end of each one to the day before the
    /// next one starts, leaving the last one open-ended.
    fn rederive(&mut self) {
        self.0.sort_by_key(|t| t.effective_from);
        let starts = self
            .0
            .iter()
            .skip(1)
            .map(|t| Some(t.effective_from))
            .chain([None])
            .collect::<Vec<_>>();
        for (tariff, next) in self.0.iter_mut().zip(starts) {
            tariff.effective_to =
                next.map(|from| from.coerce::<()>().previous_day().coerce());
        }
    }
}

impl From<Vec<Tariff>> for Timeline {
    fn from(tariffs: Vec<Tariff>) -> Self {
        let mut timeline = Self(tariffs);
        timeline.0.sort_by_key(|t| t.effective_from);
        timeline
    }
}

/// Error of inserting a [`Tariff`] with an already existing
/// [`EffectiveFrom`] date.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("`Tariff` effective from {_0} already exists")]
pub struct DuplicateError(#[error(not(source))] pub EffectiveFrom);

/// Error of editing a [`Tariff`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum EditError {
    /// [`Tariff`] doesn't exist.
    #[display("`Tariff(id: {_0})` does not exist")]
    NotExists(#[error(not(source))] Id),

    /// [`Tariff`] was already applied and is not the current one.
    #[display(
        "`Tariff(id: {_0})` is already in effect and is not the current one"
    )]
    AlreadyApplied(#[error(not(source))] Id),
}

/// Error of deleting a [`Tariff`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum DeleteError {
    /// [`Tariff`] doesn't exist.
    #[display("`Tariff(id: {_0})` does not exist")]
    NotExists(#[error(not(source))] Id),

    /// [`Tariff`] is the current one.
    #[display("`Tariff(id: {_0})` is the current one")]
    Current(#[error(not(source))] Id),

    /// Meter readings were billed within the [`Tariff`] period.
    #[display("`Tariff(id: {_0})` period has meter readings")]
    HasReadings(#[error(not(source))] Id),
}

/// ID of a [`Tariff`].
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

/// First day a [`Tariff`] is in effect.
pub type EffectiveFrom = DateOf<(Tariff, unit::Start)>;

/// Last day a [`Tariff`] is in effect.
pub type EffectiveTo = DateOf<(Tariff, unit::End)>;

/// [`DateTime`] when a [`Tariff`] was created.
pub type CreationDateTime = DateTimeOf<(Tariff, unit::Creation)>;

#[cfg(test)]
pub(crate) mod spec {
    use common::{Date, DateTime, Money};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::{DeleteError, EditError, Id, Tariff, Timeline};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    pub(crate) fn tariff(from: Date) -> Tariff {
        Tariff {
            id: Id::new(),
            effective_from: from.coerce(),
            effective_to: None,
            electricity_price: Money::vnd(Decimal::from(3500)),
            water_price: Money::vnd(Decimal::from(15000)),
            created_at: DateTime::now().coerce(),
        }
    }

    fn assert_contiguous(timeline: &Timeline) {
        let tariffs = timeline.tariffs();
        for pair in tariffs.windows(2) {
            assert!(pair[0].effective_from < pair[1].effective_from);
            assert_eq!(
                pair[0].effective_to.map(|d| d.coerce::<()>()),
                Some(pair[1].effective_from.coerce::<()>().previous_day()),
            );
        }
        assert_eq!(
            tariffs.iter().filter(|t| t.effective_to.is_none()).count(),
            usize::from(!tariffs.is_empty()),
        );
        if let Some(last) = tariffs.last() {
            assert!(last.effective_to.is_none());
        }
    }

    #[test]
    fn closes_previous_period() {
        let mut timeline = Timeline::default();
        timeline.insert(tariff(date("2025-01-01"))).unwrap();
        timeline.insert(tariff(date("2025-04-01"))).unwrap();

        let [first, second] = timeline.tariffs() else {
            panic!("expected two tariffs");
        };
        assert_eq!(first.effective_to, Some(date("2025-03-31").coerce()));
        assert_eq!(second.effective_to, None);
    }

    #[test]
    fn inserts_in_the_middle() {
        let mut timeline = Timeline::default();
        timeline.insert(tariff(date("2025-01-01"))).unwrap();
        timeline.insert(tariff(date("2025-07-01"))).unwrap();
        timeline.insert(tariff(date("2025-04-01"))).unwrap();

        assert_contiguous(&timeline);
        assert_eq!(
            timeline.tariffs()[1].effective_to,
            Some(date("2025-06-30").coerce()),
        );
    }

    #[test]
    fn rejects_duplicate_start() {
        let mut timeline = Timeline::default();
        timeline.insert(tariff(date("2025-01-01"))).unwrap();
        assert!(timeline.insert(tariff(date("2025-01-01"))).is_err());
        assert_eq!(timeline.tariffs().len(), 1);
    }

    #[test]
    fn looks_up_tariff_for_month() {
        let mut timeline = Timeline::default();
        timeline.insert(tariff(date("2025-01-10"))).unwrap();
        timeline.insert(tariff(date("2025-03-01"))).unwrap();
        let [first, second] = timeline.tariffs() else {
            panic!("expected two tariffs");
        };

        assert_eq!(timeline.lookup("01/2025".parse().unwrap()), Some(first));
        assert_eq!(timeline.lookup("02/2025".parse().unwrap()), Some(first));
        assert_eq!(timeline.lookup("03/2025".parse().unwrap()), Some(second));
        assert_eq!(timeline.lookup("12/2024".parse().unwrap()), None);
    }

    #[test]
    fn guards_edits() {
        let today = date("2025-05-01");
        let mut timeline = Timeline::default();
        let past = tariff(date("2025-01-01"));
        let current = tariff(date("2025-04-01"));
        let future = tariff(date("2025-06-01"));
        let (past_id, current_id, future_id) = (past.id, current.id, future.id);
        timeline.insert(past).unwrap();
        timeline.insert(current).unwrap();

        assert!(matches!(
            timeline.can_edit(past_id, today),
            Err(EditError::AlreadyApplied(_)),
        ));
        assert!(timeline.can_edit(current_id, today).is_ok());

        timeline.insert(future).unwrap();
        assert!(timeline.can_edit(future_id, today).is_ok());
        assert!(matches!(
            timeline.can_edit(current_id, today),
            Err(EditError::AlreadyApplied(_)),
        ));
    }

    #[test]
    fn guards_deletions() {
        let mut timeline = Timeline::default();
        let first = tariff(date("2025-01-01"));
        let second = tariff(date("2025-04-01"));
        let (first_id, second_id) = (first.id, second.id);
        timeline.insert(first).unwrap();
        timeline.insert(second).unwrap();

        assert!(matches!(
            timeline.can_delete(second_id, false),
            Err(DeleteError::Current(_)),
        ));
        assert!(matches!(
            timeline.can_delete(first_id, true),
            Err(DeleteError::HasReadings(_)),
        ));
        assert!(timeline.can_delete(first_id, false).is_ok());

        drop(timeline.remove(first_id));
        assert_contiguous(&timeline);
    }

    #[test]
    fn reports_changed_tariffs() {
        let mut timeline = Timeline::default();
        timeline.insert(tariff(date("2025-01-01"))).unwrap();
        timeline.insert(tariff(date("2025-02-01"))).unwrap();
        let before = timeline.clone();

        let new = tariff(date("2025-03-01"));
        let new_id = new.id;
        timeline.insert(new).unwrap();

        let changed = timeline
            .changed_since(&before)
            .map(|t| t.id)
            .collect::<Vec<_>>();
        assert_eq!(changed, [before.tariffs()[1].id, new_id]);
    }

    proptest! {
        #[test]
        fn stays_contiguous(
            offsets in prop::collection::hash_set(0..2000_i64, 1..30),
        ) {
            let base = date("2024-01-01");
            let mut timeline = Timeline::default();
            for offset in offsets {
                timeline.insert(tariff(base.add_days(offset))).unwrap();
            }

            let tariffs = timeline.tariffs();
            for pair in tariffs.windows(2) {
                prop_assert!(pair[0].effective_from < pair[1].effective_from);
                prop_assert_eq!(
                    pair[0].effective_to.map(|d| d.coerce::<()>()),
                    Some(pair[1].effective_from.coerce::<()>().previous_day()),
                );
            }
            prop_assert_eq!(
                tariffs.iter().filter(|t| t.effective_to.is_none()).count(),
                1,
            );
            prop_assert!(tariffs.last().unwrap().effective_to.is_none());
        }
    }
}
