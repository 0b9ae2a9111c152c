//! [`Command`] for creating a new [`Tariff`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Date, DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{tariff, Tariff},
    infra::{
        database::{self, constraint},
        Database,
    },
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Tariff`] period.
///
/// The previous period is closed the day before the new one starts, and the
/// new one lasts until the next period starts, if any.
#[derive(Clone, Copy, Debug)]
pub struct CreateTariff {
    /// First day the new [`Tariff`] is in effect.
    pub effective_from: tariff::EffectiveFrom,

    /// Price of a kilowatt-hour of electricity.
    pub electricity_price: Money,

    /// Price of a cubic meter of water.
    pub water_price: Money,

    /// Indicator whether the new [`Tariff`] may start in the past.
    pub backfill: bool,
}

impl<Db, Ntf> Command<CreateTariff> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<tariff::Timeline, ()>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<tariff::Timeline, ()>>,
            Ok = tariff::Timeline,
            Err = Traced<database::Error>,
        > + Database<Update<Tariff>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Tariff;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateTariff,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateTariff {
            effective_from,
            electricity_price,
            water_price,
            backfill,
        } = cmd;

        for price in [electricity_price, water_price] {
            if price.is_negative() {
                return Err(tracerr::new!(E::NegativePrice(price)));
            }
        }
        if !backfill && effective_from.coerce::<()>() < Date::today() {
            return Err(tracerr::new!(E::InPast(effective_from)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<tariff::Timeline, _>::new(())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let previous = tx
            .execute(Select(By::<tariff::Timeline, _>::new(())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let mut timeline = previous.clone();
        let mut tariff = Tariff {
            id: tariff::Id::new(),
            effective_from,
            effective_to: None,
            electricity_price,
            water_price,
            created_at: DateTime::now().coerce(),
        };
        timeline
            .insert(tariff.clone())
            .map_err(tracerr::from_and_wrap!(=> E))?;
        tariff.effective_to =
            timeline.get(tariff.id).and_then(|t| t.effective_to);

        for changed in timeline.changed_since(&previous) {
            let updated = tx.execute(Update(changed.clone())).await;
            if let Err(e) = &updated {
                if e.as_ref().is_unique_violation(Some(
                    constraint::TARIFF_EFFECTIVE_FROM,
                )) {
                    return Err(tracerr::new!(E::Duplicate(
                        tariff::DuplicateError(effective_from)
                    )));
                }
            }
            updated
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(tariff)
    }
}

/// Error of [`CreateTariff`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Tariff`] with the same start exists already.
    #[display("{_0}")]
    #[from]
    Duplicate(tariff::DuplicateError),

    /// New [`Tariff`] starts in the past without a backfill.
    #[display("`Tariff` cannot start in the past ({_0})")]
    InPast(#[error(not(source))] tariff::EffectiveFrom),

    /// Price is negative.
    #[display("Price cannot be negative, but is {_0}")]
    NegativePrice(#[error(not(source))] Money),
}

#[cfg(test)]
pub(crate) mod spec {
    use common::{
        operations::{By, Select},
        Date, Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::Command as _,
        domain::tariff,
        infra::{Database as _, Memory},
        Service,
    };

    use super::{CreateTariff, ExecutionError};

    pub(crate) fn create(from: Date, backfill: bool) -> CreateTariff {
        CreateTariff {
            effective_from: from.coerce(),
            electricity_price: Money::vnd(Decimal::from(3500)),
            water_price: Money::vnd(Decimal::from(15000)),
            backfill,
        }
    }

    #[tokio::test]
    async fn keeps_timeline_contiguous() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let today = Date::today();

        for days in [30, 0, 10] {
            _ = svc
                .execute(create(today.add_days(days), false))
                .await
                .unwrap();
        }

        let timeline = db
            .execute(Select(By::<tariff::Timeline, _>::new(())))
            .await
            .unwrap();
        let tariffs = timeline.tariffs();
        assert_eq!(tariffs.len(), 3);
        for pair in tariffs.windows(2) {
            assert_eq!(
                pair[0].effective_to.map(|d| d.coerce::<()>()),
                Some(pair[1].effective_from.coerce::<()>().previous_day()),
            );
        }
        assert_eq!(tariffs[2].effective_to, None);
    }

    #[tokio::test]
    async fn refuses_past_start_without_backfill() {
        let svc = Service::spec(Memory::new());
        let yesterday = Date::today().previous_day();

        let err = svc.execute(create(yesterday, false)).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InPast(_)));

        assert!(svc.execute(create(yesterday, true)).await.is_ok());
    }

    #[tokio::test]
    async fn refuses_duplicate_start() {
        let svc = Service::spec(Memory::new());
        let today = Date::today();
        _ = svc.execute(create(today, false)).await.unwrap();

        let err = svc.execute(create(today, false)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Duplicate(_)));
    }

    #[tokio::test]
    async fn refuses_negative_price() {
        let svc = Service::spec(Memory::new());
        let mut cmd = create(Date::today(), false);
        cmd.water_price = Money::vnd(Decimal::from(-1));

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NegativePrice(_)));
    }
}
