//! [`Command`] for updating a [`Tariff`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Date, Money,
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

/// [`Command`] for updating a [`Tariff`] that is either not in effect yet,
/// or is the current open-ended one.
///
/// [`None`] fields are left unchanged.
#[derive(Clone, Copy, Debug)]
pub struct UpdateTariff {
    /// ID of the [`Tariff`] to be updated.
    pub tariff_id: tariff::Id,

    /// New first day the [`Tariff`] is in effect.
    pub effective_from: Option<tariff::EffectiveFrom>,

    /// New price of a kilowatt-hour of electricity.
    pub electricity_price: Option<Money>,

    /// New price of a cubic meter of water.
    pub water_price: Option<Money>,
}

impl<Db, Ntf> Command<UpdateTariff> for Service<Db, Ntf>
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
        cmd: UpdateTariff,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateTariff {
            tariff_id,
            effective_from,
            electricity_price,
            water_price,
        } = cmd;
        let today = Date::today();

        for price in [electricity_price, water_price].into_iter().flatten() {
            if price.is_negative() {
                return Err(tracerr::new!(E::NegativePrice(price)));
            }
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
        previous
            .can_edit(tariff_id, today)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let mut tariff = previous
            .get(tariff_id)
            .cloned()
            .ok_or(E::Edit(tariff::EditError::NotExists(tariff_id)))
            .map_err(tracerr::wrap!())?;

        if let Some(from) = effective_from {
            if from != tariff.effective_from && from.coerce::<()>() < today {
                return Err(tracerr::new!(E::InPast(from)));
            }
            tariff.effective_from = from;
        }
        if let Some(price) = electricity_price {
            tariff.electricity_price = price;
        }
        if let Some(price) = water_price {
            tariff.water_price = price;
        }

        let mut timeline = previous.clone();
        timeline
            .replace(tariff.clone())
            .map_err(tracerr::from_and_wrap!(=> E))?;
        tariff.effective_to =
            timeline.get(tariff_id).and_then(|t| t.effective_to);

        for changed in timeline.changed_since(&previous) {
            let updated = tx.execute(Update(changed.clone())).await;
            if let Err(e) = &updated {
                if e.as_ref().is_unique_violation(Some(
                    constraint::TARIFF_EFFECTIVE_FROM,
                )) {
                    return Err(tracerr::new!(E::Duplicate(
                        tariff::DuplicateError(tariff.effective_from)
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

/// Error of [`UpdateTariff`] [`Command`] execution.
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

    /// [`Tariff`] cannot be edited.
    #[display("{_0}")]
    #[from]
    Edit(tariff::EditError),

    /// [`Tariff`] cannot be moved into the past.
    #[display("`Tariff` cannot start in the past ({_0})")]
    InPast(#[error(not(source))] tariff::EffectiveFrom),

    /// Price is negative.
    #[display("Price cannot be negative, but is {_0}")]
    NegativePrice(#[error(not(source))] Money),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select},
        Date, Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::{create_tariff, Command as _},
        domain::tariff,
        infra::{Database as _, Memory},
        Service,
    };

    use super::{ExecutionError, UpdateTariff};

    fn update(tariff_id: tariff::Id) -> UpdateTariff {
        UpdateTariff {
            tariff_id,
            effective_from: None,
            electricity_price: None,
            water_price: None,
        }
    }

    #[tokio::test]
    async fn edits_current_and_future_only() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let today = Date::today();
        let past = svc
            .execute(create_tariff::spec::create(today.add_days(-60), true))
            .await
            .unwrap();
        let current = svc
            .execute(create_tariff::spec::create(today.add_days(-10), true))
            .await
            .unwrap();

        let err = svc
            .execute(UpdateTariff {
                electricity_price: Some(Money::vnd(Decimal::from(4000))),
                ..update(past.id)
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Edit(_)));

        let edited = svc
            .execute(UpdateTariff {
                electricity_price: Some(Money::vnd(Decimal::from(4000))),
                ..update(current.id)
            })
            .await
            .unwrap();
        assert_eq!(
            edited.electricity_price,
            Money::vnd(Decimal::from(4000)),
        );
    }

    #[tokio::test]
    async fn moving_start_rederives_periods() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let today = Date::today();
        let first = svc
            .execute(create_tariff::spec::create(today.add_days(10), false))
            .await
            .unwrap();
        let second = svc
            .execute(create_tariff::spec::create(today.add_days(20), false))
            .await
            .unwrap();

        _ = svc
            .execute(UpdateTariff {
                effective_from: Some(today.add_days(30).coerce()),
                ..update(first.id)
            })
            .await
            .unwrap();

        let timeline = db
            .execute(Select(By::<tariff::Timeline, _>::new(())))
            .await
            .unwrap();
        let tariffs = timeline.tariffs();
        assert_eq!(tariffs[0].id, second.id);
        assert_eq!(
            tariffs[0].effective_to,
            Some(today.add_days(29).coerce()),
        );
        assert_eq!(tariffs[1].id, first.id);
        assert_eq!(tariffs[1].effective_to, None);
    }
}
