//! [`Command`] for deleting a [`Tariff`].

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{tariff, Tariff},
    infra::{database, Database},
    read::meter::HasReadings,
    Service,
};

use super::Command;

/// [`Command`] for deleting a past or future [`Tariff`] which period has no
/// meter readings.
///
/// The neighbouring periods are re-derived to stay contiguous.
#[derive(Clone, Copy, Debug)]
pub struct DeleteTariff {
    /// ID of the [`Tariff`] to be deleted.
    pub tariff_id: tariff::Id,
}

impl<Db, Ntf> Command<DeleteTariff> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<tariff::Timeline, ()>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<tariff::Timeline, ()>>,
            Ok = tariff::Timeline,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<
                    HasReadings,
                    (tariff::EffectiveFrom, Option<tariff::EffectiveTo>),
                >,
            >,
            Ok = HasReadings,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Tariff, tariff::Id>>,
            Err = Traced<database::Error>,
        > + Database<Update<Tariff>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Tariff;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DeleteTariff,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeleteTariff { tariff_id } = cmd;

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
        let period = previous
            .get(tariff_id)
            .map(|t| (t.effective_from, t.effective_to))
            .ok_or(E::Delete(tariff::DeleteError::NotExists(tariff_id)))
            .map_err(tracerr::wrap!())?;
        let HasReadings(has_readings) = tx
            .execute(Select(By::<HasReadings, _>::new(period)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        previous
            .can_delete(tariff_id, has_readings)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let mut timeline = previous.clone();
        let removed = timeline
            .remove(tariff_id)
            .ok_or(E::Delete(tariff::DeleteError::NotExists(tariff_id)))
            .map_err(tracerr::wrap!())?;

        tx.execute(Delete(By::<Tariff, _>::new(tariff_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        for changed in timeline.changed_since(&previous) {
            tx.execute(Update(changed.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(removed)
    }
}

/// Error of [`DeleteTariff`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Tariff`] cannot be deleted.
    #[display("{_0}")]
    #[from]
    Delete(tariff::DeleteError),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select},
        Date, Month,
    };

    use crate::{
        command::{create_tariff, record_meter_reading, spec, Command as _},
        domain::{student, tariff},
        infra::{Database as _, Memory},
        Service,
    };

    use super::{DeleteTariff, ExecutionError};

    #[tokio::test]
    async fn deletes_future_period() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let today = Date::today();
        let current = svc
            .execute(create_tariff::spec::create(today, false))
            .await
            .unwrap();
        let future = svc
            .execute(create_tariff::spec::create(today.add_days(40), false))
            .await
            .unwrap();
        let last = svc
            .execute(create_tariff::spec::create(today.add_days(80), false))
            .await
            .unwrap();

        _ = svc
            .execute(DeleteTariff {
                tariff_id: future.id,
            })
            .await
            .unwrap();

        let timeline = db
            .execute(Select(By::<tariff::Timeline, _>::new(())))
            .await
            .unwrap();
        let tariffs = timeline.tariffs();
        assert_eq!(tariffs.len(), 2);
        assert_eq!(tariffs[0].id, current.id);
        assert_eq!(
            tariffs[0].effective_to,
            Some(today.add_days(79).coerce()),
        );
        assert_eq!(tariffs[1].id, last.id);
    }

    #[tokio::test]
    async fn refuses_current_period() {
        let svc = Service::spec(Memory::new());
        let current = svc
            .execute(create_tariff::spec::create(Date::today(), false))
            .await
            .unwrap();

        let err = svc
            .execute(DeleteTariff {
                tariff_id: current.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Delete(tariff::DeleteError::Current(_)),
        ));
    }

    #[tokio::test]
    async fn refuses_period_with_readings() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let today = Date::today();
        let billed = svc
            .execute(create_tariff::spec::create(today.add_days(-90), true))
            .await
            .unwrap();
        _ = svc
            .execute(create_tariff::spec::create(today.add_days(40), false))
            .await
            .unwrap();
        let (room, _) = spec::room(&db, 2, student::Gender::Male).await;
        _ = svc
            .execute(record_meter_reading::spec::reading(
                room.id,
                Month::of(today),
                10,
                1,
            ))
            .await
            .unwrap();

        let err = svc
            .execute(DeleteTariff {
                tariff_id: billed.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Delete(tariff::DeleteError::HasReadings(_)),
        ));
    }
}
