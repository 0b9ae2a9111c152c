//! [`Command`] for allocating utility costs of a [`meter::Reading`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted,
    },
    Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        meter, payment, room, tariff, utility, Payment, Room, Stay,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for splitting electricity and water costs of a
/// [`meter::Reading`] between the [`Room`] occupants, and billing each of
/// them with a utility [`Payment`].
#[derive(Clone, Copy, Debug)]
pub struct AllocateUtilities {
    /// ID of the [`meter::Reading`] to allocate.
    pub reading_id: meter::Id,
}

impl<Db, Ntf> Command<AllocateUtilities> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<meter::Reading>, meter::Id>>,
            Ok = Option<meter::Reading>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<tariff::Timeline, ()>>,
            Ok = tariff::Timeline,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Lock<By<Room, room::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Vec<utility::Share>, meter::Id>>,
            Ok = Vec<utility::Share>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Stay>, (room::Id, Month)>>,
            Ok = Vec<Stay>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Key>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<utility::Share>, Err = Traced<database::Error>>
        + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    /// [`None`] if nobody stayed in the [`Room`] within the [`Month`].
    type Ok = Option<utility::Allocation>;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AllocateUtilities,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AllocateUtilities { reading_id } = cmd;

        let reading = self
            .database()
            .execute(Select(By::<Option<meter::Reading>, _>::new(reading_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ReadingNotExists(reading_id))
            .map_err(tracerr::wrap!())?;
        let timeline = self
            .database()
            .execute(Select(By::<tariff::Timeline, _>::new(())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let tariff = timeline
            .lookup(reading.month)
            .ok_or(E::NoTariff(reading.month))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        // Avoid concurrent allocations of the same `Room`.
        tx.execute(Lock(By::<Room, _>::new(reading.room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let allocated = tx
            .execute(Select(By::<Vec<utility::Share>, _>::new(reading_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !allocated.is_empty() {
            return Err(tracerr::new!(E::AlreadyAllocated(reading_id)));
        }

        let stays = tx
            .execute(Select(By::<Vec<Stay>, _>::new((
                reading.room_id,
                reading.month,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let Some(allocation) = utility::allocate(&reading, tariff, &stays)
        else {
            return Ok(None);
        };

        for share in &allocation.shares {
            tx.execute(Insert(share.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let key = payment::Key {
                student_id: share.student_id,
                room_id: Some(share.room_id),
                month: share.month,
                kind: payment::Kind::Utilities,
            };
            let invoiced = tx
                .execute(Select(By::<Option<Payment>, _>::new(key)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if invoiced.is_none() {
                tx.execute(Insert(Payment::new(key, share.total)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
            }
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(Some(allocation))
    }
}

/// Error of [`AllocateUtilities`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`meter::Reading`] is allocated already.
    #[display("`Reading(id: {_0})` is allocated already")]
    AlreadyAllocated(#[error(not(source))] meter::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No [`Tariff`] is in effect for the [`Month`].
    ///
    /// [`Tariff`]: crate::domain::Tariff
    #[display("No tariff is in effect for {_0}")]
    NoTariff(#[error(not(source))] Month),

    /// [`meter::Reading`] does not exist.
    #[display("`Reading(id: {_0})` does not exist")]
    ReadingNotExists(#[error(not(source))] meter::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Select},
        Date, Money, Month,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::{record_meter_reading, spec, Command as _},
        domain::{payment, student, tariff, Payment},
        infra::{Database as _, Memory},
        Service,
    };

    use super::{AllocateUtilities, ExecutionError};

    #[tokio::test]
    async fn bills_every_occupant_once() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let month = Month::of(Date::today());
        db.execute(Insert(tariff::spec::tariff(month.first_day())))
            .await
            .unwrap();
        let (room, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (a, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        let (b, _) = spec::resident(&svc, "b@uni.edu.vn", &beds[1]).await;
        let reading = svc
            .execute(record_meter_reading::spec::reading(
                room.id, month, 100, 10,
            ))
            .await
            .unwrap();

        let allocation = svc
            .execute(AllocateUtilities {
                reading_id: reading.id,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(allocation.total, Money::vnd(Decimal::from(500_000)));
        assert_eq!(allocation.shares.len(), 2);
        for student in [a.id, b.id] {
            let payments = db
                .execute(Select(By::<Vec<Payment>, _>::new(student)))
                .await
                .unwrap();
            let utilities = payments
                .iter()
                .filter(|p| p.kind == payment::Kind::Utilities)
                .collect::<Vec<_>>();
            assert_eq!(utilities.len(), 1);
            assert_eq!(utilities[0].amount, Money::vnd(Decimal::from(250_000)));
        }

        let err = svc
            .execute(AllocateUtilities {
                reading_id: reading.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::AlreadyAllocated(_)));
    }

    #[tokio::test]
    async fn skips_empty_room() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let month = Month::of(Date::today());
        db.execute(Insert(tariff::spec::tariff(month.first_day())))
            .await
            .unwrap();
        let (room, _) = spec::room(&db, 2, student::Gender::Male).await;
        let reading = svc
            .execute(record_meter_reading::spec::reading(
                room.id, month, 100, 10,
            ))
            .await
            .unwrap();

        let allocation = svc
            .execute(AllocateUtilities {
                reading_id: reading.id,
            })
            .await
            .unwrap();

        assert!(allocation.is_none());
    }

    #[tokio::test]
    async fn requires_tariff() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (room, _) = spec::room(&db, 2, student::Gender::Male).await;
        let reading = svc
            .execute(record_meter_reading::spec::reading(
                room.id,
                Month::of(Date::today()),
                100,
                10,
            ))
            .await
            .unwrap();

        let err = svc
            .execute(AllocateUtilities {
                reading_id: reading.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NoTariff(_)));
    }
}
