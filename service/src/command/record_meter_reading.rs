//! [`Command`] for recording a [`meter::Reading`].

use common::{
    operations::{By, Insert, Select},
    DateTime, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{meter, room, Room},
    infra::{
        database::{self, constraint},
        Database,
    },
    Service,
};

use super::Command;

/// [`Command`] for recording monthly electricity and water
/// [`meter::Reading`]s of a [`Room`].
///
/// Previous values default to the current values of the previous [`Month`]
/// reading, or zero if there is none.
#[derive(Clone, Copy, Debug)]
pub struct RecordMeterReading {
    /// ID of the [`Room`] the meters belong to.
    pub room_id: room::Id,

    /// [`Month`] of the reading.
    pub month: Month,

    /// Current electricity meter value.
    pub electricity: u32,

    /// Current water meter value.
    pub water: u32,

    /// Previous electricity meter value, if it differs from the recorded one.
    pub previous_electricity: Option<u32>,

    /// Previous water meter value, if it differs from the recorded one.
    pub previous_water: Option<u32>,
}

impl<Db, Ntf> Command<RecordMeterReading> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Room>, room::Id>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<meter::Reading>, (room::Id, Month)>>,
            Ok = Option<meter::Reading>,
            Err = Traced<database::Error>,
        > + Database<Insert<meter::Reading>, Err = Traced<database::Error>>,
{
    type Ok = meter::Reading;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RecordMeterReading,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RecordMeterReading {
            room_id,
            month,
            electricity,
            water,
            previous_electricity,
            previous_water,
        } = cmd;

        self.database()
            .execute(Select(By::<Option<Room>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(room_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let existing = self
            .database()
            .execute(Select(By::<Option<meter::Reading>, _>::new((
                room_id, month,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Err(tracerr::new!(E::AlreadyRecorded(month)));
        }

        let last = self
            .database()
            .execute(Select(By::<Option<meter::Reading>, _>::new((
                room_id,
                month.previous(),
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let (last_electricity, last_water) = last
            .map_or((0, 0), |r| (r.electricity.current, r.water.current));

        let reading = meter::Reading {
            id: meter::Id::new(),
            room_id,
            month,
            electricity: meter::Counter::new(
                previous_electricity.unwrap_or(last_electricity),
                electricity,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?,
            water: meter::Counter::new(
                previous_water.unwrap_or(last_water),
                water,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?,
            created_at: DateTime::now().coerce(),
        };

        let inserted = self.database().execute(Insert(reading.clone())).await;
        if let Err(e) = &inserted {
            if e.as_ref()
                .is_unique_violation(Some(constraint::METER_READING_MONTH))
            {
                return Err(tracerr::new!(E::AlreadyRecorded(month)));
            }
        }
        inserted
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(reading)
    }
}

/// Error of [`RecordMeterReading`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`meter::Reading`] for the [`Month`] is recorded already.
    #[display("Meter reading for {_0} is recorded already")]
    AlreadyRecorded(#[error(not(source))] Month),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Meter value went backwards.
    #[display("Invalid meter value: {_0}")]
    #[from]
    InvalidCounter(meter::CounterError),

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),
}
