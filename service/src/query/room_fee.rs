//! [`RoomFee`] definition.

use common::{
    operations::{By, Select},
    Date,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{room, Room},
    infra::{database, Database},
    Query, Service,
};

/// [`Query`] previewing the rent of a [`Room`] over a period.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoomFee {
    /// ID of the [`Room`] to be rented.
    pub room_id: room::Id,

    /// First day of the period.
    pub start: Date,

    /// Last day of the period (inclusive).
    pub end: Date,
}

impl<Db, Ntf> Query<RoomFee> for Service<Db, Ntf>
where
    Db: Database<
        Select<By<Option<Room>, room::Id>>,
        Ok = Option<Room>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = room::fee::Fee;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        RoomFee {
            room_id,
            start,
            end,
        }: RoomFee,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        if end < start {
            return Err(tracerr::new!(E::InvalidPeriod { start, end }));
        }

        let room = self
            .database()
            .execute(Select(By::<Option<Room>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(room_id))
            .map_err(tracerr::wrap!())?;

        Ok(room::fee::calculate(room.monthly_rent, start, end))
    }
}

/// Error of [`RoomFee`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Period ends before it starts.
    #[display("period {start}..={end} is empty")]
    InvalidPeriod {
        /// First day of the period.
        start: Date,

        /// Last day of the period.
        end: Date,
    },

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),
}
