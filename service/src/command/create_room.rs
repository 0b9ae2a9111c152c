//! [`Command`] for creating a new [`Room`].

use common::{
    operations::{By, Insert, Select},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{room, student, Room},
    infra::{
        database::{self, constraint},
        Database,
    },
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Room`] without any [`Bed`]s.
///
/// [`Bed`]: room::Bed
#[derive(Clone, Debug)]
pub struct CreateRoom {
    /// [`room::Number`] of the new [`Room`].
    pub number: room::Number,

    /// [`room::Capacity`] of the new [`Room`].
    pub capacity: room::Capacity,

    /// [`room::Area`] of the new [`Room`].
    pub area: room::Area,

    /// Monthly rent of the new [`Room`].
    pub monthly_rent: Money,

    /// [`student::Gender`] the new [`Room`] is designated for.
    pub gender: student::Gender,
}

impl<Db, Ntf> Command<CreateRoom> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Room>, room::Number>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Database<Insert<Room>, Err = Traced<database::Error>>,
{
    type Ok = Room;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateRoom) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateRoom {
            number,
            capacity,
            area,
            monthly_rent,
            gender,
        } = cmd;

        if monthly_rent.is_negative() || monthly_rent.amount.is_zero() {
            return Err(tracerr::new!(E::InvalidRent(monthly_rent)));
        }

        let existing = self
            .database()
            .execute(Select(By::<Option<Room>, _>::new(number.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Err(tracerr::new!(E::NumberOccupied(number)));
        }

        let room = Room {
            id: room::Id::new(),
            number,
            capacity,
            area,
            monthly_rent,
            gender,
            occupants: 0,
            created_at: DateTime::now().coerce(),
        };
        let inserted = self.database().execute(Insert(room.clone())).await;
        if let Err(e) = &inserted {
            if e.as_ref().is_unique_violation(Some(constraint::ROOM_NUMBER)) {
                return Err(tracerr::new!(E::NumberOccupied(room.number)));
            }
        }
        inserted
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(room)
    }
}

/// Error of [`CreateRoom`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Monthly rent is not positive.
    #[display("Monthly rent must be positive, but is {_0}")]
    InvalidRent(#[error(not(source))] Money),

    /// [`Room`] with the same [`room::Number`] exists already.
    #[display("`Room(number: {_0})` exists already")]
    NumberOccupied(#[error(not(source))] room::Number),
}
