//! [`Command`] for updating a [`Room`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{room, student, Bed, Room},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for updating properties of an existing [`Room`].
///
/// [`None`] fields are left unchanged.
#[derive(Clone, Copy, Debug)]
pub struct UpdateRoom {
    /// ID of the [`Room`] to be updated.
    pub room_id: room::Id,

    /// New [`room::Capacity`] of the [`Room`].
    pub capacity: Option<room::Capacity>,

    /// New [`room::Area`] of the [`Room`].
    pub area: Option<room::Area>,

    /// New monthly rent of the [`Room`].
    pub monthly_rent: Option<Money>,

    /// New [`student::Gender`] the [`Room`] is designated for.
    pub gender: Option<student::Gender>,
}

impl<Db, Ntf> Command<UpdateRoom> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Lock<By<Room, room::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Room>, room::Id>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Bed>, room::Id>>,
            Ok = Vec<Bed>,
            Err = Traced<database::Error>,
        > + Database<Update<Room>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Room;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: UpdateRoom) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateRoom {
            room_id,
            capacity,
            area,
            monthly_rent,
            gender,
        } = cmd;

        if let Some(rent) = monthly_rent {
            if rent.is_negative() || rent.amount.is_zero() {
                return Err(tracerr::new!(E::InvalidRent(rent)));
            }
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Room, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut room = tx
            .execute(Select(By::<Option<Room>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(room_id))
            .map_err(tracerr::wrap!())?;

        if let Some(capacity) = capacity {
            let beds = tx
                .execute(Select(By::<Vec<Bed>, _>::new(room_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            room.change_capacity(capacity, beds.len())
                .map_err(tracerr::from_and_wrap!(=> E))?;
        }
        if let Some(gender) = gender {
            if gender != room.gender && room.occupants > 0 {
                return Err(tracerr::new!(E::GenderLocked(room_id)));
            }
            room.gender = gender;
        }
        if let Some(area) = area {
            room.area = area;
        }
        if let Some(rent) = monthly_rent {
            room.monthly_rent = rent;
        }

        tx.execute(Update(room.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(room)
    }
}

/// Error of [`UpdateRoom`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`room::Capacity`] cannot be changed.
    #[display("Cannot change capacity: {_0}")]
    #[from]
    Capacity(room::CapacityError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`student::Gender`] of an occupied [`Room`] cannot be changed.
    #[display("`Room(id: {_0})` is occupied, so its gender cannot change")]
    GenderLocked(#[error(not(source))] room::Id),

    /// Monthly rent is not positive.
    #[display("Monthly rent must be positive, but is {_0}")]
    InvalidRent(#[error(not(source))] Money),

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),
}
