//! [`Command`] for creating a new [`Bed`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{room, Bed, Room},
    infra::{
        database::{self, constraint},
        Database,
    },
    Service,
};

use super::Command;

/// [`Command`] for adding a new [`Bed`] into a [`Room`].
#[derive(Clone, Debug)]
pub struct CreateBed {
    /// ID of the [`Room`] to add the [`Bed`] into.
    pub room_id: room::Id,

    /// [`room::bed::Number`] of the new [`Bed`] within its [`Room`].
    pub number: room::bed::Number,
}

impl<Db, Ntf> Command<CreateBed> for Service<Db, Ntf>
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
        > + Database<Insert<Bed>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Bed;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateBed) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBed { room_id, number } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        // Avoid concurrent additions exceeding the capacity.
        tx.execute(Lock(By::<Room, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let room = tx
            .execute(Select(By::<Option<Room>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(room_id))
            .map_err(tracerr::wrap!())?;
        let beds = tx
            .execute(Select(By::<Vec<Bed>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if beds.len() >= usize::from(room.capacity.get()) {
            return Err(tracerr::new!(E::CapacityReached(room_id)));
        }
        if beds.iter().any(|b| b.number == number) {
            return Err(tracerr::new!(E::NumberOccupied(number)));
        }

        let bed = Bed {
            id: room::bed::Id::new(),
            room_id,
            number,
            student_id: None,
        };
        let inserted = tx.execute(Insert(bed.clone())).await;
        if let Err(e) = &inserted {
            if e.as_ref().is_unique_violation(Some(constraint::BED_NUMBER)) {
                return Err(tracerr::new!(E::NumberOccupied(bed.number)));
            }
        }
        inserted
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(bed)
    }
}

/// Error of [`CreateBed`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Room`] has as many [`Bed`]s as its capacity allows.
    #[display("`Room(id: {_0})` has no capacity for more beds")]
    CapacityReached(#[error(not(source))] room::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Bed`] with the same [`room::bed::Number`] exists in the [`Room`].
    #[display("`Bed(number: {_0})` exists already")]
    NumberOccupied(#[error(not(source))] room::bed::Number),

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),
}
