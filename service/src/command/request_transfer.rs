//! [`Command`] for requesting a [`Transfer`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{room, student, transfer, Bed, Room, Student, Transfer},
    infra::{database, Database},
    read::Pending,
    Service,
};

use super::Command;

/// [`Command`] for requesting a [`Transfer`] of a [`Student`] into another
/// [`Room`].
#[derive(Clone, Debug)]
pub struct RequestTransfer {
    /// ID of the [`Student`] requesting the [`Transfer`].
    pub student_id: student::Id,

    /// ID of the [`Room`] to move into.
    pub to_room_id: room::Id,

    /// [`transfer::Reason`] of the [`Transfer`].
    pub reason: transfer::Reason,
}

impl<Db, Ntf> Command<RequestTransfer> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Student, student::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Student>, student::Id>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Bed>, student::Id>>,
            Ok = Option<Bed>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Room>, room::Id>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Pending<Transfer>>, student::Id>>,
            Ok = Option<Pending<Transfer>>,
            Err = Traced<database::Error>,
        > + Database<Insert<Transfer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Transfer;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RequestTransfer,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RequestTransfer {
            student_id,
            to_room_id,
            reason,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Student, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let student = tx
            .execute(Select(By::<Option<Student>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::StudentNotExists(student_id))
            .map_err(tracerr::wrap!())?;
        let from_room_id = tx
            .execute(Select(By::<Option<Bed>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NoBed(student_id))
            .map_err(tracerr::wrap!())?
            .room_id;
        if from_room_id == to_room_id {
            return Err(tracerr::new!(E::SameRoom(to_room_id)));
        }

        let target = tx
            .execute(Select(By::<Option<Room>, _>::new(to_room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(to_room_id))
            .map_err(tracerr::wrap!())?;
        if target.gender != student.gender {
            return Err(tracerr::new!(E::GenderMismatch(to_room_id)));
        }
        if !target.has_vacancy() {
            return Err(tracerr::new!(E::RoomFull(to_room_id)));
        }

        let pending = tx
            .execute(Select(By::<Option<Pending<Transfer>>, _>::new(
                student_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if pending.is_some() {
            return Err(tracerr::new!(E::PendingExists(student_id)));
        }

        let transfer = Transfer {
            id: transfer::Id::new(),
            student_id,
            from_room_id,
            to_room_id,
            reason,
            status: transfer::Status::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            created_at: DateTime::now().coerce(),
        };
        tx.execute(Insert(transfer.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(transfer)
    }
}

/// Error of [`RequestTransfer`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Target [`Room`] is designated for another gender.
    #[display("`Room(id: {_0})` is designated for another gender")]
    GenderMismatch(#[error(not(source))] room::Id),

    /// [`Student`] doesn't hold any [`Bed`].
    #[display("`Student(id: {_0})` holds no bed")]
    NoBed(#[error(not(source))] student::Id),

    /// [`Student`] has a pending [`Transfer`] already.
    #[display("`Student(id: {_0})` has a pending `Transfer` already")]
    PendingExists(#[error(not(source))] student::Id),

    /// Target [`Room`] has no vacancy.
    #[display("`Room(id: {_0})` is full")]
    RoomFull(#[error(not(source))] room::Id),

    /// Target [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),

    /// [`Student`] stays in the target [`Room`] already.
    #[display("`Student` stays in `Room(id: {_0})` already")]
    SameRoom(#[error(not(source))] room::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}

#[cfg(test)]
pub(crate) mod spec {
    use crate::{
        command::{spec, Command as _},
        domain::{room, student, transfer},
        infra::Memory,
        Service,
    };

    use super::{ExecutionError, RequestTransfer};

    pub(crate) fn request(
        student_id: student::Id,
        to_room_id: room::Id,
    ) -> RequestTransfer {
        RequestTransfer {
            student_id,
            to_room_id,
            reason: transfer::Reason::new("Too noisy").unwrap(),
        }
    }

    #[tokio::test]
    async fn requests_once() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (target, _) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;

        let transfer =
            svc.execute(request(student.id, target.id)).await.unwrap();
        assert_eq!(transfer.status, transfer::Status::Pending);
        assert_eq!(transfer.from_room_id, beds[0].room_id);

        let err = svc
            .execute(request(student.id, target.id))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::PendingExists(_)));
    }

    #[tokio::test]
    async fn checks_target_room() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (own, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (female, _) = spec::room(&db, 2, student::Gender::Female).await;
        let (full, full_beds) = spec::room(&db, 1, student::Gender::Male).await;
        let (student, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        _ = spec::resident(&svc, "b@uni.edu.vn", &full_beds[0]).await;

        let cases: [(room::Id, fn(&ExecutionError) -> bool); 3] = [
            (own.id, |e| matches!(e, ExecutionError::SameRoom(_))),
            (female.id, |e| matches!(e, ExecutionError::GenderMismatch(_))),
            (full.id, |e| matches!(e, ExecutionError::RoomFull(_))),
        ];
        for (room, check) in cases {
            let err = svc.execute(request(student.id, room)).await.unwrap_err();
            assert!(check(err.as_ref()), "unexpected error: {err:?}");
        }
    }

    #[tokio::test]
    async fn requires_bed() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (target, _) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, _) = spec::registered(&svc, "a@uni.edu.vn").await;

        let err = svc
            .execute(request(student.id, target.id))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NoBed(_)));
    }
}
