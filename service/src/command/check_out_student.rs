//! [`Command`] for checking a [`Student`] out.

use common::{
    operations::{
        By, Commit, Lock, Notify, Select, Transact, Transacted, Update,
    },
    Date,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{occupancy, room, student, Bed, Room, Stay, Student},
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    read::stay::Open,
    Service,
};

use super::Command;

/// [`Command`] for checking a [`Student`] out of the dormitory.
///
/// Releases the [`Bed`] held by the [`Student`] and closes the open [`Stay`]
/// with today's date.
#[derive(Clone, Copy, Debug)]
pub struct CheckOutStudent {
    /// ID of the [`Student`] to be checked out.
    pub student_id: student::Id,
}

impl<Db, Ntf> Command<CheckOutStudent> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Student, student::Id>>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Room, room::Id>>, Err = Traced<database::Error>>
        + Database<
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
            Select<By<Option<Open<Stay>>, student::Id>>,
            Ok = Option<Open<Stay>>,
            Err = Traced<database::Error>,
        > + Database<Update<Bed>, Err = Traced<database::Error>>
        + Database<Update<Room>, Err = Traced<database::Error>>
        + Database<Update<Stay>, Err = Traced<database::Error>>
        + Database<Update<Student>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<
        Notify<Notification>,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
{
    type Ok = Student;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CheckOutStudent,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CheckOutStudent { student_id } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Student, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut student = tx
            .execute(Select(By::<Option<Student>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::StudentNotExists(student_id))
            .map_err(tracerr::wrap!())?;
        if !student.status.holds_bed() {
            return Err(tracerr::new!(E::NotCheckedIn(student_id)));
        }

        let held = tx
            .execute(Select(By::<Option<Bed>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(mut bed) = held {
            tx.execute(Lock(By::<Room, _>::new(bed.room_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            let mut room = tx
                .execute(Select(By::<Option<Room>, _>::new(bed.room_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::RoomNotExists(bed.room_id))
                .map_err(tracerr::wrap!())?;

            _ = occupancy::release(&mut room, &mut bed)
                .map_err(tracerr::from_and_wrap!(=> E))?;

            tx.execute(Update(bed))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            tx.execute(Update(room))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let open = tx
            .execute(Select(By::<Option<Open<Stay>>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(Open(mut stay)) = open {
            stay.close(Date::today().coerce());
            tx.execute(Update(stay))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        student.status = student::Status::Ended;
        student.renewal_intent = student::RenewalIntent::Undecided;
        tx.execute(Update(student.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::CheckedOut { student_id }).await;

        Ok(student)
    }
}

/// Error of [`CheckOutStudent`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Student`] doesn't stay in the dormitory.
    #[display("`Student(id: {_0})` is not checked in")]
    NotCheckedIn(#[error(not(source))] student::Id),

    /// [`Bed`] cannot be released.
    #[display("Cannot release `Bed`: {_0}")]
    #[from]
    Release(occupancy::ReleaseError),

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select},
        Date, Month,
    };

    use crate::{
        command::{spec, Command as _},
        domain::{student, Bed, Room, Stay},
        infra::{notifier::Notification, Database as _, Memory},
        read::stay::Open,
        Service,
    };

    use super::{CheckOutStudent, ExecutionError};

    #[tokio::test]
    async fn releases_bed_and_closes_stay() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (room, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;

        let ended = svc
            .execute(CheckOutStudent {
                student_id: student.id,
            })
            .await
            .unwrap();

        assert_eq!(ended.status, student::Status::Ended);
        let room = spec::select::<Room, _>(&db, room.id).await.unwrap();
        assert_eq!(room.occupants, 0);
        let bed = spec::select::<Bed, _>(&db, beds[0].id).await.unwrap();
        assert!(!bed.is_occupied());
        let open = db
            .execute(Select(By::<Option<Open<Stay>>, _>::new(student.id)))
            .await
            .unwrap();
        assert!(open.is_none());
        let month = Month::of(Date::today());
        let stays = db
            .execute(Select(By::<Vec<Stay>, _>::new((room.id, month))))
            .await
            .unwrap();
        assert_eq!(stays.len(), 1);
        assert_eq!(stays[0].end_date, Some(Date::today().coerce()));
        assert!(svc
            .notifier()
            .sent()
            .contains(&Notification::CheckedOut {
                student_id: student.id
            }));
    }

    #[tokio::test]
    async fn refuses_student_without_bed() {
        let svc = Service::spec(Memory::new());
        let (student, _) = spec::registered(&svc, "a@uni.edu.vn").await;

        let err = svc
            .execute(CheckOutStudent {
                student_id: student.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotCheckedIn(_)));
    }
}
