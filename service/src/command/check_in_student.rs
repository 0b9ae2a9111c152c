//! [`Command`] for checking a [`Student`] in.

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{student, Student},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for checking an approved [`Student`] into the dormitory.
#[derive(Clone, Copy, Debug)]
pub struct CheckInStudent {
    /// ID of the [`Student`] to be checked in.
    pub student_id: student::Id,
}

impl<Db, Ntf> Command<CheckInStudent> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Student, student::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Student>, student::Id>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<Update<Student>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Student;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CheckInStudent,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CheckInStudent { student_id } = cmd;

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
        if student.status != student::Status::PendingCheckIn {
            return Err(tracerr::new!(E::NotPendingCheckIn(student_id)));
        }
        student.status = student::Status::Resident;

        tx.execute(Update(student.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(student)
    }
}

/// Error of [`CheckInStudent`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Student`] is not waiting for a check-in.
    #[display("`Student(id: {_0})` is not pending check-in")]
    NotPendingCheckIn(#[error(not(source))] student::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}
