//! [`Command`] for verifying an email of a [`Student`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{student, Student},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for verifying an email of a [`Student`] with a one-time
/// [`student::VerificationToken`].
#[derive(Clone, Copy, Debug)]
pub struct VerifyStudentEmail {
    /// [`student::VerificationToken`] sent to the email.
    pub token: student::VerificationToken,
}

impl<Db, Ntf> Command<VerifyStudentEmail> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Student>, student::VerificationToken>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Student, student::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Student>, student::Id>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<Insert<Student>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Student;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: VerifyStudentEmail,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let VerifyStudentEmail { token } = cmd;

        let student_id = self
            .database()
            .execute(Select(By::<Option<Student>, _>::new(token)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::InvalidToken)
            .map_err(tracerr::wrap!())?
            .id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        // Token is consumed by a concurrent verification otherwise.
        let mut student = tx
            .execute(Select(By::<Option<Student>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|s| s.verification_token == Some(token))
            .ok_or(E::InvalidToken)
            .map_err(tracerr::wrap!())?;

        student.email_verified = true;
        student.verification_token = None;

        tx.execute(Insert(student.clone()))
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

/// Error of [`VerifyStudentEmail`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`student::VerificationToken`] is unknown or used already.
    #[display("Verification token is invalid or used already")]
    InvalidToken,
}
