//! [`Command`] for setting up a password of a [`Student`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretBox};
use tracerr::Traced;

use crate::{
    domain::{student, Student},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for setting up a password of a [`Student`].
///
/// A password may be set up only once, after the email is verified.
#[derive(Debug)]
pub struct SetUpStudentPassword {
    /// ID of the [`Student`].
    pub student_id: student::Id,

    /// New [`student::Password`].
    pub password: SecretBox<student::Password>,
}

impl<Db, Ntf> Command<SetUpStudentPassword> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
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
        cmd: SetUpStudentPassword,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SetUpStudentPassword {
            student_id,
            password,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut student = tx
            .execute(Select(By::<Option<Student>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::StudentNotExists(student_id))
            .map_err(tracerr::wrap!())?;
        if !student.email_verified {
            return Err(tracerr::new!(E::EmailNotVerified(student_id)));
        }
        if !student.can_set_up_password() {
            return Err(tracerr::new!(E::PasswordAlreadySet(student_id)));
        }

        student.password_hash = Some(
            student::PasswordHash::new(password.expose_secret())
                .map_err(tracerr::from_and_wrap!(=> E))?,
        );

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

/// Error of [`SetUpStudentPassword`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Email of the [`Student`] is not verified yet.
    #[display("`Student(id: {_0})` email is not verified")]
    EmailNotVerified(#[error(not(source))] student::Id),

    /// Password hashing failed.
    #[display("Failed to hash password: {_0}")]
    #[from]
    Hashing(bcrypt::BcryptError),

    /// Password of the [`Student`] is set up already.
    #[display("`Student(id: {_0})` password is set up already")]
    PasswordAlreadySet(#[error(not(source))] student::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{
        command::{
            submit_registration::{spec::submission, Submission},
            Command as _, VerifyStudentEmail,
        },
        domain::student,
        infra::Memory,
        Service,
    };

    use super::SetUpStudentPassword;

    fn password() -> SecretBox<student::Password> {
        SecretBox::new(Box::new(student::Password::new("secret1").unwrap()))
    }

    #[tokio::test]
    async fn sets_up_password_once_after_verification() {
        let svc = Service::spec(Memory::new());
        let Submission::Created { student, .. } =
            svc.execute(submission("a@uni.edu.vn")).await.unwrap()
        else {
            panic!("expected `Submission::Created`");
        };
        let setup = || SetUpStudentPassword {
            student_id: student.id,
            password: password(),
        };

        assert!(svc.execute(setup()).await.is_err(), "not verified yet");

        _ = svc
            .execute(VerifyStudentEmail {
                token: student.verification_token.unwrap(),
            })
            .await
            .unwrap();
        let updated = svc.execute(setup()).await.unwrap();

        assert!(updated
            .password_hash
            .unwrap()
            .verify(&student::Password::new("secret1").unwrap()));
        assert!(svc.execute(setup()).await.is_err(), "set up twice");
    }
}
