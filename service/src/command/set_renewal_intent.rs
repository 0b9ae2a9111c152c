//! [`Command`] for setting a [`student::RenewalIntent`].

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

/// [`Command`] for recording whether a [`Student`] wants to renew the
/// contract once it ends.
#[derive(Clone, Copy, Debug)]
pub struct SetRenewalIntent {
    /// ID of the [`Student`].
    pub student_id: student::Id,

    /// New [`student::RenewalIntent`].
    pub intent: student::RenewalIntent,
}

impl<Db, Ntf> Command<SetRenewalIntent> for Service<Db, Ntf>
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
        cmd: SetRenewalIntent,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SetRenewalIntent { student_id, intent } = cmd;

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
        if student.renewal_intent == intent {
            return Ok(student);
        }
        student.renewal_intent = intent;

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

/// Error of [`SetRenewalIntent`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Student`] doesn't stay in the dormitory.
    #[display("`Student(id: {_0})` is not checked in")]
    NotCheckedIn(#[error(not(source))] student::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{spec, Command as _},
        domain::{student, Student},
        infra::Memory,
        Service,
    };

    use super::{ExecutionError, SetRenewalIntent};

    #[tokio::test]
    async fn records_intent() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 1, student::Gender::Male).await;
        let (student, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;

        _ = svc
            .execute(SetRenewalIntent {
                student_id: student.id,
                intent: student::RenewalIntent::Leave,
            })
            .await
            .unwrap();

        let student = spec::select::<Student, _>(&db, student.id).await.unwrap();
        assert_eq!(student.renewal_intent, student::RenewalIntent::Leave);
    }

    #[tokio::test]
    async fn refuses_student_without_bed() {
        let svc = Service::spec(Memory::new());
        let (student, _) = spec::registered(&svc, "a@uni.edu.vn").await;

        let err = svc
            .execute(SetRenewalIntent {
                student_id: student.id,
                intent: student::RenewalIntent::Renew,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotCheckedIn(_)));
    }
}
