//! [`Command`] for rejecting a [`Registration`].

use common::{
    operations::{
        By, Commit, Delete, Lock, Notify, Select, Transact, Transacted,
        Update,
    },
    DateTime, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        payment, registration, staff, student, Payment, Registration, Student,
    },
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    Service,
};

use super::Command;

/// [`Command`] for rejecting a pending [`Registration`].
///
/// Rejecting a renewal drops its still payable rent [`Payment`] and makes
/// the [`Student`] leave once the current contract ends.
#[derive(Clone, Debug)]
pub struct RejectRegistration {
    /// ID of the [`Registration`] to be rejected.
    pub registration_id: registration::Id,

    /// Reason of the rejection.
    pub reason: registration::RejectionReason,

    /// ID of the staff member rejecting the [`Registration`].
    pub approver_id: staff::Id,
}

impl<Db, Ntf> Command<RejectRegistration> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Registration, registration::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Student, student::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Registration>, registration::Id>>,
            Ok = Option<Registration>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Student>, student::Id>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Key>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Payment, payment::Id>>,
            Err = Traced<database::Error>,
        > + Database<Update<Registration>, Err = Traced<database::Error>>
        + Database<Update<Student>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<
        Notify<Notification>,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
{
    type Ok = Registration;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RejectRegistration,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RejectRegistration {
            registration_id,
            reason,
            approver_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Registration, _>::new(registration_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut registration = tx
            .execute(Select(By::<Option<Registration>, _>::new(
                registration_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RegistrationNotExists(registration_id))
            .map_err(tracerr::wrap!())?;
        if registration.status != registration::Status::Pending {
            return Err(tracerr::new!(E::RegistrationNotPending(
                registration_id
            )));
        }

        if registration.renewal_of.is_some() {
            let student_id = registration.student_id;
            tx.execute(Lock(By::<Student, _>::new(student_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            if let (Some(room_id), Some(start)) =
                (registration.room_id, registration.move_in_date)
            {
                let key = payment::Key {
                    student_id,
                    room_id: Some(room_id),
                    month: Month::of(start),
                    kind: payment::Kind::Rent,
                };
                let rent = tx
                    .execute(Select(By::<Option<Payment>, _>::new(key)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                match rent {
                    Some(p) if p.status.is_payable() => {
                        tx.execute(Delete(By::<Payment, _>::new(p.id)))
                            .await
                            .map_err(tracerr::map_from_and_wrap!(=> E))
                            .map(drop)?;
                    }
                    Some(p) => log::warn!(
                        payment_id = %p.id,
                        status = %p.status,
                        "rent of rejected renewal is kept",
                    ),
                    None => {}
                }
            }

            let mut student = tx
                .execute(Select(By::<Option<Student>, _>::new(student_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::StudentNotExists(student_id))
                .map_err(tracerr::wrap!())?;
            if student.renewal_intent != student::RenewalIntent::Leave {
                student.renewal_intent = student::RenewalIntent::Leave;
                tx.execute(Update(student))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
            }
        }

        registration.status = registration::Status::Rejected;
        registration.rejection_reason = Some(reason.clone());
        registration.reviewed_by = Some(approver_id);
        registration.reviewed_at = Some(DateTime::now().coerce());

        tx.execute(Update(registration.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::RegistrationRejected {
            registration_id,
            student_id: registration.student_id,
            reason,
        })
        .await;

        Ok(registration)
    }
}

/// Error of [`RejectRegistration`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Registration`] does not exist.
    #[display("`Registration(id: {_0})` does not exist")]
    RegistrationNotExists(#[error(not(source))] registration::Id),

    /// [`Registration`] is reviewed already.
    #[display("`Registration(id: {_0})` is not pending")]
    RegistrationNotPending(#[error(not(source))] registration::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select},
        Month,
    };

    use crate::{
        command::{
            renew_registration::spec::ending_in, spec, Command as _,
            RenewRegistration,
        },
        domain::{payment, registration, student, Bed, Payment, Room, Student},
        infra::{
            notifier::{Notification, Outbox},
            Database as _, Memory,
        },
        Service,
    };

    use super::{ExecutionError, RejectRegistration};

    fn reason() -> registration::RejectionReason {
        registration::RejectionReason::new("No vacancies left").unwrap()
    }

    #[tokio::test]
    async fn rejects_without_occupancy_changes() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (room, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (_, registration) = spec::registered(&svc, "a@uni.edu.vn").await;

        let rejected = svc
            .execute(RejectRegistration {
                registration_id: registration.id,
                reason: reason(),
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        assert_eq!(rejected.status, registration::Status::Rejected);
        assert_eq!(rejected.rejection_reason, Some(reason()));
        let room = spec::select::<Room, _>(&db, room.id).await.unwrap();
        assert_eq!(room.occupants, 0);
        let bed = spec::select::<Bed, _>(&db, beds[0].id).await.unwrap();
        assert!(!bed.is_occupied());
        assert!(svc
            .notifier()
            .sent()
            .iter()
            .any(|n| matches!(n, Notification::RegistrationRejected { .. })));
    }

    #[tokio::test]
    async fn refuses_reviewed_registration() {
        let svc = Service::spec(Memory::new());
        let (_, registration) = spec::registered(&svc, "a@uni.edu.vn").await;
        let reject = || RejectRegistration {
            registration_id: registration.id,
            reason: reason(),
            approver_id: spec::staff(),
        };
        _ = svc.execute(reject()).await.unwrap();

        let err = svc.execute(reject()).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::RegistrationNotPending(_),
        ));
    }

    #[tokio::test]
    async fn survives_broken_notifier() {
        let db = Memory::new();
        let svc = Service::spec_with(db, Outbox::broken());
        let (_, registration) = spec::registered(&svc, "a@uni.edu.vn").await;

        let res = svc
            .execute(RejectRegistration {
                registration_id: registration.id,
                reason: reason(),
                approver_id: spec::staff(),
            })
            .await;

        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn drops_rent_of_rejected_renewal() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        _ = ending_in(&db, approved, 3).await;
        spec::drop_invoices(&db, &student).await;
        let renewal = svc
            .execute(RenewRegistration {
                student_id: student.id,
            })
            .await
            .unwrap();
        let key = payment::Key {
            student_id: student.id,
            room_id: renewal.room_id,
            month: Month::of(renewal.move_in_date.unwrap()),
            kind: payment::Kind::Rent,
        };
        let rent = db
            .execute(Select(By::<Option<Payment>, _>::new(key)))
            .await
            .unwrap();
        assert!(rent.is_some());

        _ = svc
            .execute(RejectRegistration {
                registration_id: renewal.id,
                reason: reason(),
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        let rent = db
            .execute(Select(By::<Option<Payment>, _>::new(key)))
            .await
            .unwrap();
        assert!(rent.is_none());
        let student = spec::select::<Student, _>(&db, student.id)
            .await
            .unwrap();
        assert_eq!(student.renewal_intent, student::RenewalIntent::Leave);
        assert_eq!(student.status, student::Status::Resident);
    }
}
