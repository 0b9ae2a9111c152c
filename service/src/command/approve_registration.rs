//! [`Command`] for approving a [`Registration`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Notify, Select, Transact, Transacted, Update,
    },
    Date, DateTime, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        occupancy, payment, registration,
        room::{self, fee},
        staff, stay, student, Bed, Payment, Registration, Room, Stay, Student,
    },
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    Service,
};

use super::Command;

/// [`Command`] for approving a pending [`Registration`] by assigning a
/// [`Bed`] to its [`Student`].
///
/// The [`Bed`] assignment, the opened [`Stay`], the rent [`Payment`] and the
/// status changes are committed all at once.
#[derive(Clone, Copy, Debug)]
pub struct ApproveRegistration {
    /// ID of the [`Registration`] to be approved.
    pub registration_id: registration::Id,

    /// ID of the [`Bed`] to be assigned.
    pub bed_id: room::bed::Id,

    /// ID of the staff member approving the [`Registration`].
    pub approver_id: staff::Id,
}

impl<Db, Ntf> Command<ApproveRegistration> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Registration>, registration::Id>>,
            Ok = Option<Registration>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Bed>, room::bed::Id>>,
            Ok = Option<Bed>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Registration, registration::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Student, student::Id>>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Room, room::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Registration>, registration::Id>>,
            Ok = Option<Registration>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Student>, student::Id>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Room>, room::Id>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Bed>, room::bed::Id>>,
            Ok = Option<Bed>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Bed>, student::Id>>,
            Ok = Option<Bed>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Key>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Update<Bed>, Err = Traced<database::Error>>
        + Database<Update<Room>, Err = Traced<database::Error>>
        + Database<Insert<Stay>, Err = Traced<database::Error>>
        + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Update<Payment>, Err = Traced<database::Error>>
        + Database<Update<Student>, Err = Traced<database::Error>>
        + Database<Update<Registration>, Err = Traced<database::Error>>
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
        cmd: ApproveRegistration,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApproveRegistration {
            registration_id,
            bed_id,
            approver_id,
        } = cmd;

        let registration = self
            .database()
            .execute(Select(By::<Option<Registration>, _>::new(
                registration_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RegistrationNotExists(registration_id))
            .map_err(tracerr::wrap!())?;
        let room_id = self
            .database()
            .execute(Select(By::<Option<Bed>, _>::new(bed_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BedNotExists(bed_id))
            .map_err(tracerr::wrap!())?
            .room_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent reviews of the same `Registration`.
        tx.execute(Lock(By::<Registration, _>::new(registration_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Lock(By::<Student, _>::new(registration.student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        // Avoid concurrent assignments into the same `Room`.
        tx.execute(Lock(By::<Room, _>::new(room_id)))
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
        let mut student = tx
            .execute(Select(By::<Option<Student>, _>::new(
                registration.student_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::StudentNotExists(registration.student_id))
            .map_err(tracerr::wrap!())?;
        let mut room = tx
            .execute(Select(By::<Option<Room>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(room_id))
            .map_err(tracerr::wrap!())?;
        let mut bed = tx
            .execute(Select(By::<Option<Bed>, _>::new(bed_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BedNotExists(bed_id))
            .map_err(tracerr::wrap!())?;
        let held = tx
            .execute(Select(By::<Option<Bed>, _>::new(student.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Renewal keeping the same `Bed` continues the current `Stay`.
        let continues = registration.renewal_of.is_some()
            && held.as_ref().is_some_and(|b| b.id == bed.id);

        let move_in: Date = registration
            .move_in_date
            .map_or_else(Date::today, |d| d.coerce());

        if !continues {
            occupancy::assign(&mut room, &mut bed, &student, held.as_ref())
                .map_err(tracerr::from_and_wrap!(=> E))?;
            tx.execute(Update(bed.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            tx.execute(Update(room.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            tx.execute(Insert(Stay {
                id: stay::Id::new(),
                student_id: student.id,
                room_id: room.id,
                start_date: move_in.coerce(),
                end_date: None,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        }

        if let Some(end) = registration.contract_end_date {
            let key = payment::Key {
                student_id: student.id,
                room_id: Some(room.id),
                month: Month::of(move_in),
                kind: payment::Kind::Rent,
            };
            let fee = fee::calculate(room.monthly_rent, move_in, end.coerce());
            let mut invoiced = tx
                .execute(Select(By::<Option<Payment>, _>::new(key)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            // Renewals are invoiced up front for the `Room` they were priced
            // for, which may differ from the approved one.
            let priced = registration.room_id.filter(|id| *id != room.id);
            if let (None, Some(priced)) = (&invoiced, priced) {
                invoiced = tx
                    .execute(Select(By::<Option<Payment>, _>::new(
                        payment::Key {
                            room_id: Some(priced),
                            ..key
                        },
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                if let Some(mut rent) =
                    invoiced.clone().filter(|p| p.status.is_payable())
                {
                    rent.room_id = Some(room.id);
                    rent.amount = fee.amount;
                    tx.execute(Update(rent))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))
                        .map(drop)?;
                }
            }

            if invoiced.is_none() {
                tx.execute(Insert(Payment::new(key, fee.amount)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
            }
        }

        if !continues {
            student.status = student::Status::PendingCheckIn;
            tx.execute(Update(student))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        registration.status = registration::Status::Approved;
        registration.room_id = Some(room.id);
        registration.bed_id = Some(bed.id);
        registration.move_in_date = Some(move_in.coerce());
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

        if let Some(n) = Notification::approved(&registration) {
            self.notify(n).await;
        }

        Ok(registration)
    }
}

/// Error of [`ApproveRegistration`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Bed`] cannot be assigned.
    #[display("Cannot assign `Bed`: {_0}")]
    #[from]
    Assign(occupancy::AssignError),

    /// [`Bed`] does not exist.
    #[display("`Bed(id: {_0})` does not exist")]
    BedNotExists(#[error(not(source))] room::bed::Id),

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

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};
    use rust_decimal::Decimal;

    use crate::{
        command::{spec, Command as _},
        domain::{
            payment, registration, student, Bed, Payment, Registration,
            Room, Stay, Student,
        },
        infra::{
            database::memory::{Fault, Table},
            notifier::Notification,
            Database as _, Memory,
        },
        read::stay::Open,
        Service,
    };

    use super::{ApproveRegistration, ExecutionError};

    #[tokio::test]
    async fn assigns_bed_and_bills_rent() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (room, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, registration) =
            spec::registered(&svc, "a@uni.edu.vn").await;

        let approved = svc
            .execute(ApproveRegistration {
                registration_id: registration.id,
                bed_id: beds[0].id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        assert_eq!(approved.status, registration::Status::Approved);
        assert_eq!(approved.bed_id, Some(beds[0].id));
        let room = spec::select::<Room, _>(&db, room.id).await.unwrap();
        assert_eq!(room.occupants, 1);
        let bed = spec::select::<Bed, _>(&db, beds[0].id).await.unwrap();
        assert_eq!(bed.student_id, Some(student.id));
        let student = spec::select::<Student, _>(&db, student.id).await.unwrap();
        assert_eq!(student.status, student::Status::PendingCheckIn);
        let stay = db
            .execute(Select(By::<Option<Open<Stay>>, _>::new(student.id)))
            .await
            .unwrap();
        assert!(stay.is_some());
        let payments = db
            .execute(Select(By::<Vec<Payment>, _>::new(student.id)))
            .await
            .unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].kind, payment::Kind::Rent);
        assert_eq!(payments[0].status, payment::Status::Unpaid);
        assert!(payments[0].amount.amount > Decimal::ZERO);
        assert!(svc
            .notifier()
            .sent()
            .iter()
            .any(|n| matches!(n, Notification::RegistrationApproved { .. })));
    }

    #[tokio::test]
    async fn rolls_back_on_failure() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (room, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, registration) =
            spec::registered(&svc, "a@uni.edu.vn").await;
        db.fail_on(Fault::Insert(Table::Stays));

        let res = svc
            .execute(ApproveRegistration {
                registration_id: registration.id,
                bed_id: beds[0].id,
                approver_id: spec::staff(),
            })
            .await;

        assert!(res.is_err());
        let room = spec::select::<Room, _>(&db, room.id).await.unwrap();
        assert_eq!(room.occupants, 0);
        let bed = spec::select::<Bed, _>(&db, beds[0].id).await.unwrap();
        assert_eq!(bed.student_id, None);
        let student = spec::select::<Student, _>(&db, student.id).await.unwrap();
        assert_eq!(student.status, student::Status::Registered);
        let registration =
            spec::select::<Registration, _>(&db, registration.id)
                .await
                .unwrap();
        assert_eq!(registration.status, registration::Status::Pending);
        assert!(svc.notifier().sent().iter().all(|n| !matches!(
            n,
            Notification::RegistrationApproved { .. },
        )));
    }

    #[tokio::test]
    async fn refuses_occupied_bed() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (_, first) = spec::registered(&svc, "a@uni.edu.vn").await;
        let (_, second) = spec::registered(&svc, "b@uni.edu.vn").await;
        let approve = |registration_id| ApproveRegistration {
            registration_id,
            bed_id: beds[0].id,
            approver_id: spec::staff(),
        };

        _ = svc.execute(approve(first.id)).await.unwrap();
        let err = svc.execute(approve(second.id)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Assign(_)));
    }

    #[tokio::test]
    async fn refuses_reviewed_registration() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (_, registration) = spec::registered(&svc, "a@uni.edu.vn").await;
        let approve = |bed: &Bed| ApproveRegistration {
            registration_id: registration.id,
            bed_id: bed.id,
            approver_id: spec::staff(),
        };

        _ = svc.execute(approve(&beds[0])).await.unwrap();
        let err = svc.execute(approve(&beds[1])).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::RegistrationNotPending(_),
        ));
    }

    #[tokio::test]
    async fn refuses_other_gender() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Female).await;
        let (_, registration) = spec::registered(&svc, "a@uni.edu.vn").await;

        let err = svc
            .execute(ApproveRegistration {
                registration_id: registration.id,
                bed_id: beds[0].id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Assign(_)));
    }
}
