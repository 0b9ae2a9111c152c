//! [`Command`] for approving a [`Transfer`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Notify, Select, Transact, Transacted,
        Update,
    },
    Date, DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        occupancy, room, staff, stay, student, transfer, Bed, Registration,
        Room, Stay, Student, Transfer,
    },
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    read::{registration::Approved, stay::Open},
    Service,
};

use super::Command;

/// [`Command`] for approving a pending [`Transfer`].
///
/// Moves the [`Student`] into a free [`Bed`] of the target [`Room`]: the old
/// [`Stay`] ends yesterday and a new one starts today. The current contract
/// of the [`Student`] follows the new [`Bed`].
#[derive(Clone, Copy, Debug)]
pub struct ApproveTransfer {
    /// ID of the [`Transfer`] to be approved.
    pub transfer_id: transfer::Id,

    /// ID of the staff member approving the [`Transfer`].
    pub approver_id: staff::Id,
}

impl<Db, Ntf> Command<ApproveTransfer> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Transfer>, transfer::Id>>,
            Ok = Option<Transfer>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Transfer, transfer::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Student, student::Id>>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Room, room::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Transfer>, transfer::Id>>,
            Ok = Option<Transfer>,
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
            Select<By<Vec<Bed>, room::Id>>,
            Ok = Vec<Bed>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Open<Stay>>, student::Id>>,
            Ok = Option<Open<Stay>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Approved<Registration>>, student::Id>>,
            Ok = Option<Approved<Registration>>,
            Err = Traced<database::Error>,
        > + Database<Update<Bed>, Err = Traced<database::Error>>
        + Database<Update<Room>, Err = Traced<database::Error>>
        + Database<Update<Registration>, Err = Traced<database::Error>>
        + Database<Update<Stay>, Err = Traced<database::Error>>
        + Database<Insert<Stay>, Err = Traced<database::Error>>
        + Database<Update<Transfer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<
        Notify<Notification>,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
{
    type Ok = Transfer;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ApproveTransfer,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApproveTransfer {
            transfer_id,
            approver_id,
        } = cmd;

        let transfer = self
            .database()
            .execute(Select(By::<Option<Transfer>, _>::new(transfer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::TransferNotExists(transfer_id))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Transfer, _>::new(transfer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Lock(By::<Student, _>::new(transfer.student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut transfer = tx
            .execute(Select(By::<Option<Transfer>, _>::new(transfer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::TransferNotExists(transfer_id))
            .map_err(tracerr::wrap!())?;
        if transfer.status != transfer::Status::Pending {
            return Err(tracerr::new!(E::TransferNotPending(transfer_id)));
        }
        let student = tx
            .execute(Select(By::<Option<Student>, _>::new(
                transfer.student_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::StudentNotExists(transfer.student_id))
            .map_err(tracerr::wrap!())?;
        let mut old_bed = tx
            .execute(Select(By::<Option<Bed>, _>::new(student.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NoBed(student.id))
            .map_err(tracerr::wrap!())?;

        // Rooms are locked in a stable order to avoid deadlocks with a
        // concurrent opposite transfer.
        let (first, second) = if old_bed.room_id < transfer.to_room_id {
            (old_bed.room_id, transfer.to_room_id)
        } else {
            (transfer.to_room_id, old_bed.room_id)
        };
        for id in [first, second] {
            tx.execute(Lock(By::<Room, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let mut from = tx
            .execute(Select(By::<Option<Room>, _>::new(old_bed.room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(old_bed.room_id))
            .map_err(tracerr::wrap!())?;
        let mut to = tx
            .execute(Select(By::<Option<Room>, _>::new(transfer.to_room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(transfer.to_room_id))
            .map_err(tracerr::wrap!())?;
        if from.id == to.id {
            return Err(tracerr::new!(E::SameRoom(to.id)));
        }
        let mut new_bed = tx
            .execute(Select(By::<Vec<Bed>, _>::new(to.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .into_iter()
            .find(|b| !b.is_occupied())
            .ok_or(E::NoFreeBed(to.id))
            .map_err(tracerr::wrap!())?;

        _ = occupancy::release(&mut from, &mut old_bed)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        occupancy::assign(&mut to, &mut new_bed, &student, None)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        // Old `Bed` goes first, as a `Student` may hold only one.
        tx.execute(Update(old_bed))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let new_bed_id = new_bed.id;
        tx.execute(Update(new_bed))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(from))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(to.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let today = Date::today();
        let open = tx
            .execute(Select(By::<Option<Open<Stay>>, _>::new(student.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(Open(mut stay)) = open {
            stay.close(today.previous_day().coerce());
            tx.execute(Update(stay))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }
        tx.execute(Insert(Stay {
            id: stay::Id::new(),
            student_id: student.id,
            room_id: to.id,
            start_date: today.coerce(),
            end_date: None,
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        let approved = tx
            .execute(Select(By::<Option<Approved<Registration>>, _>::new(
                student.id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(Approved(mut contract)) = approved {
            contract.room_id = Some(to.id);
            contract.bed_id = Some(new_bed_id);
            tx.execute(Update(contract))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        transfer.status = transfer::Status::Approved;
        transfer.reviewed_by = Some(approver_id);
        transfer.reviewed_at = Some(DateTime::now().coerce());
        tx.execute(Update(transfer.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::TransferApproved {
            transfer_id,
            student_id: student.id,
        })
        .await;

        Ok(transfer)
    }
}

/// Error of [`ApproveTransfer`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Bed`] cannot be assigned.
    #[display("Cannot assign `Bed`: {_0}")]
    #[from]
    Assign(occupancy::AssignError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Student`] doesn't hold any [`Bed`].
    #[display("`Student(id: {_0})` holds no bed")]
    NoBed(#[error(not(source))] student::Id),

    /// Target [`Room`] has no free [`Bed`].
    #[display("`Room(id: {_0})` has no free bed")]
    NoFreeBed(#[error(not(source))] room::Id),

    /// [`Bed`] cannot be released.
    #[display("Cannot release `Bed`: {_0}")]
    #[from]
    Release(occupancy::ReleaseError),

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),

    /// [`Student`] stays in the target [`Room`] already.
    #[display("`Student` stays in `Room(id: {_0})` already")]
    SameRoom(#[error(not(source))] room::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),

    /// [`Transfer`] does not exist.
    #[display("`Transfer(id: {_0})` does not exist")]
    TransferNotExists(#[error(not(source))] transfer::Id),

    /// [`Transfer`] is reviewed already.
    #[display("`Transfer(id: {_0})` is not pending")]
    TransferNotPending(#[error(not(source))] transfer::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select, Update},
        Date, Money, Month,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::{
            renew_registration::spec::ending_in, request_transfer, spec,
            ApproveRegistration, Command as _, RenewRegistration,
        },
        domain::{
            payment, room::fee, student, term, transfer, Bed, Payment,
            Registration, Room, Stay, Student,
        },
        infra::{
            notifier::{Notification, Outbox},
            Database as _, Memory,
        },
        read::stay::Open,
        Service,
    };

    use super::{ApproveTransfer, ExecutionError};

    /// Moves the provided resident [`Student`] into the target [`Room`].
    async fn transfer(
        svc: &Service<Memory, Outbox>,
        student: &Student,
        to: &Room,
    ) {
        let transfer = svc
            .execute(request_transfer::spec::request(student.id, to.id))
            .await
            .unwrap();
        _ = svc
            .execute(ApproveTransfer {
                transfer_id: transfer.id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap();
    }

    /// Approves the provided renewal into the [`Bed`] held by its
    /// [`Student`], returning the rent [`Payment`]s of its first month.
    async fn approve_in_place(
        svc: &Service<Memory, Outbox>,
        db: &Memory,
        renewal: &Registration,
    ) -> Vec<Payment> {
        let held = spec::select::<Bed, _>(db, renewal.student_id)
            .await
            .unwrap();
        _ = svc
            .execute(ApproveRegistration {
                registration_id: renewal.id,
                bed_id: held.id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        let month = Month::of(renewal.move_in_date.unwrap());
        db.execute(Select(By::<Vec<Payment>, _>::new(renewal.student_id)))
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.kind == payment::Kind::Rent && p.month == month)
            .collect()
    }

    /// Returns the rent of the provided renewal in the provided [`Room`].
    fn renewal_rent(renewal: &Registration, room: &Room) -> Money {
        let start = renewal.move_in_date.unwrap().coerce();
        fee::calculate(room.monthly_rent, start, term::end_date(start)).amount
    }

    /// Stores a new [`Room`] renting for `1 500 000` a month.
    async fn pricier_room(db: &Memory) -> Room {
        let (mut room, _) = spec::room(db, 2, student::Gender::Male).await;
        room.monthly_rent = Money::vnd(Decimal::from(1_500_000));
        db.execute(Update(room.clone())).await.unwrap();
        room
    }

    #[tokio::test]
    async fn moves_student() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (from, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (to, target_beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        let transfer = svc
            .execute(request_transfer::spec::request(student.id, to.id))
            .await
            .unwrap();

        let approved = svc
            .execute(ApproveTransfer {
                transfer_id: transfer.id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        assert_eq!(approved.status, transfer::Status::Approved);
        let from = spec::select::<Room, _>(&db, from.id).await.unwrap();
        let to = spec::select::<Room, _>(&db, to.id).await.unwrap();
        assert_eq!((from.occupants, to.occupants), (0, 1));
        let old = spec::select::<Bed, _>(&db, beds[0].id).await.unwrap();
        assert!(!old.is_occupied());
        let held = spec::select::<Bed, _>(&db, student.id).await.unwrap();
        assert_eq!(held.room_id, to.id);
        assert!(target_beds.iter().any(|b| b.id == held.id));

        let Open(open) = db
            .execute(Select(By::<Option<Open<Stay>>, _>::new(student.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.room_id, to.id);
        assert_eq!(open.start_date, Date::today().coerce());
        let closed = db
            .execute(Select(By::<Vec<Stay>, _>::new((
                from.id,
                Month::of(Date::today()),
            ))))
            .await
            .unwrap();
        assert!(closed.iter().all(|s| !s.is_open()));
        assert!(svc
            .notifier()
            .sent()
            .iter()
            .any(|n| matches!(n, Notification::TransferApproved { .. })));
    }

    #[tokio::test]
    async fn refuses_full_target() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (to, target_beds) = spec::room(&db, 1, student::Gender::Male).await;
        let (student, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        let transfer = svc
            .execute(request_transfer::spec::request(student.id, to.id))
            .await
            .unwrap();
        _ = spec::resident(&svc, "b@uni.edu.vn", &target_beds[0]).await;

        let err = svc
            .execute(ApproveTransfer {
                transfer_id: transfer.id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NoFreeBed(_)));
        let held = spec::select::<Bed, _>(&db, student.id).await.unwrap();
        assert_eq!(held.id, beds[0].id);
    }

    #[tokio::test]
    async fn moves_current_contract() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let to = pricier_room(&db).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;

        transfer(&svc, &student, &to).await;

        let contract = spec::select::<Registration, _>(&db, approved.id)
            .await
            .unwrap();
        let held = spec::select::<Bed, _>(&db, student.id).await.unwrap();
        assert_eq!(contract.room_id, Some(to.id));
        assert_eq!(contract.bed_id, Some(held.id));
        assert_eq!(contract.contract_end_date, approved.contract_end_date);
    }

    #[tokio::test]
    async fn renewal_after_transfer_bills_target_room_once() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let to = pricier_room(&db).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        transfer(&svc, &student, &to).await;
        let contract = spec::select::<Registration, _>(&db, approved.id)
            .await
            .unwrap();
        _ = ending_in(&db, contract, 3).await;
        spec::drop_invoices(&db, &student).await;

        let renewal = svc
            .execute(RenewRegistration {
                student_id: student.id,
            })
            .await
            .unwrap();
        assert_eq!(renewal.room_id, Some(to.id));
        let rents = approve_in_place(&svc, &db, &renewal).await;

        assert_eq!(rents.len(), 1);
        assert_eq!(rents[0].room_id, Some(to.id));
        assert_eq!(rents[0].amount, renewal_rent(&renewal, &to));
    }

    #[tokio::test]
    async fn transfer_before_renewal_approval_reprices_rent() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let to = pricier_room(&db).await;
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

        transfer(&svc, &student, &to).await;
        let rents = approve_in_place(&svc, &db, &renewal).await;

        assert_eq!(rents.len(), 1);
        assert_eq!(rents[0].room_id, Some(to.id));
        assert_eq!(rents[0].amount, renewal_rent(&renewal, &to));
    }
}
