//! [`Command`] for renewing a contract of a [`Student`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Notify, Select, Transact, Transacted,
    },
    Date, DateTime, Month,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        payment,
        registration::{self, ContractEndDate},
        room::{self, fee},
        student, term, Bed, Payment, Registration, Room, Student,
    },
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    read::{registration::Approved, Pending},
    Service,
};

use super::Command;

/// Number of days before the contract end when it may be renewed.
pub const WINDOW_DAYS: i64 = 7;

/// [`Command`] for renewing the latest approved contract of a [`Student`].
///
/// Creates a new pending [`Registration`] for the following term along with
/// its rent [`Payment`].
#[derive(Clone, Copy, Debug)]
pub struct RenewRegistration {
    /// ID of the [`Student`] renewing the contract.
    pub student_id: student::Id,
}

impl<Db, Ntf> Command<RenewRegistration> for Service<Db, Ntf>
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
            Select<By<Option<Approved<Registration>>, student::Id>>,
            Ok = Option<Approved<Registration>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Pending<Registration>>, student::Id>>,
            Ok = Option<Pending<Registration>>,
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
            Select<By<Option<Payment>, payment::Key>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Insert<Registration>, Err = Traced<database::Error>>
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
        cmd: RenewRegistration,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RenewRegistration { student_id } = cmd;
        let today = Date::today();

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Student, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Select(By::<Option<Student>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::StudentNotExists(student_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let Approved(previous) = tx
            .execute(Select(By::<Option<Approved<Registration>>, _>::new(
                student_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NoApprovedContract(student_id))
            .map_err(tracerr::wrap!())?;
        let Some(end) = previous.contract_end_date else {
            return Err(tracerr::new!(E::NoApprovedContract(student_id)));
        };
        let end: Date = end.coerce();
        if end < today || end > today.add_days(WINDOW_DAYS) {
            return Err(tracerr::new!(E::NotWithinRenewalWindow(
                end.coerce()
            )));
        }

        let pending = tx
            .execute(Select(By::<Option<Pending<Registration>>, _>::new(
                student_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if pending.is_some() {
            return Err(tracerr::new!(E::PendingExists(student_id)));
        }

        // The held `Bed` wins over the contract, as transfers move it.
        let held = tx
            .execute(Select(By::<Option<Bed>, _>::new(student_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let (room_id, bed_id) = match held {
            Some(bed) => (bed.room_id, Some(bed.id)),
            None => (
                previous
                    .room_id
                    .ok_or(E::NoApprovedContract(student_id))
                    .map_err(tracerr::wrap!())?,
                previous.bed_id,
            ),
        };
        let room = tx
            .execute(Select(By::<Option<Room>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(room_id))
            .map_err(tracerr::wrap!())?;

        let start = end.next_day();
        let new_end = term::end_date(start);

        let key = payment::Key {
            student_id,
            room_id: Some(room.id),
            month: Month::of(start),
            kind: payment::Kind::Rent,
        };
        let invoiced = tx
            .execute(Select(By::<Option<Payment>, _>::new(key)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if invoiced.is_none() {
            let fee = fee::calculate(room.monthly_rent, start, new_end);
            tx.execute(Insert(Payment::new(key, fee.amount)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let registration = Registration {
            id: registration::Id::new(),
            student_id,
            room_id: Some(room.id),
            bed_id,
            move_in_date: Some(start.coerce()),
            contract_end_date: Some(new_end.coerce()),
            preference: previous.preference.clone(),
            status: registration::Status::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            renewal_of: Some(previous.id),
            reminded_at: None,
            created_at: DateTime::now().coerce(),
        };
        tx.execute(Insert(registration.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::ContractRenewed {
            registration_id: registration.id,
            student_id,
            contract_end_date: new_end.coerce(),
        })
        .await;

        Ok(registration)
    }
}

/// Error of [`RenewRegistration`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Student`] has no approved contract to renew.
    #[display("`Student(id: {_0})` has no approved contract")]
    NoApprovedContract(#[error(not(source))] student::Id),

    /// Contract doesn't end soon enough to be renewed.
    #[display("Contract ending on {_0} cannot be renewed yet")]
    NotWithinRenewalWindow(#[error(not(source))] ContractEndDate),

    /// [`Student`] has a pending [`Registration`] already.
    #[display("`Student(id: {_0})` has a pending `Registration` already")]
    PendingExists(#[error(not(source))] student::Id),

    /// [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),

    /// [`Student`] does not exist.
    #[display("`Student(id: {_0})` does not exist")]
    StudentNotExists(#[error(not(source))] student::Id),
}
