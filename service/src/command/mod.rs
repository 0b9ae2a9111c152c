//! [`Command`] definition.

pub mod allocate_utilities;
pub mod approve_cash_payment;
pub mod approve_registration;
pub mod approve_transfer;
pub mod check_in_student;
pub mod check_out_student;
pub mod create_bed;
pub mod create_payment_link;
pub mod create_room;
pub mod create_tariff;
pub mod delete_tariff;
pub mod record_meter_reading;
pub mod reject_cash_payment;
pub mod reject_registration;
pub mod reject_transfer;
pub mod renew_registration;
pub mod request_cash_payment;
pub mod request_transfer;
pub mod set_renewal_intent;
pub mod set_up_student_password;
pub mod settle_gateway_payment;
pub mod submit_registration;
pub mod update_room;
pub mod update_tariff;
pub mod verify_student_email;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    allocate_utilities::AllocateUtilities,
    approve_cash_payment::ApproveCashPayment,
    approve_registration::ApproveRegistration,
    approve_transfer::ApproveTransfer, check_in_student::CheckInStudent,
    check_out_student::CheckOutStudent, create_bed::CreateBed,
    create_payment_link::CreatePaymentLink, create_room::CreateRoom,
    create_tariff::CreateTariff, delete_tariff::DeleteTariff,
    record_meter_reading::RecordMeterReading,
    reject_cash_payment::RejectCashPayment,
    reject_registration::RejectRegistration,
    reject_transfer::RejectTransfer, renew_registration::RenewRegistration,
    request_cash_payment::RequestCashPayment,
    request_transfer::RequestTransfer, set_renewal_intent::SetRenewalIntent,
    set_up_student_password::SetUpStudentPassword,
    settle_gateway_payment::SettleGatewayPayment,
    submit_registration::SubmitRegistration, update_room::UpdateRoom,
    update_tariff::UpdateTariff, verify_student_email::VerifyStudentEmail,
};

#[cfg(test)]
pub(crate) mod spec {
    use std::sync::atomic::{AtomicU32, Ordering};

    use common::operations::{By, Delete, Insert, Select};
    use tracerr::Traced;
    use uuid::Uuid;

    use crate::{
        domain::{
            room, staff, student, Bed, Payment, Registration, Room, Student,
        },
        infra::{database, notifier::Outbox, Database, Memory},
        Service,
    };

    use super::{
        submit_registration::{self, Submission},
        ApproveRegistration, CheckInStudent, Command as _,
    };

    /// Returns a random staff member ID.
    pub(crate) fn staff() -> staff::Id {
        Uuid::new_v4().into()
    }

    /// Selects a committed entity by the provided key.
    pub(crate) async fn select<T, K>(db: &Memory, key: K) -> Option<T>
    where
        Memory: Database<
            Select<By<Option<T>, K>>,
            Ok = Option<T>,
            Err = Traced<database::Error>,
        >,
    {
        db.execute(Select(By::new(key))).await.unwrap()
    }

    /// Drops all the [`Payment`]s of the provided [`Student`], so that only
    /// the following ones remain billed.
    pub(crate) async fn drop_invoices(db: &Memory, student: &Student) {
        let payments = db
            .execute(Select(By::<Vec<Payment>, _>::new(student.id)))
            .await
            .unwrap();
        for p in payments {
            db.execute(Delete(By::<Payment, _>::new(p.id))).await.unwrap();
        }
    }

    /// Stores a new [`Room`] with all its [`Bed`]s.
    pub(crate) async fn room(
        db: &Memory,
        capacity: u8,
        gender: student::Gender,
    ) -> (Room, Vec<Bed>) {
        static NUMBER: AtomicU32 = AtomicU32::new(1);

        let mut room = room::spec::room(capacity, gender);
        room.number = room::Number::new(format!(
            "R{}",
            NUMBER.fetch_add(1, Ordering::Relaxed),
        ))
        .unwrap();
        db.execute(Insert(room.clone())).await.unwrap();

        let mut beds = Vec::new();
        for n in 1..=capacity {
            let bed = Bed {
                id: room::bed::Id::new(),
                room_id: room.id,
                number: room::bed::Number::new(n.to_string()).unwrap(),
                student_id: None,
            };
            db.execute(Insert(bed.clone())).await.unwrap();
            beds.push(bed);
        }
        (room, beds)
    }

    /// Submits a new [`Registration`] for a new male [`Student`].
    pub(crate) async fn registered(
        svc: &Service<Memory, Outbox>,
        email: &str,
    ) -> (Student, Registration) {
        let cmd = submit_registration::spec::submission(email);
        match svc.execute(cmd).await.unwrap() {
            Submission::Created {
                student,
                registration,
            } => (*student, registration),
            Submission::AlreadyExists => panic!("`{email}` exists already"),
        }
    }

    /// Registers, approves and checks in a new [`Student`] into the provided
    /// [`Bed`].
    pub(crate) async fn resident(
        svc: &Service<Memory, Outbox>,
        email: &str,
        bed: &Bed,
    ) -> (Student, Registration) {
        let (student, registration) = registered(svc, email).await;
        let registration = svc
            .execute(ApproveRegistration {
                registration_id: registration.id,
                bed_id: bed.id,
                approver_id: staff(),
            })
            .await
            .unwrap();
        let student = svc
            .execute(CheckInStudent {
                student_id: student.id,
            })
            .await
            .unwrap();
        (student, registration)
    }
}
