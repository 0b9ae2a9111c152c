//! [`Command`] for approving a cash [`Payment`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{payment, staff, Payment},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for confirming that a [`Payment`] awaiting cash was handed to
/// a staff member.
#[derive(Clone, Copy, Debug)]
pub struct ApproveCashPayment {
    /// ID of the [`Payment`] to be approved.
    pub payment_id: payment::Id,

    /// ID of the staff member who received the cash.
    pub approver_id: staff::Id,
}

impl<Db, Ntf> Command<ApproveCashPayment> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Payment, payment::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Update<Payment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ApproveCashPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApproveCashPayment {
            payment_id,
            approver_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Payment, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut payment = tx
            .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(payment_id))
            .map_err(tracerr::wrap!())?;
        if payment.status != payment::Status::AwaitingCash {
            return Err(tracerr::new!(E::NotAwaitingCash(payment.status)));
        }

        let now = DateTime::now();
        payment.settle(now);
        payment.annotate(&format!(
            "cash approved by {approver_id} at {}",
            now.to_rfc3339(),
        ));

        tx.execute(Update(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(payment)
    }
}

/// Error of [`ApproveCashPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Payment`] doesn't await a cash confirmation.
    #[display("`Payment` in `{_0}` status doesn't await cash")]
    NotAwaitingCash(#[error(not(source))] payment::Status),

    /// [`Payment`] does not exist.
    #[display("`Payment(id: {_0})` does not exist")]
    PaymentNotExists(#[error(not(source))] payment::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            create_payment_link::spec::unpaid, spec, Command as _,
            RequestCashPayment,
        },
        domain::{payment, Payment},
        infra::Memory,
        Service,
    };

    use super::{ApproveCashPayment, ExecutionError};

    #[tokio::test]
    async fn settles_with_audit_note() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 500_000).await;
        _ = svc
            .execute(RequestCashPayment {
                payment_id: payment.id,
            })
            .await
            .unwrap();

        let paid = svc
            .execute(ApproveCashPayment {
                payment_id: payment.id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        assert_eq!(paid.status, payment::Status::Paid);
        assert!(paid.paid_at.is_some());
        assert!(paid.note.unwrap().to_string().starts_with("cash approved"));
        let stored = spec::select::<Payment, _>(&db, payment.id).await.unwrap();
        assert_eq!(stored.status, payment::Status::Paid);
    }

    #[tokio::test]
    async fn refuses_unrequested_payment() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 500_000).await;

        let err = svc
            .execute(ApproveCashPayment {
                payment_id: payment.id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotAwaitingCash(payment::Status::Unpaid),
        ));
    }
}
