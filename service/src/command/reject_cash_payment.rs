//! [`Command`] for rejecting a cash [`Payment`].

use common::{
    operations::{
        By, Commit, Lock, Notify, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{payment, staff, Payment},
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    Service,
};

use super::Command;

/// [`Command`] for rejecting a [`Payment`] awaiting cash, returning it to
/// [`payment::Status::Unpaid`].
#[derive(Clone, Copy, Debug)]
pub struct RejectCashPayment {
    /// ID of the [`Payment`] to be rejected.
    pub payment_id: payment::Id,

    /// ID of the staff member rejecting the [`Payment`].
    pub approver_id: staff::Id,
}

impl<Db, Ntf> Command<RejectCashPayment> for Service<Db, Ntf>
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
    Ntf: Notifier<
        Notify<Notification>,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RejectCashPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RejectCashPayment {
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

        payment.status = payment::Status::Unpaid;
        payment.method = None;
        payment.annotate(&format!(
            "cash rejected by {approver_id} at {}",
            DateTime::now().to_rfc3339(),
        ));

        tx.execute(Update(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::CashPaymentRejected {
            payment_id,
            student_id: payment.student_id,
        })
        .await;

        Ok(payment)
    }
}

/// Error of [`RejectCashPayment`] [`Command`] execution.
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
        domain::payment,
        infra::{notifier::Notification, Memory},
        Service,
    };

    use super::RejectCashPayment;

    #[tokio::test]
    async fn returns_to_unpaid() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 500_000).await;
        let request = RequestCashPayment {
            payment_id: payment.id,
        };
        _ = svc.execute(request).await.unwrap();

        let rejected = svc
            .execute(RejectCashPayment {
                payment_id: payment.id,
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        assert_eq!(rejected.status, payment::Status::Unpaid);
        assert_eq!(rejected.method, None);
        assert!(rejected.note.unwrap().to_string().starts_with("cash rejected"));
        assert!(svc.notifier().sent().iter().any(|n| matches!(
            n,
            Notification::CashPaymentRejected { payment_id, .. }
                if *payment_id == payment.id,
        )));

        let again = svc.execute(request).await.unwrap();
        assert_eq!(again.status, payment::Status::AwaitingCash);
    }
}
