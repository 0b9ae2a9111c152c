//! [`Command`] for requesting to pay a [`Payment`] in cash.

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{payment, Payment},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for requesting to pay a payable [`Payment`] in cash, which is
/// to be confirmed by a staff member.
#[derive(Clone, Copy, Debug)]
pub struct RequestCashPayment {
    /// ID of the [`Payment`] to be paid in cash.
    pub payment_id: payment::Id,
}

impl<Db, Ntf> Command<RequestCashPayment> for Service<Db, Ntf>
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
        cmd: RequestCashPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RequestCashPayment { payment_id } = cmd;

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
        if !payment.status.is_payable() {
            return Err(tracerr::new!(E::NotPayable(payment.status)));
        }

        payment.status = payment::Status::AwaitingCash;
        payment.method = Some(payment::Method::Cash);

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

/// Error of [`RequestCashPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Payment`] cannot be paid in its current [`payment::Status`].
    #[display("`Payment` in `{_0}` status cannot be paid")]
    NotPayable(#[error(not(source))] payment::Status),

    /// [`Payment`] does not exist.
    #[display("`Payment(id: {_0})` does not exist")]
    PaymentNotExists(#[error(not(source))] payment::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{create_payment_link::spec::unpaid, Command as _},
        domain::payment,
        infra::Memory,
        Service,
    };

    use super::{ExecutionError, RequestCashPayment};

    #[tokio::test]
    async fn awaits_cash_confirmation() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 500_000).await;

        let requested = svc
            .execute(RequestCashPayment {
                payment_id: payment.id,
            })
            .await
            .unwrap();

        assert_eq!(requested.status, payment::Status::AwaitingCash);
        assert_eq!(requested.method, Some(payment::Method::Cash));
    }

    #[tokio::test]
    async fn refuses_repeated_request() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 500_000).await;
        let cmd = RequestCashPayment {
            payment_id: payment.id,
        };
        _ = svc.execute(cmd).await.unwrap();

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotPayable(payment::Status::AwaitingCash),
        ));
    }
}
