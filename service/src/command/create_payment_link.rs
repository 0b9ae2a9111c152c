//! [`Command`] for creating a payment link of a [`Payment`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{payment, Payment},
    infra::{database, Database},
    Service,
};

use super::Command;

/// Number of attempts to derive a free [`payment::OrderCode`].
const ORDER_CODE_ATTEMPTS: u8 = 3;

/// [`Command`] for creating a payment link of a payable [`Payment`].
///
/// Every new link gets a fresh [`payment::OrderCode`] and expires after the
/// configured timeout, returning the [`Payment`] to
/// [`payment::Status::Unpaid`].
#[derive(Clone, Copy, Debug)]
pub struct CreatePaymentLink {
    /// ID of the [`Payment`] to be paid through the gateway.
    pub payment_id: payment::Id,
}

impl<Db, Ntf> Command<CreatePaymentLink> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Payment, payment::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::OrderCode>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Update<Payment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreatePaymentLink,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreatePaymentLink { payment_id } = cmd;

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

        let now = DateTime::now();
        let mut order_code = None;
        for attempt in 0..ORDER_CODE_ATTEMPTS {
            let code = payment::OrderCode::new(payment_id, now, attempt);
            let taken = tx
                .execute(Select(By::<Option<Payment>, _>::new(code)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .is_some_and(|p| p.id != payment_id);
            if !taken {
                order_code = Some(code);
                break;
            }
            log::debug!(%code, "`payment::OrderCode` is taken");
        }
        payment.order_code = Some(
            order_code
                .ok_or(E::NoFreeOrderCode)
                .map_err(tracerr::wrap!())?,
        );
        payment.status = payment::Status::AwaitingGateway;
        payment.method = Some(payment::Method::Transfer);
        payment.link_expires_at =
            Some((now + self.config().payment_gateway.link_timeout).coerce());

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

/// Error of [`CreatePaymentLink`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No free [`payment::OrderCode`] could be derived.
    #[display("No free `payment::OrderCode` is left")]
    NoFreeOrderCode,

    /// [`Payment`] cannot be paid in its current [`payment::Status`].
    #[display("`Payment` in `{_0}` status cannot be paid")]
    NotPayable(#[error(not(source))] payment::Status),

    /// [`Payment`] does not exist.
    #[display("`Payment(id: {_0})` does not exist")]
    PaymentNotExists(#[error(not(source))] payment::Id),
}

#[cfg(test)]
pub(crate) mod spec {
    use std::time::Duration;

    use common::{
        operations::{Insert, Update},
        Date, DateTime, Money, Month,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::{spec, Command as _},
        domain::{payment, student, Payment},
        infra::{Database as _, Memory},
        Service,
    };

    use super::{CreatePaymentLink, ExecutionError};

    /// Stores a new [`payment::Status::Unpaid`] rent [`Payment`] of the
    /// provided `amount`.
    pub(crate) async fn unpaid(db: &Memory, amount: i64) -> Payment {
        let payment = Payment::new(
            payment::Key {
                student_id: student::Id::new(),
                room_id: None,
                month: Month::of(Date::today()),
                kind: payment::Kind::Rent,
            },
            Money::vnd(Decimal::from(amount)),
        );
        db.execute(Insert(payment.clone())).await.unwrap();
        payment
    }

    #[tokio::test]
    async fn opens_expiring_link() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 800_000).await;

        let linked = svc
            .execute(CreatePaymentLink {
                payment_id: payment.id,
            })
            .await
            .unwrap();

        assert_eq!(linked.status, payment::Status::AwaitingGateway);
        assert_eq!(linked.method, Some(payment::Method::Transfer));
        assert!(linked.order_code.is_some());
        let expires = linked.link_expires_at.unwrap().coerce::<()>();
        let timeout = expires - DateTime::now();
        assert!(timeout.as_secs() > 14 * 60 && timeout.as_secs() <= 15 * 60);
        let stored = spec::select::<Payment, _>(&db, payment.id).await.unwrap();
        assert_eq!(stored.order_code, linked.order_code);
    }

    #[tokio::test]
    async fn refuses_pending_payment() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 800_000).await;
        let cmd = CreatePaymentLink {
            payment_id: payment.id,
        };
        _ = svc.execute(cmd).await.unwrap();

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotPayable(payment::Status::AwaitingGateway),
        ));
    }

    #[tokio::test]
    async fn refuses_unknown_payment() {
        let svc = Service::spec(Memory::new());

        let err = svc
            .execute(CreatePaymentLink {
                payment_id: payment::Id::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::PaymentNotExists(_)));
    }

    #[tokio::test]
    async fn skips_taken_order_code() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = unpaid(&db, 800_000).await;
        let now = DateTime::now();
        let mut taken = Vec::new();
        for at in [now, now + Duration::from_secs(1)] {
            let mut other = unpaid(&db, 500_000).await;
            let code = payment::OrderCode::new(payment.id, at, 0);
            other.order_code = Some(code);
            db.execute(Update(other)).await.unwrap();
            taken.push(code);
        }

        let linked = svc
            .execute(CreatePaymentLink {
                payment_id: payment.id,
            })
            .await
            .unwrap();

        let code = linked.order_code.unwrap();
        assert!(!taken.contains(&code));
        let stored = spec::select::<Payment, _>(&db, payment.id).await.unwrap();
        assert_eq!(stored.order_code, Some(code));
    }
}
