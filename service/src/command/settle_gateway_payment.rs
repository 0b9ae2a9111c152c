//! [`Command`] for settling a [`Payment`] reported by the payment gateway.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        payment::{self, gateway},
        Payment,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for settling a [`Payment`] by a [`gateway::Webhook`].
///
/// Settling an already paid [`Payment`] is a no-op, so the gateway may
/// safely redeliver its webhooks.
#[derive(Clone, Debug)]
pub struct SettleGatewayPayment {
    /// [`gateway::Webhook`] received from the payment gateway.
    pub webhook: gateway::Webhook,
}

impl<Db, Ntf> Command<SettleGatewayPayment> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Payment>, payment::OrderCode>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
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
        cmd: SettleGatewayPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let config = &self.config().payment_gateway;
        let settlement = cmd
            .webhook
            .verify(&config.checksum_key)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let order_code = settlement.order_code;

        let payment_id = self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(order_code)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UnknownOrder(order_code))
            .map_err(tracerr::wrap!())?
            .id;

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
            .filter(|p| p.order_code == Some(order_code))
            .ok_or(E::UnknownOrder(order_code))
            .map_err(tracerr::wrap!())?;
        if payment.status == payment::Status::Paid {
            log::debug!(%order_code, "`Payment` is settled already");
            return Ok(payment);
        }

        if settlement.amount != payment.amount {
            if config.strict_amount_check {
                return Err(tracerr::new!(E::AmountMismatch {
                    expected: payment.amount,
                    actual: settlement.amount,
                }));
            }
            log::warn!(
                %order_code,
                expected = %payment.amount,
                actual = %settlement.amount,
                "settling `Payment` despite amount mismatch",
            );
        }

        payment.method = Some(payment::Method::Transfer);
        payment.reference = settlement.reference;
        payment.settle(DateTime::now());

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

/// Error of [`SettleGatewayPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Reported amount differs from the owed one.
    #[display("paid `{actual}` differs from owed `{expected}`")]
    AmountMismatch {
        /// Owed amount.
        expected: Money,

        /// Amount reported by the gateway.
        actual: Money,
    },

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No [`Payment`] has the reported [`payment::OrderCode`].
    #[display("no `Payment` with `{_0}` order code")]
    UnknownOrder(#[error(not(source))] payment::OrderCode),

    /// [`gateway::Webhook`] cannot be verified.
    #[display("`Webhook` verification failed: {_0}")]
    #[from]
    Verification(gateway::VerificationError),
}

#[cfg(test)]
mod spec {
    use secrecy::SecretString;
    use serde_json::{json, Value};

    use crate::{
        command::{
            create_payment_link::spec::unpaid, spec, Command as _,
            CreatePaymentLink,
        },
        domain::{
            payment::{self, gateway},
            Payment,
        },
        infra::{notifier::Outbox, Memory},
        Service,
    };

    use super::{ExecutionError, SettleGatewayPayment};

    fn webhook(
        order_code: payment::OrderCode,
        amount: i64,
    ) -> SettleGatewayPayment {
        let Value::Object(data) = json!({
            "orderCode": i64::from(order_code),
            "amount": amount,
            "reference": "FT24266001",
            "transactionDateTime": "2024-09-22 10:00:00",
        }) else {
            unreachable!()
        };
        let signature =
            gateway::sign(&data, &SecretString::from("checksum")).unwrap();
        SettleGatewayPayment {
            webhook: gateway::Webhook { data, signature },
        }
    }

    async fn linked(svc: &Service<Memory, Outbox>, amount: i64) -> Payment {
        let payment = unpaid(svc.database(), amount).await;
        svc.execute(CreatePaymentLink {
            payment_id: payment.id,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn settles_once() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = linked(&svc, 800_000).await;
        let code = payment.order_code.unwrap();

        let paid = svc.execute(webhook(code, 800_000)).await.unwrap();

        assert_eq!(paid.status, payment::Status::Paid);
        assert_eq!(paid.reference.unwrap().to_string(), "FT24266001");
        assert_eq!(paid.link_expires_at, None);
        let paid_at = paid.paid_at;

        let again = svc.execute(webhook(code, 800_000)).await.unwrap();
        assert_eq!(again.paid_at, paid_at);
        let stored = spec::select::<Payment, _>(&db, payment.id).await.unwrap();
        assert_eq!(stored.status, payment::Status::Paid);
    }

    #[tokio::test]
    async fn refuses_amount_mismatch_when_strict() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let payment = linked(&svc, 800_000).await;

        let err = svc
            .execute(webhook(payment.order_code.unwrap(), 1_000))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AmountMismatch { .. }));
        let stored = spec::select::<Payment, _>(&db, payment.id).await.unwrap();
        assert_eq!(stored.status, payment::Status::AwaitingGateway);
    }

    #[tokio::test]
    async fn settles_amount_mismatch_when_lenient() {
        let mut svc = Service::spec(Memory::new());
        svc.config.payment_gateway.strict_amount_check = false;
        let payment = linked(&svc, 800_000).await;

        let paid = svc
            .execute(webhook(payment.order_code.unwrap(), 1_000))
            .await
            .unwrap();

        assert_eq!(paid.status, payment::Status::Paid);
    }

    #[tokio::test]
    async fn refuses_forged_signature() {
        let svc = Service::spec(Memory::new());
        let payment = linked(&svc, 800_000).await;
        let mut cmd = webhook(payment.order_code.unwrap(), 800_000);
        cmd.webhook.signature = "00".repeat(32);

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Verification(
                gateway::VerificationError::SignatureMismatch
            ),
        ));
    }

    #[tokio::test]
    async fn refuses_unknown_order() {
        let svc = Service::spec(Memory::new());

        let err = svc
            .execute(webhook(payment::OrderCode::from(42), 800_000))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UnknownOrder(_)));
    }
}
