//! Payment gateway webhook handler.

use axum::{extract::rejection::JsonRejection, Extension, Json};
use serde::Serialize;
use service::{
    command::{settle_gateway_payment, SettleGatewayPayment},
    domain::payment::gateway,
    Command as _,
};
use tracing as log;

use crate::{define_error, AsError, Error, Service};

/// Response acknowledging a settled webhook.
#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    /// ID of the settled payment.
    pub payment_id: String,

    /// Status of the payment after settlement.
    pub status: String,
}

/// Handles a [`gateway::Webhook`] reporting a settled payment.
///
/// # Errors
///
/// If the payload is malformed, or the [`SettleGatewayPayment`] command
/// fails.
pub async fn payment_webhook(
    Extension(service): Extension<Service>,
    payload: Result<Json<gateway::Webhook>, JsonRejection>,
) -> Result<Json<Acknowledgement>, Error> {
    let Json(webhook) = payload.map_err(AsError::into_error)?;

    let payment = service
        .execute(SettleGatewayPayment { webhook })
        .await
        .map_err(|e| {
            log::warn!("payment webhook is refused: {e}");
            e.into_error()
        })?;

    Ok(Json(Acknowledgement {
        payment_id: payment.id.to_string(),
        status: payment.status.to_string(),
    }))
}

define_error! {
    enum WebhookError {
        #[code = "INVALID_SIGNATURE"]
        #[status = UNAUTHORIZED]
        #[message = "Webhook signature is invalid"]
        InvalidSignature,

        #[code = "MALFORMED_PAYLOAD"]
        #[status = BAD_REQUEST]
        #[message = "Webhook payload misses required fields"]
        MalformedPayload,

        #[code = "UNKNOWN_ORDER"]
        #[status = NOT_FOUND]
        #[message = "No payment has the reported order code"]
        UnknownOrder,

        #[code = "AMOUNT_MISMATCH"]
        #[status = CONFLICT]
        #[message = "Paid amount differs from the owed one"]
        AmountMismatch,
    }
}

impl AsError for settle_gateway_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use gateway::VerificationError as V;

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Verification(V::InvalidKey) => None,
            Self::Verification(V::SignatureMismatch) => {
                Some(WebhookError::InvalidSignature.into())
            }
            Self::Verification(V::MissingField(_)) => {
                Some(WebhookError::MalformedPayload.into())
            }
            Self::UnknownOrder(_) => Some(WebhookError::UnknownOrder.into()),
            Self::AmountMismatch { .. } => {
                Some(WebhookError::AmountMismatch.into())
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use service::{
        command::settle_gateway_payment::ExecutionError,
        domain::payment::{gateway::VerificationError, OrderCode},
    };

    use crate::AsError as _;

    #[test]
    fn maps_settlement_errors() {
        let cases = [
            (
                ExecutionError::Verification(
                    VerificationError::SignatureMismatch,
                ),
                http::StatusCode::UNAUTHORIZED,
            ),
            (
                ExecutionError::Verification(VerificationError::MissingField(
                    "amount",
                )),
                http::StatusCode::BAD_REQUEST,
            ),
            (
                ExecutionError::UnknownOrder(OrderCode::from(42)),
                http::StatusCode::NOT_FOUND,
            ),
            (
                ExecutionError::Verification(VerificationError::InvalidKey),
                http::StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.as_error().status_code, status, "{err}");
        }
    }
}
