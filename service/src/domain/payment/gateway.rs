//! Payment gateway webhook definitions.

use common::Money;
use derive_more::{Display, Error};
use hmac::{Hmac, Mac as _};
use itertools::Itertools as _;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;

use super::{OrderCode, Reference};

type HmacSha256 = Hmac<Sha256>;

/// Webhook notification of the payment gateway.
#[derive(Clone, Debug, Deserialize)]
pub struct Webhook {
    /// Signed payload of this [`Webhook`].
    pub data: Map<String, Value>,

    /// Hex-encoded HMAC-SHA256 signature of the [`Webhook::data`].
    pub signature: String,
}

impl Webhook {
    /// Verifies the signature of this [`Webhook`] with the provided
    /// `checksum_key` and extracts its [`Settlement`].
    ///
    /// # Errors
    ///
    /// If the signature doesn't match, or the payload misses required fields.
    pub fn verify(
        &self,
        checksum_key: &SecretString,
    ) -> Result<Settlement, VerificationError> {
        let expected = hex::decode(self.signature.trim())
            .map_err(|_| VerificationError::SignatureMismatch)?;
        mac(&self.data, checksum_key)?
            .verify_slice(&expected)
            .map_err(|_| VerificationError::SignatureMismatch)?;

        let order_code = self
            .data
            .get("orderCode")
            .and_then(Value::as_i64)
            .map(OrderCode::from)
            .ok_or(VerificationError::MissingField("orderCode"))?;
        let amount = self
            .data
            .get("amount")
            .and_then(|v| match v {
                Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
                Value::String(s) => s.parse::<Decimal>().ok(),
                _ => None,
            })
            .map(Money::vnd)
            .ok_or(VerificationError::MissingField("amount"))?;
        let reference = self
            .data
            .get("reference")
            .and_then(Value::as_str)
            .and_then(Reference::new);

        Ok(Settlement {
            order_code,
            amount,
            reference,
        })
    }
}

/// Signs the provided webhook `data` with the `checksum_key`, returning the
/// hex-encoded signature.
///
/// # Errors
///
/// If the `checksum_key` cannot be used as an HMAC key.
pub fn sign(
    data: &Map<String, Value>,
    checksum_key: &SecretString,
) -> Result<String, VerificationError> {
    Ok(hex::encode(mac(data, checksum_key)?.finalize().into_bytes()))
}

/// Feeds the canonical form of the `data` into a new HMAC.
///
/// The canonical form is `key=value` pairs sorted by key and joined with `&`,
/// where `null` becomes an empty string and strings are taken verbatim.
fn mac(
    data: &Map<String, Value>,
    checksum_key: &SecretString,
) -> Result<HmacSha256, VerificationError> {
    let canonical = data
        .iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(k, v)| match v {
            Value::Null => format!("{k}="),
            Value::String(s) => format!("{k}={s}"),
            v => format!("{k}={v}"),
        })
        .join("&");

    let mut mac =
        HmacSha256::new_from_slice(checksum_key.expose_secret().as_bytes())
            .map_err(|_| VerificationError::InvalidKey)?;
    mac.update(canonical.as_bytes());
    Ok(mac)
}

/// Settlement reported by a verified [`Webhook`].
#[derive(Clone, Debug)]
pub struct Settlement {
    /// [`OrderCode`] of the settled payment.
    pub order_code: OrderCode,

    /// Paid amount.
    pub amount: Money,

    /// External [`Reference`] of the transaction, if any.
    pub reference: Option<Reference>,
}

/// Error of verifying a [`Webhook`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum VerificationError {
    /// Checksum key cannot be used.
    #[display("invalid checksum key")]
    InvalidKey,

    /// Signature doesn't match the payload.
    #[display("signature mismatch")]
    SignatureMismatch,

    /// Required field is missing in the payload.
    #[display("missing `{_0}` field")]
    MissingField(#[error(not(source))] &'static str),
}

#[cfg(test)]
mod spec {
    use secrecy::SecretString;
    use serde_json::{json, Value};

    use super::{sign, VerificationError, Webhook};

    fn key() -> SecretString {
        SecretString::from("checksum")
    }

    fn webhook(data: Value) -> Webhook {
        let Value::Object(data) = data else {
            unreachable!()
        };
        let signature = sign(&data, &key()).unwrap();
        Webhook { data, signature }
    }

    #[test]
    fn verifies_signed_payload() {
        let hook = webhook(json!({
            "orderCode": 12_000_123,
            "amount": 2_500_000,
            "reference": "FT123",
            "transactionDateTime": "2024-09-22 10:00:00",
            "description": null,
        }));

        let settlement = hook.verify(&key()).unwrap();

        assert_eq!(i64::from(settlement.order_code), 12_000_123);
        assert_eq!(settlement.amount.to_string(), "2500000VND");
        assert_eq!(settlement.reference.unwrap().to_string(), "FT123");
    }

    #[test]
    fn signs_sorted_pairs() {
        let Value::Object(a) = json!({"b": 1, "a": "x", "c": null}) else {
            unreachable!()
        };
        let Value::Object(b) = json!({"c": null, "a": "x", "b": 1}) else {
            unreachable!()
        };

        assert_eq!(sign(&a, &key()).unwrap(), sign(&b, &key()).unwrap());
        assert_eq!(sign(&a, &key()).unwrap().len(), 64);
    }

    #[test]
    fn rejects_tampered_payload() {
        let mut hook = webhook(json!({"orderCode": 1, "amount": 100}));
        hook.data.insert("amount".into(), json!(1));

        assert!(matches!(
            hook.verify(&key()),
            Err(VerificationError::SignatureMismatch),
        ));
    }

    #[test]
    fn rejects_foreign_key() {
        let hook = webhook(json!({"orderCode": 1, "amount": 100}));

        assert!(hook.verify(&SecretString::from("other")).is_err());
    }

    #[test]
    fn requires_order_code() {
        let hook = webhook(json!({"amount": 100}));

        assert!(matches!(
            hook.verify(&key()),
            Err(VerificationError::MissingField("orderCode")),
        ));
    }
}
