//! [`Money`]-related definitions.

use std::{fmt, ops, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal, RoundingStrategy};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Creates a new [`Money`] amount in [`Currency::Vnd`].
    #[must_use]
    pub const fn vnd(amount: Decimal) -> Self {
        Self {
            amount,
            currency: Currency::Vnd,
        }
    }

    /// Creates a zero [`Money`] amount in the provided [`Currency`].
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Rounds this [`Money`] to the nearest whole currency unit (half away
    /// from zero).
    #[must_use]
    pub fn round(self) -> Self {
        Self {
            amount: round(self.amount),
            currency: self.currency,
        }
    }

    /// Indicates whether this [`Money`] amount is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Adds the `other` [`Money`] to this one.
    ///
    /// [`None`] is returned if the [`Currency`]s differ or the sum overflows.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        (self.currency == other.currency).then_some(())?;
        Some(Self {
            amount: self.amount.checked_add(other.amount)?,
            currency: self.currency,
        })
    }
}

/// Rounds the provided `amount` to the nearest integer, half away from zero.
#[must_use]
pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

impl ops::Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self {
            amount: self.amount * rhs,
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if let Some(int) = amount.is_integer().then(|| amount.to_i128()).flatten()
        {
            write!(f, "{int}{currency}")
        } else {
            write!(f, "{}{currency}", amount.normalize())
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 || !s.is_char_boundary(s.len() - 3) {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "Vietnamese Dong."]
        Vnd = "VND",

        #[doc = "US Dollar."]
        Usd = "USD",
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

    use super::Money;

    impl Serialize for Money {
        fn serialize<S: serde::Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Money {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Self::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{round, Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("1500000VND").unwrap(),
            Money {
                amount: decimal("1500000"),
                currency: Currency::Vnd,
            },
        );

        assert_eq!(
            Money::from_str("123.45USD").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("123.45EUR").is_err());
        assert!(Money::from_str("123.45vnd").is_err());

        assert!(Money::from_str("123.00VND").is_ok());
        assert!(Money::from_str("123VND").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(Money::vnd(decimal("2500000")).to_string(), "2500000VND");
        assert_eq!(Money::vnd(decimal("2500000.00")).to_string(), "2500000VND");
        assert_eq!(
            Money {
                amount: decimal("123.40"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123.4USD",
        );
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round(decimal("1250.5")), decimal("1251"));
        assert_eq!(round(decimal("1250.49")), decimal("1250"));
        assert_eq!(round(decimal("-0.5")), decimal("-1"));
        assert_eq!(
            Money::vnd(decimal("333333.3333")).round(),
            Money::vnd(decimal("333333")),
        );
    }

    #[test]
    fn adds_same_currency_only() {
        let vnd = Money::vnd(decimal("1000"));
        assert_eq!(vnd.checked_add(vnd), Some(Money::vnd(decimal("2000"))));
        assert_eq!(vnd.checked_add(Money::zero(Currency::Usd)), None);
        assert_eq!(vnd * decimal("0.5"), Money::vnd(decimal("500.0")));
    }
}
