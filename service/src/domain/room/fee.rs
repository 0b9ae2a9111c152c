//! Prorated [`Room`] rent calculation.

use common::{money, Date, Money, Month};
use rust_decimal::Decimal;

#[cfg(doc)]
use crate::domain::Room;

/// Day of month starting from which only a half of the monthly rent is
/// charged.
const HALF_MONTH_DAY: u8 = 15;

/// Rent owed for a [`Room`] over some period.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Fee {
    /// Total amount, rounded to the whole currency unit.
    pub amount: Money,

    /// Per-[`Month`] breakdown of the [`Fee`].
    pub months: Vec<MonthlyCharge>,
}

/// Rent charged for a single [`Month`] of a [`Fee`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MonthlyCharge {
    /// [`Month`] being charged.
    pub month: Month,

    /// Day of the [`Month`] the charge starts from.
    pub day: u8,

    /// Coefficient applied to the monthly rent.
    pub coefficient: Decimal,

    /// Charged amount, rounded to the whole currency unit.
    pub amount: Money,
}

/// Calculates the [`Fee`] for renting a [`Room`] with the provided
/// `monthly_rent` from `start` till `end` (inclusive).
///
/// Every visited [`Month`] is charged in full, except the first one, which is
/// charged by a half if the `start` day is on or after the 15th. Monthly
/// amounts are summed before rounding the total.
#[must_use]
pub fn calculate(monthly_rent: Money, start: Date, end: Date) -> Fee {
    let mut months = Vec::new();
    let mut total = Decimal::ZERO;

    let mut cursor = start;
    while cursor <= end {
        let coefficient = coefficient(cursor.day());
        let amount = monthly_rent * coefficient;
        total += amount.amount;
        months.push(MonthlyCharge {
            month: Month::of(cursor),
            day: cursor.day(),
            coefficient,
            amount: amount.round(),
        });
        cursor = Month::of(cursor).next().first_day();
    }

    Fee {
        amount: Money {
            amount: money::round(total),
            currency: monthly_rent.currency,
        },
        months,
    }
}

/// Returns the rent coefficient for a month charged from the provided `day`.
fn coefficient(day: u8) -> Decimal {
    if day >= HALF_MONTH_DAY {
        Decimal::new(5, 1)
    } else {
        Decimal::ONE
    }
}

#[cfg(test)]
mod spec {
    use common::{Date, Money};
    use rust_decimal::Decimal;

    use super::calculate;

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn vnd(amount: i64) -> Money {
        Money::vnd(Decimal::from(amount))
    }

    #[test]
    fn charges_full_quarter() {
        let fee =
            calculate(vnd(1_000_000), date("2025-01-01"), date("2025-03-31"));
        assert_eq!(fee.amount, vnd(3_000_000));
        assert_eq!(fee.months.len(), 3);
        assert_eq!(fee.months[0].month.to_string(), "01/2025");
        assert_eq!(fee.months[2].month.to_string(), "03/2025");
    }

    #[test]
    fn halves_entry_month_from_15th() {
        let fee =
            calculate(vnd(1_000_000), date("2025-01-15"), date("2025-03-31"));
        assert_eq!(fee.amount, vnd(2_500_000));

        let first = fee.months[0];
        assert_eq!(first.day, 15);
        assert_eq!(first.coefficient, Decimal::new(5, 1));
        assert_eq!(first.amount, vnd(500_000));

        for m in &fee.months[1..] {
            assert_eq!(m.day, 1);
            assert_eq!(m.coefficient, Decimal::ONE);
        }
    }

    #[test]
    fn charges_full_entry_month_before_15th() {
        let fee = calculate(vnd(1000), date("2025-07-14"), date("2025-09-30"));
        assert_eq!(fee.amount, vnd(3000));
    }

    #[test]
    fn never_halves_last_month() {
        let fee =
            calculate(vnd(1_000_000), date("2025-01-01"), date("2025-02-10"));
        assert_eq!(fee.amount, vnd(2_000_000));
    }

    #[test]
    fn sums_before_rounding() {
        let fee = calculate(
            Money::vnd("1000.5".parse().unwrap()),
            date("2025-01-20"),
            date("2025-02-28"),
        );
        // 500.25 + 1000.5 = 1500.75
        assert_eq!(fee.amount, vnd(1501));
        assert_eq!(fee.months[0].amount, vnd(500));
        assert_eq!(fee.months[1].amount, vnd(1001));
    }

    #[test]
    fn empty_when_start_is_after_end() {
        let fee =
            calculate(vnd(1_000_000), date("2025-04-01"), date("2025-03-31"));
        assert_eq!(fee.amount, vnd(0));
        assert!(fee.months.is_empty());
    }

    #[test]
    fn wraps_year_boundary() {
        let fee =
            calculate(vnd(1_000_000), date("2024-11-20"), date("2025-03-31"));
        assert_eq!(fee.amount, vnd(4_500_000));
        assert_eq!(fee.months[2].month.to_string(), "01/2025");
    }
}
