use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const MARKET_CURRENCY_CODE: &str = "USD";
pub const MARKET_CURRENCY_CODE_LOWER: &str = "usd";

//--------------------------------------       Money         ---------------------------------------------------------
/// An exact monetary amount, stored as integer hundredths of a major currency unit (cents for USD).
///
/// Storing hundredths keeps arithmetic exact through order totals, bid comparisons and stock
/// calculations. Conversion from a gateway's minor-unit amounts happens at the gateway boundary.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats_as_dollars() {
        assert_eq!(Money::from_cents(8500).to_string(), "$85.00");
        assert_eq!(Money::from_cents(99).to_string(), "$0.99");
        assert_eq!(Money::from_cents(-50).to_string(), "-$0.50");
        assert_eq!(Money::default().to_string(), "$0.00");
    }

    #[test]
    fn arithmetic_is_exact() {
        let a = Money::from_dollars(85);
        let b = Money::from_cents(1);
        assert_eq!((a - b).value(), 8499);
        assert_eq!((a + b).value(), 8501);
        assert_eq!((b * 3).value(), 3);
        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.value(), 8502);
    }
}
