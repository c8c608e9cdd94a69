use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A yuan amount. Serialized as a plain JSON number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    pub fn from_fen(fen: i64) -> Self {
        Money(Decimal::new(fen, 2))
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Split the amount evenly over `parts` (clamped to at least 1), rounded to the fen.
    pub fn spread_over(self, parts: i64) -> Money {
        Money((self.0 / Decimal::from(parts.max(1))).round_dp(2))
    }

    /// Parse the leading number of an OCR capture the way a lenient float parser
    /// would: digits with at most one decimal point, ignoring anything after.
    /// `"199."` is 199, `"1.2.3"` is 1.2, and a capture without digits is `None`.
    pub fn parse_amount(s: &str) -> Option<Money> {
        let mut seen_dot = false;
        let mut end = 0;
        for (i, c) in s.char_indices() {
            match c {
                '0'..='9' => end = i + 1,
                '.' if !seen_dot => {
                    seen_dot = true;
                    end = i + 1;
                }
                _ => break,
            }
        }
        let prefix = s[..end].trim_end_matches('.');
        if !prefix.bytes().any(|b| b.is_ascii_digit()) {
            return None;
        }
        let normalized = if prefix.starts_with('.') {
            format!("0{prefix}")
        } else {
            prefix.to_string()
        };
        Decimal::from_str(&normalized).ok().map(Money)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "¥{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}
