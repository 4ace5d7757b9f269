//! Unsigned 18-decimal fixed-point arithmetic.
//!
//! Every replica must reproduce the same digits, so there is no floating point
//! anywhere in the pool accounting. `Dec` keeps its value as an integer count of
//! 10^-18 units; products and quotients are widened to 256 bits before being
//! chopped back down, either by truncation or by banker's rounding.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places carried by [`Dec`].
pub const PRECISION: usize = 18;

const ONE_RAW: u128 = 1_000_000_000_000_000_000;
const HALF_RAW: u128 = ONE_RAW / 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Addition overflowed")]
    AdditionOverflow,
    #[error("Subtraction underflowed")]
    SubtractionUnderflow,
    #[error("Multiplication overflowed")]
    MultiplicationOverflow,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid decimal string: {0}")]
    Parse(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(u128);

impl Dec {
    pub const ZERO: Dec = Dec(0);
    pub const ONE: Dec = Dec(ONE_RAW);

    pub const fn from_raw(raw: u128) -> Self {
        Dec(raw)
    }

    pub const fn raw(self) -> u128 {
        self.0
    }

    pub fn from_int(value: u128) -> Result<Self, MathError> {
        value
            .checked_mul(ONE_RAW)
            .map(Dec)
            .ok_or(MathError::MultiplicationOverflow)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Dec) -> Result<Dec, MathError> {
        self.0
            .checked_add(other.0)
            .map(Dec)
            .ok_or(MathError::AdditionOverflow)
    }

    pub fn checked_sub(self, other: Dec) -> Result<Dec, MathError> {
        self.0
            .checked_sub(other.0)
            .map(Dec)
            .ok_or(MathError::SubtractionUnderflow)
    }

    pub fn saturating_sub(self, other: Dec) -> Dec {
        Dec(self.0.saturating_sub(other.0))
    }

    /// Product rounded half-to-even at the 18th decimal.
    pub fn mul(self, other: Dec) -> Result<Dec, MathError> {
        let product = U256::from(self.0) * U256::from(other.0);
        narrow(chop_and_round(product))
    }

    /// Product with the digits past the 18th decimal dropped.
    pub fn mul_truncate(self, other: Dec) -> Result<Dec, MathError> {
        let product = U256::from(self.0) * U256::from(other.0);
        narrow(product / U256::from(ONE_RAW))
    }

    pub fn mul_int(self, value: u128) -> Result<Dec, MathError> {
        self.0
            .checked_mul(value)
            .map(Dec)
            .ok_or(MathError::MultiplicationOverflow)
    }

    /// Quotient evaluated at 36 decimals, then rounded half-to-even to 18.
    pub fn quo(self, other: Dec) -> Result<Dec, MathError> {
        if other.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let one = U256::from(ONE_RAW);
        let widened = U256::from(self.0) * one * one;
        narrow(chop_and_round(widened / U256::from(other.0)))
    }

    /// Quotient with the digits past the 18th decimal dropped.
    pub fn quo_truncate(self, other: Dec) -> Result<Dec, MathError> {
        if other.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let widened = U256::from(self.0) * U256::from(ONE_RAW);
        narrow(widened / U256::from(other.0))
    }

    pub fn quo_int(self, value: u128) -> Result<Dec, MathError> {
        if value == 0 {
            return Err(MathError::DivisionByZero);
        }
        Ok(Dec(self.0 / value))
    }

    pub fn truncate_int(self) -> u128 {
        self.0 / ONE_RAW
    }

    pub fn truncate_dec(self) -> Dec {
        Dec(self.0 - self.0 % ONE_RAW)
    }
}

fn chop_and_round(value: U256) -> U256 {
    let one = U256::from(ONE_RAW);
    let half = U256::from(HALF_RAW);
    let quo = value / one;
    let rem = value % one;
    if rem < half {
        quo
    } else if rem > half {
        quo + U256::one()
    } else if quo.low_u64() & 1 == 0 {
        quo
    } else {
        quo + U256::one()
    }
}

fn narrow(value: U256) -> Result<Dec, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::MultiplicationOverflow);
    }
    Ok(Dec(value.low_u128()))
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:018}", self.0 / ONE_RAW, self.0 % ONE_RAW)
    }
}

impl FromStr for Dec {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MathError::Parse(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty()
            || frac_part.len() > PRECISION
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let int_value: u128 = int_part.parse().map_err(|_| invalid())?;
        let frac_value: u128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = PRECISION);
            padded.parse().map_err(|_| invalid())?
        };
        Dec::from_int(int_value)?.checked_add(Dec(frac_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn d(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test]
    fn display_always_carries_eighteen_places() {
        assert_eq!(Dec::ONE.to_string(), "1.000000000000000000");
        assert_eq!(d("0.000000000001").to_string(), "0.000000000001000000");
        assert_eq!(d("3333333.333333333333").to_string(), "3333333.333333333333000000");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!("".parse::<Dec>().is_err());
        assert!(".5".parse::<Dec>().is_err());
        assert!("1.0000000000000000001".parse::<Dec>().is_err());
        assert!("-1".parse::<Dec>().is_err());
    }

    #[test_case("10", "3", "3.333333333333333333" ; "repeating digits truncate")]
    #[test_case("10000000", "15000001", "0.666666622222225185" ; "large denominator")]
    #[test_case("1", "4", "0.250000000000000000" ; "exact quotient")]
    fn quo_truncate_drops_excess_digits(a: &str, b: &str, expected: &str) {
        assert_eq!(d(a).quo_truncate(d(b)).unwrap(), d(expected));
    }

    #[test]
    fn quo_rounds_half_to_even() {
        assert_eq!(d("2").quo(d("3")).unwrap(), d("0.666666666666666667"));
        assert_eq!(d("1").quo(d("3")).unwrap(), d("0.333333333333333333"));
    }

    #[test]
    fn mul_rounds_while_mul_truncate_drops() {
        let x = d("0.000000000000000005");
        let half = d("0.5");
        // 2.5e-18 rounds to the even neighbour 2e-18
        assert_eq!(x.mul(half).unwrap(), d("0.000000000000000002"));
        assert_eq!(x.mul_truncate(half).unwrap(), d("0.000000000000000002"));
        let y = d("0.000000000000000007");
        assert_eq!(y.mul(half).unwrap(), d("0.000000000000000004"));
        assert_eq!(y.mul_truncate(half).unwrap(), d("0.000000000000000003"));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(Dec::ONE.quo(Dec::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(Dec::ONE.quo_truncate(Dec::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(Dec::ONE.quo_int(0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn truncation_helpers() {
        let x = d("12499.999999999999999999");
        assert_eq!(x.truncate_int(), 12499);
        assert_eq!(x.truncate_dec(), d("12499"));
        assert!(Dec::ZERO.checked_sub(Dec::ONE).is_err());
    }
}
