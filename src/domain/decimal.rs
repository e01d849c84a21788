//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Every amount, rate, and weight in the engine is a `Decimal`, so waterfall
//! splits can be made exact by construction instead of by tolerance.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Fixed-point decimal for money, rates, and weights.
///
/// Serializes to a JSON number (not a string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Convert a float, rejecting NaN and infinities.
    pub fn try_from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        RustDecimal::try_from(value).ok().map(Decimal)
    }

    /// Format without exponent notation or trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    pub fn min(self, other: Decimal) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }

    pub fn max(self, other: Decimal) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    /// Clamp negative values to zero.
    pub fn floor_zero(self) -> Self {
        self.max(Decimal::zero())
    }

    /// `self^exp` by repeated multiplication.
    pub fn powu(self, exp: u32) -> Self {
        let mut acc = Decimal::one();
        for _ in 0..exp {
            acc = acc * self;
        }
        acc
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Option<Self> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    /// `self^exp`, or `None` once the product leaves the representable range.
    pub fn checked_powu(self, exp: u32) -> Option<Self> {
        (0..exp).try_fold(Decimal::one(), |acc, _| acc.checked_mul(self))
    }

    /// `self * num / den`, or zero when `den` is zero.
    ///
    /// Divides first when the full product would overflow, trading the last
    /// digits of precision for range.
    pub fn mul_div(self, num: Decimal, den: Decimal) -> Self {
        if den.is_zero() {
            return Decimal::zero();
        }
        self.0
            .checked_mul(num.0)
            .and_then(|product| product.checked_div(den.0))
            .map(Decimal)
            .unwrap_or_else(|| self * (num / den))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, x| acc + *x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_ops_report_overflow() {
        let big = d("50000000000000000000000000000");
        assert_eq!(big.checked_add(big), None);
        assert_eq!(big.checked_mul(d("2")), None);
        assert_eq!(d("1.5").checked_add(d("2")), Some(d("3.5")));
        assert_eq!(d("10").checked_powu(3), Some(d("1000")));
        assert_eq!(d("10").checked_powu(39), None);
        assert_eq!(d("1.05").checked_powu(0), Some(Decimal::one()));
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_canonical_no_exponent() {
        let formatted = d("123.4500").to_canonical_string();
        assert!(!formatted.contains('e'));
        assert_eq!(formatted, "123.45");
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = d("10.5");
        let b = d("2.5");
        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
    }

    #[test]
    fn test_decimal_json_serialization() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");
    }

    #[test]
    fn test_try_from_f64_rejects_non_finite() {
        assert!(Decimal::try_from_f64(f64::NAN).is_none());
        assert!(Decimal::try_from_f64(f64::INFINITY).is_none());
        assert!(Decimal::try_from_f64(f64::NEG_INFINITY).is_none());
        assert_eq!(Decimal::try_from_f64(2.5), Some(d("2.5")));
    }

    #[test]
    fn test_powu() {
        assert_eq!(d("1.1").powu(0), Decimal::one());
        assert_eq!(d("1.1").powu(2), d("1.21"));
        assert_eq!(d("2").powu(10), d("1024"));
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert_eq!(d("5").mul_div(d("3"), Decimal::zero()), Decimal::zero());
        assert_eq!(d("400").mul_div(d("1000"), d("4000")), d("100"));
        // Product exceeds the mantissa; the quotient does not.
        let big = d("60000000000000000000");
        assert_eq!(
            big.mul_div(big, d("120000000000000000000")),
            d("30000000000000000000")
        );
    }

    #[test]
    fn test_min_max_floor() {
        assert_eq!(d("3").min(d("2")), d("2"));
        assert_eq!(d("3").max(d("2")), d("3"));
        assert_eq!(d("-1").floor_zero(), Decimal::zero());
        assert!(d("-0.1").is_negative());
        assert!(!Decimal::zero().is_positive());
    }

    #[test]
    fn test_sum() {
        let values = vec![d("1.5"), d("2.5"), d("-1")];
        let total: Decimal = values.iter().sum();
        assert_eq!(total, d("3"));
    }
}
