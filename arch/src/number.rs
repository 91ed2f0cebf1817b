//! Arbitrary-precision integers with a saturating "infinity" sentinel.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::ops::{Add, BitAnd, BitOr, BitXor, Mul, Neg, Sub};
use std::str::FromStr;

use num_bigint::{BigInt, ParseBigIntError};
use num_traits::Signed;
use thiserror::Error;

/// Bit-width past which a result saturates to [`Number::inf`].
///
/// Mirrors the word-budget closure required by the data model: every
/// arithmetic result either fits within this budget or collapses to the
/// absorbing `INF` value instead of growing unboundedly.
const MAX_BITS: u64 = 1 << 20;

/// An arbitrary-precision signed integer, closed under arithmetic.
///
/// Every operation either returns a finite value or [`Number::inf`], the
/// distinguished sentinel standing in for overflow or an undefined result.
/// `Inf` is absorbing: it propagates through every binary operation and
/// compares greater than any finite value.
#[derive(Clone, Debug)]
pub enum Number {
    /// A finite value.
    Finite(BigInt),
    /// Overflow or an undefined result.
    Inf,
}

/// An error constructing or converting a [`Number`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// Could not parse the input as an integer.
    #[error("invalid integer literal: {0}")]
    Parse(String),
    /// Value does not fit in the requested native type.
    #[error("value does not fit in the requested type")]
    Range,
    /// Value is `INF`, which has no finite representation.
    #[error("value is infinite")]
    Infinite,
}

impl Number {
    /// The additive identity.
    #[must_use]
    pub fn zero() -> Self {
        Self::Finite(BigInt::from(0))
    }

    /// The multiplicative identity.
    #[must_use]
    pub fn one() -> Self {
        Self::Finite(BigInt::from(1))
    }

    /// Two.
    #[must_use]
    pub fn two() -> Self {
        Self::Finite(BigInt::from(2))
    }

    /// Negative one.
    #[must_use]
    pub fn minus_one() -> Self {
        Self::Finite(BigInt::from(-1))
    }

    /// The `INF` sentinel.
    #[must_use]
    pub fn inf() -> Self {
        Self::Inf
    }

    /// Whether this value is `INF`.
    #[must_use]
    pub fn is_inf(&self) -> bool {
        matches!(self, Self::Inf)
    }

    /// Borrows the underlying big integer, or `None` if this is `INF`.
    #[must_use]
    pub fn finite(&self) -> Option<&BigInt> {
        match self {
            Self::Finite(v) => Some(v),
            Self::Inf => None,
        }
    }

    /// Constructs a `Number` from a [`BigInt`], saturating to `INF` if the
    /// magnitude exceeds the implementation's word budget.
    #[must_use]
    pub fn from_bigint(value: BigInt) -> Self {
        if value.bits() > MAX_BITS {
            Self::Inf
        } else {
            Self::Finite(value)
        }
    }

    /// Converts to an `i64`, e.g. for use as a memory index or loop bound.
    ///
    /// # Errors
    ///
    /// Errors if the value is `INF` or does not fit in an `i64`.
    pub fn to_i64(&self) -> Result<i64, Error> {
        match self {
            Self::Finite(v) => i64::try_from(v).map_err(|_| Error::Range),
            Self::Inf => Err(Error::Infinite),
        }
    }

    /// Whether a finite value is odd.
    ///
    /// # Panics
    ///
    /// Panics if called on `INF`; only defined on finite values.
    #[must_use]
    pub fn odd(&self) -> bool {
        match self {
            Self::Finite(v) => v.is_odd(),
            Self::Inf => panic!("odd() is undefined on INF"),
        }
    }

    /// Whether the value is strictly negative (`INF` is never negative).
    #[must_use]
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::Finite(v) if v.is_negative())
    }

    /// Absolute value; `INF` maps to `INF`.
    #[must_use]
    pub fn abs(&self) -> Self {
        match self {
            Self::Finite(v) => Self::Finite(v.abs()),
            Self::Inf => Self::Inf,
        }
    }

    /// Negation; `INF` maps to `INF`.
    #[must_use]
    pub fn negate(&self) -> Self {
        -self.clone()
    }
}

trait IsOdd {
    fn is_odd(&self) -> bool;
}
impl IsOdd for BigInt {
    fn is_odd(&self) -> bool {
        use num_integer::Integer;
        !self.is_even()
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Finite(BigInt::from(value))
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Self::Finite(BigInt::from(value))
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Self::Finite(BigInt::from(value))
    }
}

impl FromStr for Number {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("inf") {
            return Ok(Self::Inf);
        }
        s.parse::<BigInt>()
            .map(Self::from_bigint)
            .map_err(|err: ParseBigIntError| Error::Parse(err.to_string()))
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(v) => write!(f, "{v}"),
            Self::Inf => write!(f, "inf"),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => a == b,
            (Self::Inf, Self::Inf) => true,
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Finite(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Self::Inf => 1u8.hash(state),
        }
    }
}

/// Total order over `Number`: `INF` compares greater than every finite
/// value and is equal only to itself.
impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => a.cmp(b),
            (Self::Inf, Self::Inf) => Ordering::Equal,
            (Self::Inf, Self::Finite(_)) => Ordering::Greater,
            (Self::Finite(_), Self::Inf) => Ordering::Less,
        }
    }
}

macro_rules! closed_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for &Number {
            type Output = Number;

            fn $method(self, rhs: Self) -> Number {
                match (self, rhs) {
                    (Number::Finite(a), Number::Finite(b)) => Number::from_bigint(a $op b),
                    _ => Number::Inf,
                }
            }
        }

        impl $trait for Number {
            type Output = Number;

            fn $method(self, rhs: Self) -> Number {
                (&self).$method(&rhs)
            }
        }
    };
}

closed_binop!(Add, add, +);
closed_binop!(Sub, sub, -);
closed_binop!(Mul, mul, *);
closed_binop!(BitAnd, bitand, &);
closed_binop!(BitOr, bitor, |);
closed_binop!(BitXor, bitxor, ^);

impl Neg for Number {
    type Output = Number;

    fn neg(self) -> Number {
        match self {
            Number::Finite(v) => Number::Finite(-v),
            Number::Inf => Number::Inf,
        }
    }
}

impl Neg for &Number {
    type Output = Number;

    fn neg(self) -> Number {
        -self.clone()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Number {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inf_absorbs() {
        assert_eq!(Number::inf() + Number::one(), Number::inf());
        assert_eq!(Number::one() * Number::inf(), Number::inf());
        assert_eq!(Number::inf() - Number::inf(), Number::inf());
    }

    #[test]
    fn ordering_places_inf_last() {
        assert!(Number::from(1_000_000_i64) < Number::inf());
        assert!(Number::inf() > Number::zero());
        assert_eq!(Number::inf().cmp(&Number::inf()), Ordering::Equal);
    }

    #[test]
    fn parses_and_prints() {
        let n: Number = "-42".parse().unwrap();
        assert_eq!(n.to_string(), "-42");
        let inf: Number = "inf".parse().unwrap();
        assert!(inf.is_inf());
    }

    #[test]
    fn odd_on_finite_values() {
        assert!(Number::from(3_i64).odd());
        assert!(!Number::from(4_i64).odd());
        assert!(Number::from(-3_i64).odd());
    }

    #[test]
    fn saturates_past_word_budget() {
        let huge = Number::from_bigint(BigInt::from(1) << (MAX_BITS + 1));
        assert!(huge.is_inf());
    }

    #[test]
    fn commutative_add_mul() {
        let a = Number::from(7_i64);
        let b = Number::from(-3_i64);
        assert_eq!(a.clone() + b.clone(), b.clone() + a.clone());
        assert_eq!(a.clone() * b.clone(), b * a);
    }
}
