// kaon-core/src/amount.rs

use crate::codec::encode_big;
use crate::{CoreError, CoreResult};
use num_bigint::BigUint;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// 10^18, the wei scale
pub fn wei_per_kaon() -> Decimal {
    Decimal::from(1_000_000_000_000_000_000u64)
}

/// A KAON value held at 10^18 scale, so it can be printed as wei.
///
/// Values coming off the wire are plain KAON decimals and get scaled on the
/// way in; every sum and difference stays in the scaled domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Scale a KAON decimal to wei
    pub fn from_kaon(value: Decimal) -> CoreResult<Self> {
        value
            .checked_mul(wei_per_kaon())
            .map(Self)
            .ok_or_else(|| CoreError::AmountOverflow(value.to_string()))
    }

    pub fn from_wei(value: Decimal) -> Self {
        Self(value)
    }

    /// Parse a wei quantity such as `0x16345785d8a0000`
    pub fn from_wei_hex(s: &str) -> CoreResult<Self> {
        let wei = crate::codec::decode_big(s)?;
        Decimal::from_str(&wei.to_string())
            .map(Self)
            .map_err(|_| CoreError::AmountOverflow(s.to_string()))
    }

    pub fn wei(&self) -> Decimal {
        self.0
    }

    pub fn to_kaon(&self) -> Decimal {
        (self.0 / wei_per_kaon()).normalize()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Integer wei, truncated toward zero. Negative amounts report their magnitude.
    pub fn to_biguint(&self) -> BigUint {
        let truncated = self.0.trunc().abs();
        BigUint::from_str(&truncated.normalize().to_string()).unwrap_or_default()
    }

    /// Ethereum quantity hex of the wei value
    pub fn to_hex(&self) -> String {
        encode_big(&self.to_biguint())
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, other: Amount) -> Amount {
        Amount(self.0 - other.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_kaon())
    }
}

/// Parse a KAON decimal from its textual form, accepting exponents
pub fn parse_decimal(s: &str) -> CoreResult<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| CoreError::InvalidAmount(s.to_string()))
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_kaon().to_f64() {
            Some(value) => serializer.serialize_f64(value),
            None => Err(serde::ser::Error::custom("amount out of range")),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a KAON decimal amount")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Amount::from_kaon(Decimal::from(v)).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Amount::from_kaon(Decimal::from(v)).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                // Display for f64 is the shortest round-trip form, never exponent
                let value = parse_decimal(&v.to_string()).map_err(E::custom)?;
                Amount::from_kaon(value).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                let value = parse_decimal(v).map_err(E::custom)?;
                Amount::from_kaon(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
