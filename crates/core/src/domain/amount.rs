// Exact monetary amount (minor units, never floating point)

use super::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MINOR_DIGITS: usize = 2;
const MINOR_PER_MAJOR: i64 = 100;

/// Refund amount stored as integer cents.
///
/// Parsed from and rendered to a decimal string (`"1234.50"`), so the value
/// round-trips through the cache and the wire without precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    minor_units: i64,
}

impl Amount {
    pub fn from_minor_units(minor_units: i64) -> Self {
        Self { minor_units }
    }

    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty()
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > MINOR_DIGITS
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction_value: i64 = if fraction.is_empty() {
            0
        } else {
            // "5" means 50 cents, "05" means 5 cents
            let padded = format!("{:0<width$}", fraction, width = MINOR_DIGITS);
            padded.parse().map_err(|_| invalid())?
        };

        let minor = whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|v| v.checked_add(fraction_value))
            .ok_or_else(invalid)?;

        Ok(Self {
            minor_units: if negative { -minor } else { minor },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / MINOR_PER_MAJOR as u64,
            abs % MINOR_PER_MAJOR as u64
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
