//! Byte sizes for cache limits: "10GB", "512 MiB", "1.5G" or plain integers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

const KIB: u64 = 1024;

/// Display suffix and accepted spellings, largest last
const UNITS: [(&str, u64, &[&str]); 5] = [
    ("B", 1, &["B"]),
    ("KB", KIB, &["K", "KB", "KIB"]),
    ("MB", KIB * KIB, &["M", "MB", "MIB"]),
    ("GB", KIB * KIB * KIB, &["G", "GB", "GIB"]),
    ("TB", KIB * KIB * KIB * KIB, &["T", "TB", "TIB"]),
];

/// Fraction digits kept when parsing "1.5GB"
const MAX_FRACTION_DIGITS: usize = 3;

/// Size in bytes; `ByteSize(0)` disables whatever limit it configures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Largest unit that fits, with one truncated decimal when it is non-zero
    pub fn to_human_readable(&self) -> String {
        let (suffix, divisor, _) = UNITS
            .iter()
            .rev()
            .find(|(_, divisor, _)| self.0 >= *divisor)
            .copied()
            .unwrap_or(UNITS[0]);

        let whole = self.0 / divisor;
        let tenths = (self.0 % divisor) * 10 / divisor;
        if tenths == 0 {
            format!("{whole}{suffix}")
        } else {
            format!("{whole}.{tenths}{suffix}")
        }
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    UNITS
        .iter()
        .find(|(_, _, spellings)| spellings.contains(&unit))
        .map(|(_, multiplier, _)| *multiplier)
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let split = normalized
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(normalized.len());
        let (number, unit) = normalized.split_at(split);

        if number.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let unit = unit.trim();
        let multiplier = if unit.is_empty() {
            1
        } else {
            unit_multiplier(unit).ok_or_else(|| ParseError::InvalidUnit(unit.to_string()))?
        };

        let Some((whole, fraction)) = number.split_once('.') else {
            return Ok(ByteSize(number.parse::<u64>()? * multiplier));
        };

        // "1.", "1.2.3" and a fraction on plain bytes are rejected
        if fraction.is_empty() || fraction.contains('.') || multiplier == 1 {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse()? };
        let kept = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        let scale = 10u64.pow(kept.len() as u32);
        let fraction: u64 = kept.parse()?;

        Ok(ByteSize(whole * multiplier + fraction * multiplier / scale))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte count or a size such as \"10GB\"")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<ByteSize, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<ByteSize, E> {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom(format!("byte size must not be negative: {v}")))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<ByteSize, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human_readable())
    }
}
