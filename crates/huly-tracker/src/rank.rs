//! Ordering keys for issue lists.
//!
//! A [`Rank`] is an opaque string whose lexicographic order is the list
//! order. New keys are generated relative to their neighbours, so inserting
//! an item never rewrites the keys of existing items.
//!
//! # Encoding
//!
//! Keys look like `0|hzzzzz:i`: a one-character bucket, six base-36 integer
//! digits and an optional base-36 fraction with no trailing zeros. The
//! integer part has a fixed width and digit characters sort in value order,
//! so plain string comparison agrees with numeric comparison. Only this
//! module interprets the encoding.
//!
//! # Concurrency
//!
//! Generation is pure. Two appends that read the same "last rank" snapshot
//! compute the same key; nothing here detects that.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BASE: u64 = 36;
const INTEGER_WIDTH: u32 = 6;
/// One past the largest integer part (`36^6`).
const INTEGER_LIMIT: u64 = BASE.pow(INTEGER_WIDTH);
/// Distance between consecutive appended keys.
const APPEND_STEP: u64 = 8;
const INITIAL: &str = "0|hzzzzz:";

/// An opaque, lexicographically ordered list position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(String);

impl Rank {
    /// The key used for the first item of an empty list.
    #[must_use]
    pub fn initial() -> Self {
        Self(INITIAL.to_string())
    }

    /// A key that sorts after `previous`, or [`Rank::initial`] when there is
    /// no previous item.
    ///
    /// Appends advance in fixed steps, leaving room for later insertions
    /// between any two appended keys.
    #[must_use]
    pub fn after(previous: Option<&Rank>) -> Self {
        let Some(previous) = previous else {
            return Self::initial();
        };

        let Some(decimal) = Decimal::parse(&previous.0) else {
            // Not our encoding. Restart from the initial key when it already
            // sorts after `previous` (this covers the empty key), otherwise
            // extend `previous`.
            if previous.0.as_str() < INITIAL {
                return Self::initial();
            }
            return Self(format!("{}i", previous.0));
        };

        let next = decimal.ceil_integer() + APPEND_STEP;
        if next >= INTEGER_LIMIT - 1 {
            return Self(decimal.midpoint(&Decimal::top(decimal.bucket)).format());
        }

        Self(Decimal::whole(decimal.bucket, next).format())
    }

    /// A key that sorts strictly between `lower` and `upper`.
    ///
    /// A missing bound stands for the corresponding end of the key space.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` when a bound is not a key produced by this
    /// module, the bounds are in different buckets, `lower >= upper`, or
    /// `upper` is the bottom of the key space with no lower bound.
    pub fn between(lower: Option<&Rank>, upper: Option<&Rank>) -> Result<Self> {
        match (lower, upper) {
            (None, None) => Ok(Self::initial()),
            (Some(lower), None) => Ok(Self::after(Some(lower))),
            (None, Some(upper)) => {
                let upper_rank = upper;
                let upper = Decimal::parse_bound(upper_rank)?;
                if upper.is_zero() {
                    return Err(Error::validation(
                        "rank",
                        upper_rank.as_str(),
                        "no key sorts before the bottom of the key space",
                    ));
                }
                let floor = upper.integer;
                let candidate = if floor > APPEND_STEP {
                    Decimal::whole(upper.bucket, floor - APPEND_STEP)
                } else {
                    Decimal::bottom(upper.bucket).midpoint(&upper)
                };
                Ok(Self(candidate.format()))
            }
            (Some(lower_rank), Some(upper_rank)) => {
                let lower = Decimal::parse_bound(lower_rank)?;
                let upper = Decimal::parse_bound(upper_rank)?;
                if lower.bucket != upper.bucket {
                    return Err(Error::validation(
                        "rank",
                        upper_rank.as_str(),
                        format!("bucket differs from lower bound {lower_rank}"),
                    ));
                }
                if lower.cmp_value(&upper) != Ordering::Less {
                    return Err(Error::validation(
                        "rank",
                        lower_rank.as_str(),
                        format!("must sort before {upper_rank}"),
                    ));
                }
                Ok(Self(lower.midpoint(&upper).format()))
            }
        }
    }

    /// The key as stored on the backend.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Rank {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Numeric view of a key: `integer + 0.fraction` in base 36.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Decimal {
    bucket: char,
    integer: u64,
    /// Base-36 digit values, without trailing zeros.
    fraction: Vec<u8>,
}

impl Decimal {
    fn parse(key: &str) -> Option<Self> {
        let (bucket, value) = key.split_once('|')?;
        let mut bucket_chars = bucket.chars();
        let bucket = bucket_chars.next()?;
        if bucket_chars.next().is_some() || !bucket.is_ascii_alphanumeric() {
            return None;
        }

        let (integer, fraction) = value.split_once(':')?;
        if integer.len() != INTEGER_WIDTH as usize {
            return None;
        }

        let mut integer_value = 0u64;
        for c in integer.bytes() {
            integer_value = integer_value * BASE + u64::from(digit_value(c)?);
        }

        let mut fraction = fraction
            .bytes()
            .map(digit_value)
            .collect::<Option<Vec<u8>>>()?;
        trim_trailing_zeros(&mut fraction);

        Some(Self {
            bucket,
            integer: integer_value,
            fraction,
        })
    }

    fn parse_bound(rank: &Rank) -> Result<Self> {
        Self::parse(&rank.0)
            .ok_or_else(|| Error::validation("rank", rank.as_str(), "not a recognised rank key"))
    }

    fn whole(bucket: char, integer: u64) -> Self {
        Self {
            bucket,
            integer,
            fraction: Vec::new(),
        }
    }

    fn bottom(bucket: char) -> Self {
        Self::whole(bucket, 0)
    }

    /// The exclusive upper end of the key space.
    fn top(bucket: char) -> Self {
        Self::whole(bucket, INTEGER_LIMIT)
    }

    fn is_zero(&self) -> bool {
        self.integer == 0 && self.fraction.is_empty()
    }

    fn ceil_integer(&self) -> u64 {
        if self.fraction.is_empty() {
            self.integer
        } else {
            self.integer + 1
        }
    }

    fn cmp_value(&self, other: &Self) -> Ordering {
        self.integer
            .cmp(&other.integer)
            .then_with(|| self.fraction.cmp(&other.fraction))
    }

    /// Exact midpoint `(self + other) / 2`.
    ///
    /// Halving in an even base needs at most one extra fraction digit, so the
    /// result is exact and lies strictly between distinct operands.
    fn midpoint(&self, other: &Self) -> Self {
        let width = self.fraction.len().max(other.fraction.len()) + 1;
        let padded = |fraction: &[u8]| {
            let mut digits = fraction.to_vec();
            digits.resize(width, 0);
            digits
        };
        let a = padded(&self.fraction);
        let b = padded(&other.fraction);

        let mut sum = vec![0u8; width];
        let mut carry = 0u64;
        for i in (0..width).rev() {
            let digit = u64::from(a[i]) + u64::from(b[i]) + carry;
            sum[i] = digit_from(digit % BASE);
            carry = digit / BASE;
        }
        let integer_sum = self.integer + other.integer + carry;

        let mut remainder = integer_sum % 2;
        let mut fraction = Vec::with_capacity(width);
        for digit in sum {
            let current = remainder * BASE + u64::from(digit);
            fraction.push(digit_from(current / 2));
            remainder = current % 2;
        }
        trim_trailing_zeros(&mut fraction);

        Self {
            bucket: self.bucket,
            integer: integer_sum / 2,
            fraction,
        }
    }

    fn format(&self) -> String {
        let mut integer = [b'0'; INTEGER_WIDTH as usize];
        let mut n = self.integer;
        for slot in integer.iter_mut().rev() {
            *slot = DIGITS[usize::from(digit_from(n % BASE))];
            n /= BASE;
        }

        let mut key = String::with_capacity(9 + self.fraction.len());
        key.push(self.bucket);
        key.push('|');
        key.extend(integer.iter().map(|&b| char::from(b)));
        key.push(':');
        key.extend(
            self.fraction
                .iter()
                .map(|&d| char::from(DIGITS[usize::from(d)])),
        );
        key
    }
}

fn digit_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'z' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Narrow a value known to be below 36.
fn digit_from(value: u64) -> u8 {
    u8::try_from(value % BASE).unwrap_or(0)
}

fn trim_trailing_zeros(fraction: &mut Vec<u8>) {
    while fraction.last() == Some(&0) {
        fraction.pop();
    }
}
