//! Bidirectional string/number tables for backend enumerations.
//!
//! Every enumeration exposed at the tool boundary has exactly one table. An
//! entry carries the variant, its canonical wire string and its backend code.
//! Unrecognized strings and codes decode to the declared default instead of
//! failing, so a stale or misspelled value never aborts a tool call.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A backend enumeration with a canonical string form and a numeric code.
pub trait EnumCodec: Copy + PartialEq + Sized + 'static {
    /// `(variant, canonical string, backend code)` for every variant.
    const TABLE: &'static [(Self, &'static str, i64)];

    /// Extra accepted spellings, matched case-insensitively.
    const ALIASES: &'static [(&'static str, Self)] = &[];

    /// Value used for unrecognized input.
    const DEFAULT: Self;

    /// Canonical string for this value.
    fn as_str(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(variant, _, _)| *variant == self)
            .map_or("", |(_, name, _)| name)
    }

    /// Backend numeric code for this value.
    fn code(self) -> i64 {
        Self::TABLE
            .iter()
            .find(|(variant, _, _)| *variant == self)
            .map_or(0, |(_, _, code)| *code)
    }

    /// Decode a string, falling back to [`EnumCodec::DEFAULT`].
    fn from_str_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::DEFAULT)
    }

    /// Decode a string; `None` when it matches no entry or alias.
    fn parse(s: &str) -> Option<Self> {
        let needle = s.trim();
        Self::TABLE
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(needle))
            .map(|(variant, _, _)| *variant)
            .or_else(|| {
                Self::ALIASES
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(needle))
                    .map(|(_, variant)| *variant)
            })
    }

    /// Decode a backend code, falling back to [`EnumCodec::DEFAULT`].
    fn from_code(code: i64) -> Self {
        Self::TABLE
            .iter()
            .find(|(_, _, c)| *c == code)
            .map_or(Self::DEFAULT, |(variant, _, _)| *variant)
    }
}

/// Issue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    /// No priority set.
    NoPriority,
    /// Urgent.
    Urgent,
    /// High.
    High,
    /// Medium (the default).
    #[default]
    Medium,
    /// Low.
    Low,
}

impl EnumCodec for Priority {
    const TABLE: &'static [(Self, &'static str, i64)] = &[
        (Self::NoPriority, "none", 0),
        (Self::Urgent, "urgent", 1),
        (Self::High, "high", 2),
        (Self::Medium, "medium", 3),
        (Self::Low, "low", 4),
    ];
    const DEFAULT: Self = Self::Medium;
}

/// Milestone status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MilestoneStatus {
    /// Planned (the default).
    #[default]
    Planned,
    /// In progress.
    InProgress,
    /// Completed.
    Completed,
    /// Canceled.
    Canceled,
}

impl EnumCodec for MilestoneStatus {
    const TABLE: &'static [(Self, &'static str, i64)] = &[
        (Self::Planned, "Planned", 0),
        (Self::InProgress, "InProgress", 1),
        (Self::Completed, "Completed", 2),
        (Self::Canceled, "Canceled", 3),
    ];
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("in_progress", Self::InProgress),
        ("in-progress", Self::InProgress),
        ("cancelled", Self::Canceled),
    ];
    const DEFAULT: Self = Self::Planned;
}

macro_rules! codec_serde {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i64(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let code = Option::<i64>::deserialize(deserializer)?;
                Ok(code.map_or(<$ty as EnumCodec>::DEFAULT, <$ty>::from_code))
            }
        }
    };
}

codec_serde!(Priority);
codec_serde!(MilestoneStatus);
