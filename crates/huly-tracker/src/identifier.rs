//! External issue identifiers (`PROJECT-NUMBER`).

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed `PROJECT-NUMBER` identifier such as `HULY-42`.
///
/// The project code is upper-cased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueIdentifier {
    project: String,
    number: u64,
}

impl IssueIdentifier {
    /// Parse an identifier of the form `^[A-Za-z0-9]+-\d+$`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` carrying the offending string when the
    /// input does not match.
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = || {
            Error::validation(
                "issue identifier",
                input,
                "Expected format: PROJECT-NUMBER (e.g. HULY-123)",
            )
        };

        let (project, number) = input.split_once('-').ok_or_else(malformed)?;

        if project.is_empty() || !project.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(malformed());
        }
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let number = number.parse::<u64>().map_err(|_| malformed())?;

        Ok(Self {
            project: project.to_ascii_uppercase(),
            number,
        })
    }

    /// Build an identifier from its parts.
    pub fn new(project: impl Into<String>, number: u64) -> Self {
        Self {
            project: project.into().to_ascii_uppercase(),
            number,
        }
    }

    /// Upper-cased project code.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Issue number within the project.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for IssueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.number)
    }
}

impl FromStr for IssueIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
