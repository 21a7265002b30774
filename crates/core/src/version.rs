//! Four-component application version parsing and ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A four-component application version (`A.B.C.D`).
///
/// Ordering is purely numeric, component by component; there is no notion
/// of pre-release suffixes or publication dates. This comparator is the
/// sole ordering used to pick the "latest" release.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version([u64; 4]);

impl Version {
    /// Parse a version string of exactly four dot-separated decimal components.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let mut components = [0u64; 4];
        let mut count = 0;

        for token in input.split('.') {
            if count == 4 {
                return Err(crate::Error::InvalidVersion(format!(
                    "expected four components, got more: {input}"
                )));
            }
            if token.is_empty() {
                return Err(crate::Error::InvalidVersion(format!(
                    "empty component in {input}"
                )));
            }
            components[count] = token.parse::<u64>().map_err(|_| {
                crate::Error::InvalidVersion(format!("component {token:?} is not a number"))
            })?;
            count += 1;
        }

        if count != 4 {
            return Err(crate::Error::InvalidVersion(format!(
                "expected four components, got {count}: {input}"
            )));
        }

        Ok(Self(components))
    }

    /// Get the raw components.
    pub fn components(&self) -> [u64; 4] {
        self.0
    }
}

impl FromStr for Version {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}
