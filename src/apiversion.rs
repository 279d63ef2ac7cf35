//! API version identifiers
//!
//! Versions look like `v1`, `v1beta2` or `v2alpha1`. Within a major version
//! alpha releases sort before beta releases, which sort before the stable one.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid API version {0:?}, expected v<major>[alpha<n>|beta<n>]")]
pub struct ApiVersionError(pub String);

/// Release track of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
    Alpha(u32),
    Beta(u32),
    Stable,
}

/// A parsed API version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    major: u32,
    qualifier: Qualifier,
}

impl ApiVersion {
    pub fn parse(s: &str) -> Result<Self, ApiVersionError> {
        let invalid = || ApiVersionError(s.to_string());

        let rest = s.strip_prefix('v').ok_or_else(invalid)?;
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(invalid());
        }
        let (major, suffix) = rest.split_at(digits);
        let major = parse_number(major).ok_or_else(invalid)?;
        if major == 0 {
            return Err(invalid());
        }

        let qualifier = if suffix.is_empty() {
            Qualifier::Stable
        } else if let Some(n) = suffix.strip_prefix("alpha") {
            Qualifier::Alpha(parse_number(n).filter(|n| *n > 0).ok_or_else(invalid)?)
        } else if let Some(n) = suffix.strip_prefix("beta") {
            Qualifier::Beta(parse_number(n).filter(|n| *n > 0).ok_or_else(invalid)?)
        } else {
            return Err(invalid());
        };

        Ok(Self { major, qualifier })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn qualifier(&self) -> Qualifier {
        self.qualifier
    }

    pub fn is_stable(&self) -> bool {
        self.qualifier == Qualifier::Stable
    }
}

/// Digits only, no sign and no leading zeros
fn parse_number(s: &str) -> Option<u32> {
    let leading_zero = s.len() > 1 && s.starts_with('0');
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || leading_zero {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Qualifier::Alpha(n) => write!(f, "v{}alpha{}", self.major, n),
            Qualifier::Beta(n) => write!(f, "v{}beta{}", self.major, n),
            Qualifier::Stable => write!(f, "v{}", self.major),
        }
    }
}

impl FromStr for ApiVersion {
    type Err = ApiVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ApiVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for s in ["v1", "v1alpha1", "v1alpha2", "v1beta3", "v12"] {
            let version = ApiVersion::parse(s).unwrap();
            assert_eq!(version.to_string(), s);
        }
    }

    #[test]
    fn test_malformed_versions() {
        let malformed = [
            "", "1", "v", "v0", "valpha1", "v1alpha", "v1gamma1", "v1alpha0", "v01", "v1beta-1",
            "V1",
        ];
        for s in malformed {
            assert!(ApiVersion::parse(s).is_err(), "{} should not parse", s);
        }
    }

    #[test]
    fn test_ordering() {
        let unsorted = ["v2", "v1", "v1beta1", "v1alpha2", "v1alpha1", "v2alpha1"];
        let mut versions: Vec<ApiVersion> = unsorted
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        versions.sort();

        let sorted: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(sorted, ["v1alpha1", "v1alpha2", "v1beta1", "v1", "v2alpha1", "v2"]);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let version: ApiVersion = serde_json::from_str("\"v1beta1\"").unwrap();
        assert_eq!(version.qualifier(), Qualifier::Beta(1));
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"v1beta1\"");
        assert!(serde_json::from_str::<ApiVersion>("\"beta\"").is_err());
    }
}
