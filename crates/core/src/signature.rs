//! Package signature and package signing state types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a single package signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    Valid,
    /// Already flagged for administrative review.
    InGracePeriod,
    Invalid,
}

impl SignatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::InGracePeriod => "in_grace_period",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "valid" => Ok(Self::Valid),
            "in_grace_period" => Ok(Self::InGracePeriod),
            "invalid" => Ok(Self::Invalid),
            other => Err(crate::Error::InvalidSignatureStatus(other.to_string())),
        }
    }
}

/// Aggregate signing status of a package version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningStatus {
    Unsigned,
    Valid,
    Invalid,
}

impl SigningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SigningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "unsigned" => Ok(Self::Unsigned),
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            other => Err(crate::Error::InvalidSigningStatus(other.to_string())),
        }
    }
}
