//! Per-request validator state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name recorded on validator status rows written by the signature acceptance handler.
pub const PACKAGE_SIGNING_VALIDATOR: &str = "package_signing";

/// Validator state machine: `Incomplete -> {Succeeded, Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorState {
    Incomplete,
    Succeeded,
    Failed,
}

impl ValidatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Check if the request already reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for ValidatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidatorState {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "incomplete" => Ok(Self::Incomplete),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::InvalidValidatorState(other.to_string())),
        }
    }
}
