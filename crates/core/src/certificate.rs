//! Certificate status and verification results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Trust status of a signing or timestamping certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Verification succeeded.
    Good,
    /// Verification could not reach a verdict; retried until the failure ceiling.
    Unknown,
    /// The certificate must no longer be trusted.
    Invalid,
    /// The issuer revoked the certificate at a known instant.
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Unknown => "unknown",
            Self::Invalid => "invalid",
            Self::Revoked => "revoked",
        }
    }

    /// Whether no further automatic verification is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Revoked)
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "good" => Ok(Self::Good),
            "unknown" => Ok(Self::Unknown),
            "invalid" => Ok(Self::Invalid),
            "revoked" => Ok(Self::Revoked),
            other => Err(crate::Error::InvalidCertificateStatus(other.to_string())),
        }
    }
}

/// Outcome of verifying a certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub status: CertificateStatus,
    /// Set only for [`CertificateStatus::Revoked`].
    pub revocation_time: Option<OffsetDateTime>,
}

impl VerificationResult {
    pub fn good() -> Self {
        Self {
            status: CertificateStatus::Good,
            revocation_time: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            status: CertificateStatus::Unknown,
            revocation_time: None,
        }
    }

    pub fn invalid() -> Self {
        Self {
            status: CertificateStatus::Invalid,
            revocation_time: None,
        }
    }

    pub fn revoked(revocation_time: OffsetDateTime) -> Self {
        Self {
            status: CertificateStatus::Revoked,
            revocation_time: Some(revocation_time),
        }
    }

    /// Build a result from wire fields, rejecting a revocation without an instant.
    pub fn from_parts(
        status: CertificateStatus,
        revocation_time: Option<OffsetDateTime>,
    ) -> crate::Result<Self> {
        match (status, revocation_time) {
            (CertificateStatus::Revoked, Some(at)) => Ok(Self::revoked(at)),
            (CertificateStatus::Revoked, None) => Err(crate::Error::MalformedResult(
                "revoked result is missing its revocation time".to_string(),
            )),
            (status, _) => Ok(Self {
                status,
                revocation_time: None,
            }),
        }
    }
}
