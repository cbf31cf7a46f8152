//! Inbound message payloads and their subscription topics.

use crate::certificate::{CertificateStatus, VerificationResult};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

/// Topic carrying [`SignatureValidationMessage`]s.
pub const SIGNATURE_VALIDATION_TOPIC: &str = "signature-validation";

/// Topic carrying [`CertificateVerificationMessage`]s.
pub const CERTIFICATE_VERIFICATION_TOPIC: &str = "certificate-verification";

/// Request to decide whether an uploaded package's signature is acceptable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureValidationMessage {
    pub package_id: String,
    pub package_version: String,
    pub package_content_uri: Url,
    pub validation_id: Uuid,
}

/// A verification verdict for one certificate of one validation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateVerificationMessage {
    pub validation_id: Uuid,
    pub certificate_key: i64,
    pub status: CertificateStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revocation_time: Option<OffsetDateTime>,
}

impl CertificateVerificationMessage {
    pub fn result(&self) -> crate::Result<VerificationResult> {
        VerificationResult::from_parts(self.status, self.revocation_time)
    }
}

/// Request to verify one certificate in-process and apply the verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateValidationRequest {
    pub validation_id: Uuid,
    pub certificate_key: i64,
}
