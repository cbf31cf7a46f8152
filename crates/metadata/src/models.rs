//! Database rows and the typed records built from them.

use crate::error::{MetadataError, MetadataResult};
use sigwarden_core::{CertificateStatus, SignatureStatus, SigningStatus, ValidatorState};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Certificates
// =============================================================================

/// Certificate row.
#[derive(Debug, Clone, FromRow)]
pub struct CertificateRow {
    pub certificate_key: i64,
    pub thumbprint: String,
    pub status: String,
    pub validation_failures: i64,
    pub last_verification_time: Option<OffsetDateTime>,
    pub revocation_time: Option<OffsetDateTime>,
    pub status_update_time: Option<OffsetDateTime>,
    pub next_status_update_time: Option<OffsetDateTime>,
    pub row_version: i64,
}

/// A signing or timestamp-authority certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub key: i64,
    /// Stable content-derived identity.
    pub thumbprint: String,
    pub status: CertificateStatus,
    /// Consecutive Unknown results since the last settled verdict.
    pub validation_failures: u32,
    pub last_verification_time: Option<OffsetDateTime>,
    /// Set only while the certificate is Revoked.
    pub revocation_time: Option<OffsetDateTime>,
    pub status_update_time: Option<OffsetDateTime>,
    pub next_status_update_time: Option<OffsetDateTime>,
    pub row_version: i64,
}

impl TryFrom<CertificateRow> for Certificate {
    type Error = MetadataError;

    fn try_from(row: CertificateRow) -> MetadataResult<Self> {
        Ok(Self {
            key: row.certificate_key,
            thumbprint: row.thumbprint,
            status: row.status.parse()?,
            validation_failures: u32::try_from(row.validation_failures).map_err(|_| {
                MetadataError::Internal(format!(
                    "certificate {} has negative failure count",
                    row.certificate_key
                ))
            })?,
            last_verification_time: row.last_verification_time,
            revocation_time: row.revocation_time,
            status_update_time: row.status_update_time,
            next_status_update_time: row.next_status_update_time,
            row_version: row.row_version,
        })
    }
}

/// Certificate validation row.
#[derive(Debug, Clone, FromRow)]
pub struct CertificateValidationRow {
    pub validation_id: Uuid,
    pub certificate_key: i64,
    pub status: Option<String>,
    pub row_version: i64,
}

/// One validation request's view of a certificate, with the certificate loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateValidation {
    pub validation_id: Uuid,
    pub certificate_key: i64,
    /// Empty until a verdict is applied, then mirrors the certificate.
    pub status: Option<CertificateStatus>,
    pub row_version: i64,
    pub certificate: Certificate,
}

impl CertificateValidation {
    pub(crate) fn from_rows(
        row: CertificateValidationRow,
        certificate: CertificateRow,
    ) -> MetadataResult<Self> {
        Ok(Self {
            validation_id: row.validation_id,
            certificate_key: row.certificate_key,
            status: row
                .status
                .as_deref()
                .map(str::parse::<CertificateStatus>)
                .transpose()?,
            row_version: row.row_version,
            certificate: certificate.try_into()?,
        })
    }
}

// =============================================================================
// Package signatures
// =============================================================================

/// Package signing state row.
#[derive(Debug, Clone, FromRow)]
pub struct PackageSigningStateRow {
    pub package_key: i64,
    pub package_id: String,
    pub package_version: String,
    pub signing_status: String,
    pub row_version: i64,
}

/// Aggregate signing state of one package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSigningState {
    pub package_key: i64,
    pub package_id: String,
    pub package_version: String,
    pub status: SigningStatus,
    pub row_version: i64,
}

impl TryFrom<PackageSigningStateRow> for PackageSigningState {
    type Error = MetadataError;

    fn try_from(row: PackageSigningStateRow) -> MetadataResult<Self> {
        Ok(Self {
            package_key: row.package_key,
            package_id: row.package_id,
            package_version: row.package_version,
            status: row.signing_status.parse()?,
            row_version: row.row_version,
        })
    }
}

/// Package signature row.
#[derive(Debug, Clone, FromRow)]
pub struct PackageSignatureRow {
    pub package_signature_key: i64,
    pub package_key: i64,
    pub certificate_key: i64,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub row_version: i64,
}

/// Trusted timestamp row.
#[derive(Debug, Clone, FromRow)]
pub struct TrustedTimestampRow {
    pub trusted_timestamp_key: i64,
    pub package_signature_key: i64,
    pub certificate_key: i64,
    pub value: OffsetDateTime,
}

/// A timestamp-authority assertion of when a signature was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedTimestamp {
    pub key: i64,
    /// The timestamp authority's certificate.
    pub certificate_key: i64,
    pub value: OffsetDateTime,
}

impl From<TrustedTimestampRow> for TrustedTimestamp {
    fn from(row: TrustedTimestampRow) -> Self {
        Self {
            key: row.trusted_timestamp_key,
            certificate_key: row.certificate_key,
            value: row.value,
        }
    }
}

/// A package signature with its trusted timestamps and signing state loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSignature {
    pub key: i64,
    pub certificate_key: i64,
    pub status: SignatureStatus,
    pub created_at: OffsetDateTime,
    pub row_version: i64,
    /// Ordered by timestamp key.
    pub trusted_timestamps: Vec<TrustedTimestamp>,
    pub signing_state: PackageSigningState,
}

impl PackageSignature {
    pub(crate) fn from_rows(
        row: PackageSignatureRow,
        trusted_timestamps: Vec<TrustedTimestamp>,
        signing_state: PackageSigningState,
    ) -> MetadataResult<Self> {
        Ok(Self {
            key: row.package_signature_key,
            certificate_key: row.certificate_key,
            status: row.status.parse()?,
            created_at: row.created_at,
            row_version: row.row_version,
            trusted_timestamps,
            signing_state,
        })
    }
}

/// Input for recording a newly signed package.
#[derive(Debug, Clone)]
pub struct NewPackageSignature {
    pub package_key: i64,
    pub certificate_key: i64,
    pub status: SignatureStatus,
    /// `(issuing certificate key, timestamp value)` pairs.
    pub trusted_timestamps: Vec<(i64, OffsetDateTime)>,
}

// =============================================================================
// Validator status
// =============================================================================

/// Validator status row.
#[derive(Debug, Clone, FromRow)]
pub struct ValidatorStatusRow {
    pub validation_id: Uuid,
    pub validator_name: String,
    pub package_id: String,
    pub package_version: String,
    pub state: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub row_version: i64,
}

/// Progress of one signature acceptance request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorStatus {
    pub validation_id: Uuid,
    pub validator_name: String,
    pub package_id: String,
    pub package_version: String,
    pub state: ValidatorState,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub row_version: i64,
}

impl ValidatorStatus {
    /// A fresh `Incomplete` status as written by the enqueuing side.
    pub fn incomplete(
        validation_id: Uuid,
        validator_name: &str,
        package_id: &str,
        package_version: &str,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            validation_id,
            validator_name: validator_name.to_string(),
            package_id: package_id.to_string(),
            package_version: package_version.to_string(),
            state: ValidatorState::Incomplete,
            created_at: now,
            updated_at: now,
            row_version: 0,
        }
    }
}

impl TryFrom<ValidatorStatusRow> for ValidatorStatus {
    type Error = MetadataError;

    fn try_from(row: ValidatorStatusRow) -> MetadataResult<Self> {
        Ok(Self {
            validation_id: row.validation_id,
            validator_name: row.validator_name,
            package_id: row.package_id,
            package_version: row.package_version,
            state: row.state.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            row_version: row.row_version,
        })
    }
}

/// Signing state written together with a validator status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningStateChange {
    pub package_id: String,
    pub package_version: String,
    pub status: SigningStatus,
}

// =============================================================================
// Queue messages
// =============================================================================

/// Queue message row.
#[derive(Debug, Clone, FromRow)]
pub struct QueueMessageRow {
    pub sequence: i64,
    pub message_id: Uuid,
    pub topic: String,
    pub body: String,
    pub state: String,
    pub delivery_count: i64,
    pub enqueued_at: OffsetDateTime,
    pub visible_at_ms: i64,
    pub dead_letter_reason: Option<String>,
}

/// A leased message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedMessage {
    pub message_id: Uuid,
    pub topic: String,
    pub body: String,
    /// Deliveries including the current one.
    pub delivery_count: u32,
    pub enqueued_at: OffsetDateTime,
}

impl From<QueueMessageRow> for LeasedMessage {
    fn from(row: QueueMessageRow) -> Self {
        Self {
            message_id: row.message_id,
            topic: row.topic,
            body: row.body,
            delivery_count: u32::try_from(row.delivery_count).unwrap_or(u32::MAX),
            enqueued_at: row.enqueued_at,
        }
    }
}
