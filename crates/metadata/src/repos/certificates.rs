//! Certificate and certificate validation repository.

use crate::error::MetadataResult;
use crate::models::{Certificate, CertificateValidation};
use crate::repos::SaveOutcome;
use async_trait::async_trait;
use sigwarden_core::CertificateStatus;
use uuid::Uuid;

/// Repository for certificates and their per-request validation records.
#[async_trait]
pub trait CertificateRepo: Send + Sync {
    /// Record a certificate. Returns its key.
    async fn add_certificate(&self, thumbprint: &str, status: CertificateStatus)
    -> MetadataResult<i64>;

    /// Get a certificate by key.
    async fn get_certificate(&self, certificate_key: i64) -> MetadataResult<Option<Certificate>>;

    /// Get a certificate by thumbprint.
    async fn get_certificate_by_thumbprint(
        &self,
        thumbprint: &str,
    ) -> MetadataResult<Option<Certificate>>;

    /// Open a validation record for a certificate. Its status starts empty.
    async fn add_certificate_validation(
        &self,
        validation_id: Uuid,
        certificate_key: i64,
    ) -> MetadataResult<()>;

    /// Point lookup of a validation with its certificate loaded.
    async fn get_certificate_validation(
        &self,
        validation_id: Uuid,
        certificate_key: i64,
    ) -> MetadataResult<Option<CertificateValidation>>;

    /// Persist the validation and its certificate in one transaction.
    ///
    /// Both rows are checked against their loaded `row_version`. On
    /// [`SaveOutcome::Saved`] the in-memory versions are advanced.
    async fn save_certificate_validation(
        &self,
        validation: &mut CertificateValidation,
    ) -> MetadataResult<SaveOutcome>;
}
