//! Certificate validation engine.
//!
//! Applies a verification verdict to a certificate and propagates terminal
//! verdicts to every package signature that depends on it. A signature
//! depends on a certificate when it was signed with it or when one of its
//! trusted timestamps was issued by it.
//!
//! Writes are optimistic. Any conflicting write aborts the apply with
//! [`ApplyOutcome::Conflict`]; the message is redelivered and the whole
//! verdict re-applied against fresh rows. Pages of the cascade that were
//! already persisted are not rolled back, which is safe because
//! re-invalidating a signature is a no-op.

use crate::alerts::AlertSink;
use sigwarden_core::{
    CertificateStatus, INVALIDATION_PAGE_SIZE, SignatureStatus, SigningStatus, VerificationResult,
};
use sigwarden_metadata::models::{Certificate, CertificateValidation, PackageSignature};
use sigwarden_metadata::{MetadataError, MetadataStore, SaveOutcome};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors that prevent a verdict from being applied.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed verification result: {0}")]
    MalformedResult(String),

    #[error("trust store error: {0}")]
    Store(#[from] MetadataError),
}

/// Outcome of applying a verdict.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A concurrent writer won; nothing after the last persisted page is durable.
    Conflict,
}

/// Which dependent signatures a terminal verdict invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationPolicy {
    /// Every dependent signature.
    Invalid,
    /// Signatures that cannot be shown to predate the revocation.
    Revoked { at: OffsetDateTime },
}

impl InvalidationPolicy {
    /// Status the certificate ends up in under this policy.
    pub fn status(&self) -> CertificateStatus {
        match self {
            Self::Invalid => CertificateStatus::Invalid,
            Self::Revoked { .. } => CertificateStatus::Revoked,
        }
    }

    /// Whether `signature`, a dependent of `certificate_key`, must be invalidated.
    pub fn applies_to(&self, signature: &PackageSignature, certificate_key: i64) -> bool {
        match self {
            Self::Invalid => true,
            Self::Revoked { at } => {
                let timestamps = &signature.trusted_timestamps;
                let signed_by = signature.certificate_key == certificate_key;
                let stamped_by = timestamps
                    .iter()
                    .any(|ts| ts.certificate_key == certificate_key);

                (signed_by && (timestamps.is_empty() || timestamps.iter().any(|ts| ts.value >= *at)))
                    || stamped_by
            }
        }
    }
}

/// Applies verification verdicts to certificates.
pub struct CertificateValidationEngine {
    store: Arc<dyn MetadataStore>,
    alerts: Arc<dyn AlertSink>,
    max_validation_failures: u32,
    page_size: usize,
}

impl CertificateValidationEngine {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        alerts: Arc<dyn AlertSink>,
        max_validation_failures: u32,
    ) -> Self {
        Self {
            store,
            alerts,
            max_validation_failures,
            page_size: INVALIDATION_PAGE_SIZE,
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Apply `result` to the validation's certificate and persist it.
    ///
    /// On [`ApplyOutcome::Applied`] the in-memory validation reflects the
    /// stored rows, including their new row versions.
    pub async fn apply(
        &self,
        validation: &mut CertificateValidation,
        result: VerificationResult,
    ) -> Result<ApplyOutcome, EngineError> {
        let previous = validation.certificate.status;
        let ignored = result.status == CertificateStatus::Unknown && previous.is_terminal();
        if previous == CertificateStatus::Revoked
            && result.status != CertificateStatus::Revoked
            && !ignored
        {
            tracing::warn!(
                certificate_key = validation.certificate_key,
                thumbprint = %validation.certificate.thumbprint,
                new_status = %result.status,
                "Applying a different verdict to a revoked certificate"
            );
        }

        let mut ceiling_reached = false;
        let now = OffsetDateTime::now_utc();

        match (result.status, result.revocation_time) {
            (CertificateStatus::Good, _) => {
                let certificate = &mut validation.certificate;
                certificate.status = CertificateStatus::Good;
                certificate.validation_failures = 0;
                certificate.revocation_time = None;
                certificate.status_update_time = None;
                certificate.next_status_update_time = None;
                certificate.last_verification_time = Some(now);
            }
            (CertificateStatus::Unknown, _) if ignored => {
                tracing::info!(
                    certificate_key = validation.certificate_key,
                    status = %previous,
                    "Ignoring unknown verdict for a certificate with a settled status"
                );
            }
            (CertificateStatus::Unknown, _) => {
                let certificate = &mut validation.certificate;
                certificate.validation_failures = certificate.validation_failures.saturating_add(1);
                certificate.last_verification_time = Some(now);

                if certificate.validation_failures >= self.max_validation_failures {
                    certificate.status = CertificateStatus::Invalid;
                    certificate.validation_failures = 0;
                    certificate.revocation_time = None;
                    ceiling_reached = true;
                } else {
                    certificate.status = CertificateStatus::Unknown;
                }
            }
            (CertificateStatus::Invalid, _) => {
                if self
                    .invalidate_dependents(&validation.certificate, InvalidationPolicy::Invalid)
                    .await?
                    .is_conflict()
                {
                    return Ok(self.conflict(validation));
                }

                let certificate = &mut validation.certificate;
                certificate.status = CertificateStatus::Invalid;
                certificate.validation_failures = 0;
                certificate.revocation_time = None;
                certificate.last_verification_time = Some(now);
            }
            (CertificateStatus::Revoked, None) => {
                return Err(EngineError::MalformedResult(
                    "revoked result is missing its revocation time".to_string(),
                ));
            }
            (CertificateStatus::Revoked, Some(at)) => {
                if self
                    .invalidate_dependents(&validation.certificate, InvalidationPolicy::Revoked { at })
                    .await?
                    .is_conflict()
                {
                    return Ok(self.conflict(validation));
                }

                let certificate = &mut validation.certificate;
                certificate.status = CertificateStatus::Revoked;
                certificate.validation_failures = 0;
                certificate.revocation_time = Some(at);
                certificate.last_verification_time = Some(now);
            }
        }

        validation.status = Some(validation.certificate.status);

        if self
            .store
            .save_certificate_validation(validation)
            .await?
            .is_conflict()
        {
            return Ok(self.conflict(validation));
        }

        let status = validation.certificate.status;
        crate::metrics::CERTIFICATE_TRANSITIONS
            .with_label_values(&[status.as_str()])
            .inc();

        if ceiling_reached {
            self.alerts.certificate_needs_review(&validation.certificate);
        }

        tracing::info!(
            validation_id = %validation.validation_id,
            certificate_key = validation.certificate_key,
            previous = %previous,
            status = %status,
            failures = validation.certificate.validation_failures,
            "Certificate verdict applied"
        );

        Ok(ApplyOutcome::Applied)
    }

    fn conflict(&self, validation: &CertificateValidation) -> ApplyOutcome {
        crate::metrics::CERTIFICATE_CONFLICTS.inc();
        tracing::info!(
            validation_id = %validation.validation_id,
            certificate_key = validation.certificate_key,
            "Concurrent write detected, verdict will be retried"
        );
        ApplyOutcome::Conflict
    }

    /// Invalidate the dependents of `certificate` page by page.
    ///
    /// Each page is persisted before the next one is fetched, so memory stays
    /// bounded and progress survives a crash between pages.
    async fn invalidate_dependents(
        &self,
        certificate: &Certificate,
        policy: InvalidationPolicy,
    ) -> Result<SaveOutcome, EngineError> {
        let cause = policy.status();
        let mut after_key = None;
        let mut invalidated = 0usize;

        loop {
            let page = self
                .store
                .get_dependent_signatures(certificate.key, after_key, self.page_size)
                .await?;
            let fetched = page.len();
            if let Some(last) = page.last() {
                after_key = Some(last.key);
            }

            let mut changed = Vec::new();
            let mut silent = Vec::new();
            for mut signature in page {
                if signature.status == SignatureStatus::Invalid
                    || !policy.applies_to(&signature, certificate.key)
                {
                    continue;
                }

                silent.push(signature.status == SignatureStatus::InGracePeriod);
                signature.status = SignatureStatus::Invalid;
                signature.signing_state.status = SigningStatus::Invalid;
                changed.push(signature);
            }

            if !changed.is_empty() {
                if self.store.save_signatures(&mut changed).await?.is_conflict() {
                    return Ok(SaveOutcome::Conflict);
                }

                for (signature, silent) in changed.iter().zip(silent) {
                    if !silent {
                        self.alerts
                            .signature_needs_invalidation(signature, certificate, cause);
                    }
                }

                invalidated += changed.len();
                crate::metrics::SIGNATURES_INVALIDATED.inc_by(changed.len() as u64);
                tracing::debug!(
                    certificate_key = certificate.key,
                    page_size = fetched,
                    changed = changed.len(),
                    "Persisted invalidation page"
                );
            }

            if fetched < self.page_size {
                break;
            }
        }

        if invalidated > 0 {
            tracing::info!(
                certificate_key = certificate.key,
                cause = %cause,
                invalidated,
                "Dependent signatures invalidated"
            );
        }

        Ok(SaveOutcome::Saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigwarden_metadata::models::{PackageSigningState, TrustedTimestamp};
    use time::macros::datetime;

    const REVOKED_KEY: i64 = 7;
    const OTHER_KEY: i64 = 9;

    fn signature(certificate_key: i64, timestamps: &[(i64, OffsetDateTime)]) -> PackageSignature {
        PackageSignature {
            key: 1,
            certificate_key,
            status: SignatureStatus::Valid,
            created_at: datetime!(2024-01-01 0:00 UTC),
            row_version: 0,
            trusted_timestamps: timestamps
                .iter()
                .enumerate()
                .map(|(i, (certificate_key, value))| TrustedTimestamp {
                    key: i as i64 + 1,
                    certificate_key: *certificate_key,
                    value: *value,
                })
                .collect(),
            signing_state: PackageSigningState {
                package_key: 1,
                package_id: "Contoso.Core".to_string(),
                package_version: "1.0.0".to_string(),
                status: SigningStatus::Valid,
                row_version: 0,
            },
        }
    }

    #[test]
    fn test_invalid_policy_applies_to_every_dependent() {
        let sig = signature(OTHER_KEY, &[(REVOKED_KEY, datetime!(2020-01-01 0:00 UTC))]);
        assert!(InvalidationPolicy::Invalid.applies_to(&sig, REVOKED_KEY));
        assert_eq!(InvalidationPolicy::Invalid.status(), CertificateStatus::Invalid);
    }

    #[test]
    fn test_revoked_policy_spares_signature_timestamped_before_revocation() {
        let at = datetime!(2024-06-01 0:00 UTC);
        let policy = InvalidationPolicy::Revoked { at };
        let sig = signature(REVOKED_KEY, &[(OTHER_KEY, datetime!(2024-05-31 23:59 UTC))]);
        assert!(!policy.applies_to(&sig, REVOKED_KEY));
    }

    #[test]
    fn test_revoked_policy_invalidates_untimestamped_signature() {
        let policy = InvalidationPolicy::Revoked {
            at: datetime!(2024-06-01 0:00 UTC),
        };
        let sig = signature(REVOKED_KEY, &[]);
        assert!(policy.applies_to(&sig, REVOKED_KEY));
    }

    #[test]
    fn test_revoked_policy_invalidates_timestamp_at_revocation_instant() {
        let at = datetime!(2024-06-01 0:00 UTC);
        let policy = InvalidationPolicy::Revoked { at };
        let sig = signature(REVOKED_KEY, &[(OTHER_KEY, at)]);
        assert!(policy.applies_to(&sig, REVOKED_KEY));
    }

    #[test]
    fn test_revoked_policy_invalidates_timestamps_issued_by_revoked_authority() {
        let policy = InvalidationPolicy::Revoked {
            at: datetime!(2024-06-01 0:00 UTC),
        };
        let sig = signature(OTHER_KEY, &[(REVOKED_KEY, datetime!(2020-01-01 0:00 UTC))]);
        assert!(policy.applies_to(&sig, REVOKED_KEY));
        assert_eq!(policy.status(), CertificateStatus::Revoked);
    }
}
