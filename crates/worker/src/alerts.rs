//! Operator alerting.

use sigwarden_core::CertificateStatus;
use sigwarden_metadata::models::{Certificate, PackageSignature};

/// Fire-and-forget sink for conditions that need a human.
pub trait AlertSink: Send + Sync {
    /// A certificate hit the failure ceiling and was marked Invalid.
    fn certificate_needs_review(&self, certificate: &Certificate);

    /// A signature was invalidated because `certificate` became `cause`.
    fn signature_needs_invalidation(
        &self,
        signature: &PackageSignature,
        certificate: &Certificate,
        cause: CertificateStatus,
    );
}

/// Alert sink that emits structured `error!` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn certificate_needs_review(&self, certificate: &Certificate) {
        crate::metrics::ALERTS_FIRED
            .with_label_values(&["certificate_needs_review"])
            .inc();
        tracing::error!(
            certificate_key = certificate.key,
            thumbprint = %certificate.thumbprint,
            "Unable to validate certificate, needs manual review"
        );
    }

    fn signature_needs_invalidation(
        &self,
        signature: &PackageSignature,
        certificate: &Certificate,
        cause: CertificateStatus,
    ) {
        crate::metrics::ALERTS_FIRED
            .with_label_values(&["signature_needs_invalidation"])
            .inc();
        tracing::error!(
            signature_key = signature.key,
            package_id = %signature.signing_state.package_id,
            package_version = %signature.signing_state.package_version,
            certificate_key = certificate.key,
            thumbprint = %certificate.thumbprint,
            cause = %cause,
            "Package signature should be invalidated by an administrator"
        );
    }
}
