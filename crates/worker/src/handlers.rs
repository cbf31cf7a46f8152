//! Message handlers feeding certificate verdicts into the engine.

use crate::certificates::{ApplyOutcome, CertificateValidationEngine};
use crate::messaging::MessageHandler;
use crate::verifier::{CertificateVerifier, VerifierError};
use async_trait::async_trait;
use sigwarden_core::{CertificateValidationRequest, CertificateVerificationMessage};
use std::sync::Arc;

/// Handles `certificate-verification` messages carrying an external verdict.
pub struct CertificateResultHandler {
    engine: Arc<CertificateValidationEngine>,
}

impl CertificateResultHandler {
    pub fn new(engine: Arc<CertificateValidationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageHandler<CertificateVerificationMessage> for CertificateResultHandler {
    async fn handle(&self, message: &CertificateVerificationMessage) -> anyhow::Result<bool> {
        let result = message.result()?;

        let Some(mut validation) = self
            .engine
            .store()
            .get_certificate_validation(message.validation_id, message.certificate_key)
            .await?
        else {
            tracing::debug!(
                validation_id = %message.validation_id,
                certificate_key = message.certificate_key,
                "Certificate validation not found yet, retrying later"
            );
            return Ok(false);
        };

        match self.engine.apply(&mut validation, result).await? {
            ApplyOutcome::Applied => Ok(true),
            ApplyOutcome::Conflict => Ok(false),
        }
    }
}

/// Verifies a certificate in-process, then applies the verdict.
pub struct VerificationRequestHandler {
    engine: Arc<CertificateValidationEngine>,
    verifier: Arc<dyn CertificateVerifier>,
}

impl VerificationRequestHandler {
    pub fn new(
        engine: Arc<CertificateValidationEngine>,
        verifier: Arc<dyn CertificateVerifier>,
    ) -> Self {
        Self { engine, verifier }
    }
}

#[async_trait]
impl MessageHandler<CertificateValidationRequest> for VerificationRequestHandler {
    async fn handle(&self, message: &CertificateValidationRequest) -> anyhow::Result<bool> {
        let Some(mut validation) = self
            .engine
            .store()
            .get_certificate_validation(message.validation_id, message.certificate_key)
            .await?
        else {
            return Ok(false);
        };

        let result = match self.verifier.verify(&validation.certificate).await {
            Ok(result) => result,
            Err(VerifierError::Unimplemented) => {
                tracing::error!(
                    validation_id = %message.validation_id,
                    certificate_key = message.certificate_key,
                    "No certificate verification routine is configured"
                );
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        match self.engine.apply(&mut validation, result).await? {
            ApplyOutcome::Applied => Ok(true),
            ApplyOutcome::Conflict => Ok(false),
        }
    }
}
