//! Certificate verification seam.
//!
//! Chain building and revocation checking live outside this workspace. A
//! deployment plugs its routine in behind [`CertificateVerifier`]; the engine
//! only consumes the resulting [`VerificationResult`].

use async_trait::async_trait;
use sigwarden_core::VerificationResult;
use sigwarden_metadata::models::Certificate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("certificate verification is not implemented")]
    Unimplemented,

    #[error("verification failed: {0}")]
    Failed(String),
}

/// Produces a verdict for a recorded certificate.
#[async_trait]
pub trait CertificateVerifier: Send + Sync {
    async fn verify(&self, certificate: &Certificate) -> Result<VerificationResult, VerifierError>;
}

/// Verifier used until a real routine is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedVerifier;

#[async_trait]
impl CertificateVerifier for UnimplementedVerifier {
    async fn verify(&self, _certificate: &Certificate) -> Result<VerificationResult, VerifierError> {
        Err(VerifierError::Unimplemented)
    }
}
