//! Package signature repository.

use crate::error::MetadataResult;
use crate::models::{NewPackageSignature, PackageSignature, PackageSigningState};
use crate::repos::SaveOutcome;
use async_trait::async_trait;
use sigwarden_core::SigningStatus;

/// Repository for packages, their signatures and trusted timestamps.
#[async_trait]
pub trait SignatureRepo: Send + Sync {
    /// Record a package version and its initial signing state. Returns its key.
    async fn add_package(
        &self,
        package_id: &str,
        package_version: &str,
        status: SigningStatus,
    ) -> MetadataResult<i64>;

    /// Get the signing state of a package version.
    async fn get_package_signing_state(
        &self,
        package_id: &str,
        package_version: &str,
    ) -> MetadataResult<Option<PackageSigningState>>;

    /// Record a signature and its trusted timestamps. Returns the signature key.
    async fn add_package_signature(&self, signature: &NewPackageSignature) -> MetadataResult<i64>;

    /// Get a signature with timestamps and signing state loaded.
    async fn get_package_signature(
        &self,
        package_signature_key: i64,
    ) -> MetadataResult<Option<PackageSignature>>;

    /// Page of signatures that depend on a certificate, ordered by key.
    ///
    /// A signature depends on the certificate if it was signed with it or if
    /// any of its trusted timestamps was issued by it. Only signatures with a
    /// key greater than `after_key` are returned.
    async fn get_dependent_signatures(
        &self,
        certificate_key: i64,
        after_key: Option<i64>,
        limit: usize,
    ) -> MetadataResult<Vec<PackageSignature>>;

    /// Persist signature statuses and their packages' signing states in one
    /// transaction.
    ///
    /// Signatures of the same package share one signing state row; it is
    /// written once. On [`SaveOutcome::Saved`] the in-memory versions are
    /// advanced.
    async fn save_signatures(
        &self,
        signatures: &mut [PackageSignature],
    ) -> MetadataResult<SaveOutcome>;
}
