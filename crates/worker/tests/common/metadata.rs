//! Trust store test utilities.

use async_trait::async_trait;
use sigwarden_core::{CertificateStatus, SignatureStatus, SigningStatus};
use sigwarden_metadata::models::*;
use sigwarden_metadata::{
    CertificateRepo, MessageState, MetadataResult, MetadataStore, QueueRepo, SaveOutcome,
    SignatureRepo, SqliteStore, ValidatorRepo,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A test trust store that cleans up on drop.
pub struct TestMetadata {
    pub store: Arc<CountingStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestMetadata {
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let inner = SqliteStore::new(temp_dir.path().join("trust.db"), None).await?;

        Ok(Self {
            store: Arc::new(CountingStore::new(inner)),
            _temp_dir: temp_dir,
        })
    }

    /// The store as the engine and handlers see it.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    /// Record a certificate and open a validation for it.
    pub async fn seed_validation(
        &self,
        thumbprint: &str,
        status: CertificateStatus,
    ) -> (Uuid, i64) {
        let certificate_key = self
            .store
            .add_certificate(thumbprint, status)
            .await
            .unwrap();
        let validation_id = Uuid::new_v4();
        self.store
            .add_certificate_validation(validation_id, certificate_key)
            .await
            .unwrap();
        (validation_id, certificate_key)
    }

    pub async fn validation(&self, validation_id: Uuid, certificate_key: i64) -> CertificateValidation {
        self.store
            .get_certificate_validation(validation_id, certificate_key)
            .await
            .unwrap()
            .expect("validation exists")
    }

    pub async fn certificate(&self, certificate_key: i64) -> Certificate {
        self.store
            .get_certificate(certificate_key)
            .await
            .unwrap()
            .expect("certificate exists")
    }

    /// Record a package version with one signature.
    pub async fn seed_signature(
        &self,
        package_id: &str,
        certificate_key: i64,
        status: SignatureStatus,
        trusted_timestamps: Vec<(i64, OffsetDateTime)>,
    ) -> i64 {
        let package_key = self
            .store
            .add_package(package_id, "1.0.0", SigningStatus::Valid)
            .await
            .unwrap();
        self.store
            .add_package_signature(&NewPackageSignature {
                package_key,
                certificate_key,
                status,
                trusted_timestamps,
            })
            .await
            .unwrap()
    }

    /// Record one package version carrying `count` signatures by one certificate.
    pub async fn seed_signatures(
        &self,
        package_id: &str,
        certificate_key: i64,
        count: usize,
    ) -> Vec<i64> {
        let package_key = self
            .store
            .add_package(package_id, "1.0.0", SigningStatus::Valid)
            .await
            .unwrap();
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self
                .store
                .add_package_signature(&NewPackageSignature {
                    package_key,
                    certificate_key,
                    status: SignatureStatus::Valid,
                    trusted_timestamps: vec![],
                })
                .await
                .unwrap();
            keys.push(key);
        }
        keys
    }

    pub async fn signature(&self, key: i64) -> PackageSignature {
        self.store
            .get_package_signature(key)
            .await
            .unwrap()
            .expect("signature exists")
    }
}

/// Store wrapper that records cascade traffic and can inject conflicts.
pub struct CountingStore {
    inner: SqliteStore,
    /// Size of every dependent-signature page returned.
    pub dependent_pages: Mutex<Vec<usize>>,
    /// Size of every signature batch saved.
    pub signature_saves: Mutex<Vec<usize>>,
    pub validation_saves: AtomicUsize,
    pub validator_saves: AtomicUsize,
    /// Report the next signature save as a conflict without writing.
    pub conflict_next_signature_save: AtomicBool,
    /// Report the next validator status save as a conflict without writing.
    pub conflict_next_validator_save: AtomicBool,
    /// Delay applied to every message lease.
    pub lease_delay: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            dependent_pages: Mutex::new(Vec::new()),
            signature_saves: Mutex::new(Vec::new()),
            validation_saves: AtomicUsize::new(0),
            validator_saves: AtomicUsize::new(0),
            conflict_next_signature_save: AtomicBool::new(false),
            conflict_next_validator_save: AtomicBool::new(false),
            lease_delay: Mutex::new(None),
        }
    }

    pub fn reset_counts(&self) {
        self.dependent_pages.lock().unwrap().clear();
        self.signature_saves.lock().unwrap().clear();
        self.validation_saves.store(0, Ordering::SeqCst);
        self.validator_saves.store(0, Ordering::SeqCst);
    }

    pub fn total_writes(&self) -> usize {
        self.signature_saves.lock().unwrap().len()
            + self.validation_saves.load(Ordering::SeqCst)
            + self.validator_saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for CountingStore {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl CertificateRepo for CountingStore {
    async fn add_certificate(
        &self,
        thumbprint: &str,
        status: CertificateStatus,
    ) -> MetadataResult<i64> {
        self.inner.add_certificate(thumbprint, status).await
    }

    async fn get_certificate(&self, certificate_key: i64) -> MetadataResult<Option<Certificate>> {
        self.inner.get_certificate(certificate_key).await
    }

    async fn get_certificate_by_thumbprint(
        &self,
        thumbprint: &str,
    ) -> MetadataResult<Option<Certificate>> {
        self.inner.get_certificate_by_thumbprint(thumbprint).await
    }

    async fn add_certificate_validation(
        &self,
        validation_id: Uuid,
        certificate_key: i64,
    ) -> MetadataResult<()> {
        self.inner
            .add_certificate_validation(validation_id, certificate_key)
            .await
    }

    async fn get_certificate_validation(
        &self,
        validation_id: Uuid,
        certificate_key: i64,
    ) -> MetadataResult<Option<CertificateValidation>> {
        self.inner
            .get_certificate_validation(validation_id, certificate_key)
            .await
    }

    async fn save_certificate_validation(
        &self,
        validation: &mut CertificateValidation,
    ) -> MetadataResult<SaveOutcome> {
        self.validation_saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_certificate_validation(validation).await
    }
}

#[async_trait]
impl SignatureRepo for CountingStore {
    async fn add_package(
        &self,
        package_id: &str,
        package_version: &str,
        status: SigningStatus,
    ) -> MetadataResult<i64> {
        self.inner
            .add_package(package_id, package_version, status)
            .await
    }

    async fn get_package_signing_state(
        &self,
        package_id: &str,
        package_version: &str,
    ) -> MetadataResult<Option<PackageSigningState>> {
        self.inner
            .get_package_signing_state(package_id, package_version)
            .await
    }

    async fn add_package_signature(&self, signature: &NewPackageSignature) -> MetadataResult<i64> {
        self.inner.add_package_signature(signature).await
    }

    async fn get_package_signature(
        &self,
        package_signature_key: i64,
    ) -> MetadataResult<Option<PackageSignature>> {
        self.inner.get_package_signature(package_signature_key).await
    }

    async fn get_dependent_signatures(
        &self,
        certificate_key: i64,
        after_key: Option<i64>,
        limit: usize,
    ) -> MetadataResult<Vec<PackageSignature>> {
        let page = self
            .inner
            .get_dependent_signatures(certificate_key, after_key, limit)
            .await?;
        self.dependent_pages.lock().unwrap().push(page.len());
        Ok(page)
    }

    async fn save_signatures(
        &self,
        signatures: &mut [PackageSignature],
    ) -> MetadataResult<SaveOutcome> {
        if self
            .conflict_next_signature_save
            .swap(false, Ordering::SeqCst)
        {
            return Ok(SaveOutcome::Conflict);
        }
        self.signature_saves.lock().unwrap().push(signatures.len());
        self.inner.save_signatures(signatures).await
    }
}

#[async_trait]
impl ValidatorRepo for CountingStore {
    async fn add_validator_status(&self, status: &ValidatorStatus) -> MetadataResult<()> {
        self.inner.add_validator_status(status).await
    }

    async fn get_validator_status(
        &self,
        validation_id: Uuid,
    ) -> MetadataResult<Option<ValidatorStatus>> {
        self.inner.get_validator_status(validation_id).await
    }

    async fn save_validator_status(
        &self,
        status: &mut ValidatorStatus,
        signing_state: Option<&SigningStateChange>,
    ) -> MetadataResult<SaveOutcome> {
        if self
            .conflict_next_validator_save
            .swap(false, Ordering::SeqCst)
        {
            return Ok(SaveOutcome::Conflict);
        }
        self.validator_saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_validator_status(status, signing_state).await
    }
}

#[async_trait]
impl QueueRepo for CountingStore {
    async fn enqueue_message(&self, topic: &str, body: &str) -> MetadataResult<Uuid> {
        self.inner.enqueue_message(topic, body).await
    }

    async fn lease_next_message(
        &self,
        topic: &str,
        now: OffsetDateTime,
        lease_until: OffsetDateTime,
    ) -> MetadataResult<Option<LeasedMessage>> {
        let delay = *self.lease_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.lease_next_message(topic, now, lease_until).await
    }

    async fn complete_message(&self, message_id: Uuid) -> MetadataResult<()> {
        self.inner.complete_message(message_id).await
    }

    async fn abandon_message(
        &self,
        message_id: Uuid,
        visible_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        self.inner.abandon_message(message_id, visible_at).await
    }

    async fn dead_letter_message(&self, message_id: Uuid, reason: &str) -> MetadataResult<()> {
        self.inner.dead_letter_message(message_id, reason).await
    }

    async fn count_messages(&self, topic: &str, state: MessageState) -> MetadataResult<u64> {
        self.inner.count_messages(topic, state).await
    }
}
