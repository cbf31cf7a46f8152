//! Validator status repository.

use crate::error::MetadataResult;
use crate::models::{SigningStateChange, ValidatorStatus};
use crate::repos::SaveOutcome;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for per-request validator status.
#[async_trait]
pub trait ValidatorRepo: Send + Sync {
    /// Record a new validator status.
    async fn add_validator_status(&self, status: &ValidatorStatus) -> MetadataResult<()>;

    /// Get the validator status for a validation request.
    async fn get_validator_status(
        &self,
        validation_id: Uuid,
    ) -> MetadataResult<Option<ValidatorStatus>>;

    /// Persist a validator status, optionally with the package's signing
    /// state, in one transaction.
    ///
    /// The signing state is created if the package has none yet.
    async fn save_validator_status(
        &self,
        status: &mut ValidatorStatus,
        signing_state: Option<&SigningStateChange>,
    ) -> MetadataResult<SaveOutcome>;
}
