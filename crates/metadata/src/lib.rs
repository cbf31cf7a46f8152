//! Trust store abstraction and implementation for Sigwarden.
//!
//! This crate provides the persisted data model:
//! - Certificates and per-request certificate validations
//! - Package signatures, trusted timestamps and package signing states
//! - Validator status for signature acceptance requests
//! - Durable topic subscriptions backing the message workers
//!
//! Every mutable record carries a row version. Saves that touch several
//! records commit atomically or report [`SaveOutcome::Conflict`].

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use repos::{
    CertificateRepo, MessageState, QueueRepo, SaveOutcome, SignatureRepo, ValidatorRepo,
};
pub use store::{MetadataStore, SqliteStore};

use sigwarden_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a trust store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
