//! Signature acceptance handler.
//!
//! Decides whether an uploaded package may be accepted based on whether it
//! carries a package signature. Unsigned packages are accepted and recorded
//! as unsigned; signed packages are rejected.

use crate::fetcher::PackageFetcher;
use crate::messaging::MessageHandler;
use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use sigwarden_core::{SIGNATURE_ENTRY_NAME, SignatureValidationMessage, SigningStatus, ValidatorState};
use sigwarden_metadata::MetadataStore;
use sigwarden_metadata::models::SigningStateChange;
use std::io::{Read, Seek};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Handles `signature-validation` messages.
pub struct SignatureAcceptanceHandler {
    store: Arc<dyn MetadataStore>,
    fetcher: Arc<dyn PackageFetcher>,
}

impl SignatureAcceptanceHandler {
    pub fn new(store: Arc<dyn MetadataStore>, fetcher: Arc<dyn PackageFetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Download the package into an anonymous temporary file and look for
    /// the signature entry.
    ///
    /// The file has no name on disk and is removed when its handle drops,
    /// whichever way this returns.
    async fn is_signed(&self, uri: &Url) -> anyhow::Result<bool> {
        let mut stream = self
            .fetcher
            .fetch(uri)
            .await
            .with_context(|| format!("failed to fetch {uri}"))?;

        let file = tempfile::tempfile().context("failed to create temporary package file")?;
        let mut file = tokio::fs::File::from_std(file);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("failed to download {uri}"))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        let file = file.into_std().await;
        tokio::task::spawn_blocking(move || has_signature_entry(file))
            .await
            .context("signature inspection task failed")?
    }
}

/// Whether the package archive carries a signature entry at its root.
pub fn has_signature_entry<R: Read + Seek>(reader: R) -> anyhow::Result<bool> {
    let archive = zip::ZipArchive::new(reader).context("package is not a valid archive")?;
    Ok(archive.file_names().any(|name| name == SIGNATURE_ENTRY_NAME))
}

#[async_trait]
impl MessageHandler<SignatureValidationMessage> for SignatureAcceptanceHandler {
    async fn handle(&self, message: &SignatureValidationMessage) -> anyhow::Result<bool> {
        let Some(mut status) = self
            .store
            .get_validator_status(message.validation_id)
            .await?
        else {
            tracing::debug!(
                validation_id = %message.validation_id,
                package_id = %message.package_id,
                package_version = %message.package_version,
                "Validator status not found yet, retrying later"
            );
            return Ok(false);
        };

        if status.state != ValidatorState::Incomplete {
            tracing::info!(
                validation_id = %message.validation_id,
                package_id = %message.package_id,
                package_version = %message.package_version,
                state = %status.state,
                "Validation request already decided, dropping message"
            );
            return Ok(true);
        }

        let signed = self.is_signed(&message.package_content_uri).await?;

        let signing_state = if signed {
            tracing::info!(
                validation_id = %message.validation_id,
                package_id = %message.package_id,
                package_version = %message.package_version,
                "Signed packages are not accepted, rejecting"
            );
            status.state = ValidatorState::Failed;
            None
        } else {
            status.state = ValidatorState::Succeeded;
            Some(SigningStateChange {
                package_id: message.package_id.clone(),
                package_version: message.package_version.clone(),
                status: SigningStatus::Unsigned,
            })
        };
        status.updated_at = OffsetDateTime::now_utc();

        if self
            .store
            .save_validator_status(&mut status, signing_state.as_ref())
            .await?
            .is_conflict()
        {
            tracing::info!(
                validation_id = %message.validation_id,
                "Concurrent write to validator status, retrying later"
            );
            return Ok(false);
        }

        crate::metrics::ACCEPTANCE_DECISIONS
            .with_label_values(&[status.state.as_str()])
            .inc();
        tracing::info!(
            validation_id = %message.validation_id,
            package_id = %message.package_id,
            package_version = %message.package_version,
            signed,
            state = %status.state,
            "Signature validation decided"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[&str]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for name in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"content").unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_signature_entry_detected_at_root() {
        let package = archive(&["lib/contoso.dll", ".signature.p7s"]);
        assert!(has_signature_entry(package).unwrap());
    }

    #[test]
    fn test_nested_signature_entry_does_not_count() {
        let package = archive(&["lib/contoso.dll", "content/.signature.p7s"]);
        assert!(!has_signature_entry(package).unwrap());
    }

    #[test]
    fn test_not_an_archive() {
        assert!(has_signature_entry(Cursor::new(b"plain text".to_vec())).is_err());
    }
}
