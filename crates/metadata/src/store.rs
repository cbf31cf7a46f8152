//! Trust store trait and the SQLite implementation.

use crate::error::MetadataResult;
use crate::repos::{CertificateRepo, QueueRepo, SignatureRepo, ValidatorRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined trust store trait.
#[async_trait]
pub trait MetadataStore:
    CertificateRepo + SignatureRepo + ValidatorRepo + QueueRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based trust store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600); // 10 minutes default

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers; concurrent workers queue on
            // the pool instead of failing with "database is locked".
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(query_timeout_secs))
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(
            path = %path.display(),
            query_timeout_secs = query_timeout_secs,
            "SQLite trust store opened"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::error::MetadataError;
    use crate::models::*;
    use crate::repos::{MessageState, SaveOutcome};
    use sigwarden_core::{CertificateStatus, SigningStatus};
    use sqlx::QueryBuilder;
    use std::collections::{HashMap, HashSet};
    use time::OffsetDateTime;
    use uuid::Uuid;

    /// Map UNIQUE and FOREIGN KEY violations to typed errors, pass anything else through.
    fn map_constraint_violation(err: sqlx::Error, what: impl FnOnce() -> String) -> MetadataError {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                MetadataError::AlreadyExists(what())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                MetadataError::Constraint(format!("{} references a missing record", what()))
            }
            other => MetadataError::Database(other),
        }
    }

    /// Queue visibility is compared numerically, so it is stored as unix milliseconds.
    fn unix_ms(at: OffsetDateTime) -> i64 {
        i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
    }

    impl SqliteStore {
        /// Load trusted timestamps and signing states for a batch of signature rows.
        async fn hydrate_signatures(
            &self,
            rows: Vec<PackageSignatureRow>,
        ) -> MetadataResult<Vec<PackageSignature>> {
            if rows.is_empty() {
                return Ok(Vec::new());
            }

            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT * FROM trusted_timestamps WHERE package_signature_key IN (",
            );
            let mut keys = qb.separated(", ");
            for row in &rows {
                keys.push_bind(row.package_signature_key);
            }
            keys.push_unseparated(") ORDER BY trusted_timestamp_key");
            let timestamp_rows = qb
                .build_query_as::<TrustedTimestampRow>()
                .fetch_all(&self.pool)
                .await?;

            let mut timestamps: HashMap<i64, Vec<TrustedTimestamp>> = HashMap::new();
            for ts in timestamp_rows {
                timestamps
                    .entry(ts.package_signature_key)
                    .or_default()
                    .push(ts.into());
            }

            let package_keys: HashSet<i64> = rows.iter().map(|r| r.package_key).collect();
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT * FROM package_signing_states WHERE package_key IN (",
            );
            let mut keys = qb.separated(", ");
            for key in &package_keys {
                keys.push_bind(*key);
            }
            keys.push_unseparated(")");
            let state_rows = qb
                .build_query_as::<PackageSigningStateRow>()
                .fetch_all(&self.pool)
                .await?;

            let mut states = HashMap::with_capacity(state_rows.len());
            for row in state_rows {
                let state = PackageSigningState::try_from(row)?;
                states.insert(state.package_key, state);
            }

            rows.into_iter()
                .map(|row| {
                    let signing_state = states.get(&row.package_key).cloned().ok_or_else(|| {
                        MetadataError::Internal(format!(
                            "signature {} references missing package {}",
                            row.package_signature_key, row.package_key
                        ))
                    })?;
                    let ts = timestamps
                        .remove(&row.package_signature_key)
                        .unwrap_or_default();
                    PackageSignature::from_rows(row, ts, signing_state)
                })
                .collect()
        }
    }

    #[async_trait]
    impl CertificateRepo for SqliteStore {
        async fn add_certificate(
            &self,
            thumbprint: &str,
            status: CertificateStatus,
        ) -> MetadataResult<i64> {
            let result = sqlx::query(
                "INSERT INTO certificates (thumbprint, status, validation_failures, row_version) VALUES (?, ?, 0, 0)",
            )
            .bind(thumbprint)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_constraint_violation(e, || format!("certificate {thumbprint}")))?;
            Ok(result.last_insert_rowid())
        }

        async fn get_certificate(
            &self,
            certificate_key: i64,
        ) -> MetadataResult<Option<Certificate>> {
            let row = sqlx::query_as::<_, CertificateRow>(
                "SELECT * FROM certificates WHERE certificate_key = ?",
            )
            .bind(certificate_key)
            .fetch_optional(&self.pool)
            .await?;
            row.map(Certificate::try_from).transpose()
        }

        async fn get_certificate_by_thumbprint(
            &self,
            thumbprint: &str,
        ) -> MetadataResult<Option<Certificate>> {
            let row =
                sqlx::query_as::<_, CertificateRow>("SELECT * FROM certificates WHERE thumbprint = ?")
                    .bind(thumbprint)
                    .fetch_optional(&self.pool)
                    .await?;
            row.map(Certificate::try_from).transpose()
        }

        async fn add_certificate_validation(
            &self,
            validation_id: Uuid,
            certificate_key: i64,
        ) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO certificate_validations (validation_id, certificate_key, status, row_version) VALUES (?, ?, NULL, 0)",
            )
            .bind(validation_id)
            .bind(certificate_key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_constraint_violation(e, || {
                    format!("validation {validation_id} for certificate {certificate_key}")
                })
            })?;
            Ok(())
        }

        async fn get_certificate_validation(
            &self,
            validation_id: Uuid,
            certificate_key: i64,
        ) -> MetadataResult<Option<CertificateValidation>> {
            let Some(row) = sqlx::query_as::<_, CertificateValidationRow>(
                "SELECT * FROM certificate_validations WHERE validation_id = ? AND certificate_key = ?",
            )
            .bind(validation_id)
            .bind(certificate_key)
            .fetch_optional(&self.pool)
            .await?
            else {
                return Ok(None);
            };

            let certificate = sqlx::query_as::<_, CertificateRow>(
                "SELECT * FROM certificates WHERE certificate_key = ?",
            )
            .bind(certificate_key)
            .fetch_one(&self.pool)
            .await?;

            CertificateValidation::from_rows(row, certificate).map(Some)
        }

        async fn save_certificate_validation(
            &self,
            validation: &mut CertificateValidation,
        ) -> MetadataResult<SaveOutcome> {
            let mut tx = self.pool.begin().await?;
            let certificate = &validation.certificate;

            let result = sqlx::query(
                r#"
                UPDATE certificates
                SET status = ?, validation_failures = ?, last_verification_time = ?,
                    revocation_time = ?, status_update_time = ?, next_status_update_time = ?,
                    row_version = row_version + 1
                WHERE certificate_key = ? AND row_version = ?
                "#,
            )
            .bind(certificate.status.as_str())
            .bind(i64::from(certificate.validation_failures))
            .bind(certificate.last_verification_time)
            .bind(certificate.revocation_time)
            .bind(certificate.status_update_time)
            .bind(certificate.next_status_update_time)
            .bind(certificate.key)
            .bind(certificate.row_version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(SaveOutcome::Conflict);
            }

            let result = sqlx::query(
                r#"
                UPDATE certificate_validations
                SET status = ?, row_version = row_version + 1
                WHERE validation_id = ? AND certificate_key = ? AND row_version = ?
                "#,
            )
            .bind(validation.status.map(|s| s.as_str()))
            .bind(validation.validation_id)
            .bind(validation.certificate_key)
            .bind(validation.row_version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(SaveOutcome::Conflict);
            }

            tx.commit().await?;

            validation.row_version += 1;
            validation.certificate.row_version += 1;
            Ok(SaveOutcome::Saved)
        }
    }

    #[async_trait]
    impl SignatureRepo for SqliteStore {
        async fn add_package(
            &self,
            package_id: &str,
            package_version: &str,
            status: SigningStatus,
        ) -> MetadataResult<i64> {
            let result = sqlx::query(
                "INSERT INTO package_signing_states (package_id, package_version, signing_status, row_version) VALUES (?, ?, ?, 0)",
            )
            .bind(package_id)
            .bind(package_version)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_constraint_violation(e, || format!("package {package_id} {package_version}")))?;
            Ok(result.last_insert_rowid())
        }

        async fn get_package_signing_state(
            &self,
            package_id: &str,
            package_version: &str,
        ) -> MetadataResult<Option<PackageSigningState>> {
            let row = sqlx::query_as::<_, PackageSigningStateRow>(
                "SELECT * FROM package_signing_states WHERE package_id = ? AND package_version = ?",
            )
            .bind(package_id)
            .bind(package_version)
            .fetch_optional(&self.pool)
            .await?;
            row.map(PackageSigningState::try_from).transpose()
        }

        async fn add_package_signature(
            &self,
            signature: &NewPackageSignature,
        ) -> MetadataResult<i64> {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "INSERT INTO package_signatures (package_key, certificate_key, status, created_at, row_version) VALUES (?, ?, ?, ?, 0)",
            )
            .bind(signature.package_key)
            .bind(signature.certificate_key)
            .bind(signature.status.as_str())
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await?;
            let signature_key = result.last_insert_rowid();

            for (certificate_key, value) in &signature.trusted_timestamps {
                sqlx::query(
                    "INSERT INTO trusted_timestamps (package_signature_key, certificate_key, value) VALUES (?, ?, ?)",
                )
                .bind(signature_key)
                .bind(*certificate_key)
                .bind(*value)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(signature_key)
        }

        async fn get_package_signature(
            &self,
            package_signature_key: i64,
        ) -> MetadataResult<Option<PackageSignature>> {
            let row = sqlx::query_as::<_, PackageSignatureRow>(
                "SELECT * FROM package_signatures WHERE package_signature_key = ?",
            )
            .bind(package_signature_key)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(row) => Ok(self.hydrate_signatures(vec![row]).await?.pop()),
                None => Ok(None),
            }
        }

        async fn get_dependent_signatures(
            &self,
            certificate_key: i64,
            after_key: Option<i64>,
            limit: usize,
        ) -> MetadataResult<Vec<PackageSignature>> {
            let rows = sqlx::query_as::<_, PackageSignatureRow>(
                r#"
                SELECT s.* FROM package_signatures s
                WHERE s.package_signature_key > ?
                  AND (s.certificate_key = ?
                       OR EXISTS (SELECT 1 FROM trusted_timestamps t
                                  WHERE t.package_signature_key = s.package_signature_key
                                    AND t.certificate_key = ?))
                ORDER BY s.package_signature_key
                LIMIT ?
                "#,
            )
            .bind(after_key.unwrap_or(i64::MIN))
            .bind(certificate_key)
            .bind(certificate_key)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

            self.hydrate_signatures(rows).await
        }

        async fn save_signatures(
            &self,
            signatures: &mut [PackageSignature],
        ) -> MetadataResult<SaveOutcome> {
            if signatures.is_empty() {
                return Ok(SaveOutcome::Saved);
            }

            let mut tx = self.pool.begin().await?;

            for signature in signatures.iter() {
                let result = sqlx::query(
                    "UPDATE package_signatures SET status = ?, row_version = row_version + 1 WHERE package_signature_key = ? AND row_version = ?",
                )
                .bind(signature.status.as_str())
                .bind(signature.key)
                .bind(signature.row_version)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    tx.rollback().await?;
                    return Ok(SaveOutcome::Conflict);
                }
            }

            let mut written = HashSet::new();
            for signature in signatures.iter() {
                let state = &signature.signing_state;
                if !written.insert(state.package_key) {
                    continue;
                }

                let result = sqlx::query(
                    "UPDATE package_signing_states SET signing_status = ?, row_version = row_version + 1 WHERE package_key = ? AND row_version = ?",
                )
                .bind(state.status.as_str())
                .bind(state.package_key)
                .bind(state.row_version)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    tx.rollback().await?;
                    return Ok(SaveOutcome::Conflict);
                }
            }

            tx.commit().await?;

            for signature in signatures.iter_mut() {
                signature.row_version += 1;
                signature.signing_state.row_version += 1;
            }
            Ok(SaveOutcome::Saved)
        }
    }

    #[async_trait]
    impl ValidatorRepo for SqliteStore {
        async fn add_validator_status(&self, status: &ValidatorStatus) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO validator_statuses
                    (validation_id, validator_name, package_id, package_version, state, created_at, updated_at, row_version)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(status.validation_id)
            .bind(&status.validator_name)
            .bind(&status.package_id)
            .bind(&status.package_version)
            .bind(status.state.as_str())
            .bind(status.created_at)
            .bind(status.updated_at)
            .bind(status.row_version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_constraint_violation(e, || format!("validator status {}", status.validation_id))
            })?;
            Ok(())
        }

        async fn get_validator_status(
            &self,
            validation_id: Uuid,
        ) -> MetadataResult<Option<ValidatorStatus>> {
            let row = sqlx::query_as::<_, ValidatorStatusRow>(
                "SELECT * FROM validator_statuses WHERE validation_id = ?",
            )
            .bind(validation_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(ValidatorStatus::try_from).transpose()
        }

        async fn save_validator_status(
            &self,
            status: &mut ValidatorStatus,
            signing_state: Option<&SigningStateChange>,
        ) -> MetadataResult<SaveOutcome> {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                UPDATE validator_statuses
                SET state = ?, updated_at = ?, row_version = row_version + 1
                WHERE validation_id = ? AND row_version = ?
                "#,
            )
            .bind(status.state.as_str())
            .bind(status.updated_at)
            .bind(status.validation_id)
            .bind(status.row_version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(SaveOutcome::Conflict);
            }

            if let Some(change) = signing_state {
                sqlx::query(
                    r#"
                    INSERT INTO package_signing_states (package_id, package_version, signing_status, row_version)
                    VALUES (?, ?, ?, 0)
                    ON CONFLICT(package_id, package_version) DO UPDATE
                    SET signing_status = excluded.signing_status, row_version = row_version + 1
                    "#,
                )
                .bind(&change.package_id)
                .bind(&change.package_version)
                .bind(change.status.as_str())
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;

            status.row_version += 1;
            Ok(SaveOutcome::Saved)
        }
    }

    #[async_trait]
    impl QueueRepo for SqliteStore {
        async fn enqueue_message(&self, topic: &str, body: &str) -> MetadataResult<Uuid> {
            let message_id = Uuid::new_v4();
            let now = OffsetDateTime::now_utc();
            sqlx::query(
                r#"
                INSERT INTO queue_messages
                    (message_id, topic, body, state, delivery_count, enqueued_at, visible_at_ms)
                VALUES (?, ?, ?, 'active', 0, ?, ?)
                "#,
            )
            .bind(message_id)
            .bind(topic)
            .bind(body)
            .bind(now)
            .bind(unix_ms(now))
            .execute(&self.pool)
            .await?;
            Ok(message_id)
        }

        async fn lease_next_message(
            &self,
            topic: &str,
            now: OffsetDateTime,
            lease_until: OffsetDateTime,
        ) -> MetadataResult<Option<LeasedMessage>> {
            let mut tx = self.pool.begin().await?;

            let Some(mut row) = sqlx::query_as::<_, QueueMessageRow>(
                r#"
                SELECT * FROM queue_messages
                WHERE topic = ? AND state = 'active' AND visible_at_ms <= ?
                ORDER BY sequence
                LIMIT 1
                "#,
            )
            .bind(topic)
            .bind(unix_ms(now))
            .fetch_optional(&mut *tx)
            .await?
            else {
                tx.commit().await?;
                return Ok(None);
            };

            let result = sqlx::query(
                r#"
                UPDATE queue_messages
                SET delivery_count = delivery_count + 1, visible_at_ms = ?
                WHERE sequence = ? AND delivery_count = ?
                "#,
            )
            .bind(unix_ms(lease_until))
            .bind(row.sequence)
            .bind(row.delivery_count)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            if result.rows_affected() == 0 {
                return Ok(None);
            }

            row.delivery_count += 1;
            Ok(Some(row.into()))
        }

        async fn complete_message(&self, message_id: Uuid) -> MetadataResult<()> {
            sqlx::query("DELETE FROM queue_messages WHERE message_id = ?")
                .bind(message_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn abandon_message(
            &self,
            message_id: Uuid,
            visible_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE queue_messages SET visible_at_ms = ? WHERE message_id = ? AND state = 'active'",
            )
            .bind(unix_ms(visible_at))
            .bind(message_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "active message {message_id} not found"
                )));
            }
            Ok(())
        }

        async fn dead_letter_message(&self, message_id: Uuid, reason: &str) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE queue_messages SET state = 'dead_lettered', dead_letter_reason = ? WHERE message_id = ?",
            )
            .bind(reason)
            .bind(message_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "message {message_id} not found"
                )));
            }
            Ok(())
        }

        async fn count_messages(&self, topic: &str, state: MessageState) -> MetadataResult<u64> {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE topic = ? AND state = ?")
                    .bind(topic)
                    .bind(state.as_str())
                    .fetch_one(&self.pool)
                    .await?;
            Ok(u64::try_from(count).unwrap_or(0))
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS certificates (
    certificate_key INTEGER PRIMARY KEY AUTOINCREMENT,
    thumbprint TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    validation_failures INTEGER NOT NULL DEFAULT 0,
    last_verification_time TEXT,
    revocation_time TEXT,
    status_update_time TEXT,
    next_status_update_time TEXT,
    row_version INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS certificate_validations (
    validation_id BLOB NOT NULL,
    certificate_key INTEGER NOT NULL REFERENCES certificates(certificate_key),
    status TEXT,
    row_version INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (validation_id, certificate_key)
);
CREATE INDEX IF NOT EXISTS idx_certificate_validations_certificate ON certificate_validations(certificate_key);

CREATE TABLE IF NOT EXISTS package_signing_states (
    package_key INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id TEXT NOT NULL,
    package_version TEXT NOT NULL,
    signing_status TEXT NOT NULL,
    row_version INTEGER NOT NULL DEFAULT 0,
    UNIQUE(package_id, package_version)
);

CREATE TABLE IF NOT EXISTS package_signatures (
    package_signature_key INTEGER PRIMARY KEY AUTOINCREMENT,
    package_key INTEGER NOT NULL REFERENCES package_signing_states(package_key),
    certificate_key INTEGER NOT NULL REFERENCES certificates(certificate_key),
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    row_version INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_package_signatures_certificate ON package_signatures(certificate_key);
CREATE INDEX IF NOT EXISTS idx_package_signatures_package ON package_signatures(package_key);

CREATE TABLE IF NOT EXISTS trusted_timestamps (
    trusted_timestamp_key INTEGER PRIMARY KEY AUTOINCREMENT,
    package_signature_key INTEGER NOT NULL REFERENCES package_signatures(package_signature_key),
    certificate_key INTEGER NOT NULL REFERENCES certificates(certificate_key),
    value TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trusted_timestamps_signature ON trusted_timestamps(package_signature_key);
CREATE INDEX IF NOT EXISTS idx_trusted_timestamps_certificate ON trusted_timestamps(certificate_key);

CREATE TABLE IF NOT EXISTS validator_statuses (
    validation_id BLOB PRIMARY KEY,
    validator_name TEXT NOT NULL,
    package_id TEXT NOT NULL,
    package_version TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    row_version INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS queue_messages (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id BLOB NOT NULL UNIQUE,
    topic TEXT NOT NULL,
    body TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'active',
    delivery_count INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL,
    visible_at_ms INTEGER NOT NULL,
    dead_letter_reason TEXT
);
CREATE INDEX IF NOT EXISTS idx_queue_messages_visible ON queue_messages(topic, state, visible_at_ms, sequence);
"#;
