//! Repository traits for trust store operations.

pub mod certificates;
pub mod queue;
pub mod signatures;
pub mod validators;

pub use certificates::CertificateRepo;
pub use queue::{MessageState, QueueRepo};
pub use signatures::SignatureRepo;
pub use validators::ValidatorRepo;

/// Result of an optimistic-concurrency write.
///
/// A conflict means another writer changed one of the rows since it was
/// read. Nothing from the attempted save is durable; the caller re-reads and
/// starts over.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Conflict,
}

impl SaveOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}
