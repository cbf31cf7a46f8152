//! Core domain types and configuration for the Sigwarden trust pipeline.
//!
//! This crate defines the data model shared by the other crates:
//! - Certificate status and verification results
//! - Package signature and package signing status
//! - Validator state for signature acceptance requests
//! - Inbound message payloads
//! - Application configuration

pub mod certificate;
pub mod config;
pub mod error;
pub mod message;
pub mod signature;
pub mod validator;

pub use certificate::{CertificateStatus, VerificationResult};
pub use error::{Error, Result};
pub use message::{
    CERTIFICATE_VERIFICATION_TOPIC, CertificateValidationRequest, CertificateVerificationMessage,
    SIGNATURE_VALIDATION_TOPIC, SignatureValidationMessage,
};
pub use signature::{SignatureStatus, SigningStatus};
pub use validator::{PACKAGE_SIGNING_VALIDATOR, ValidatorState};

/// Number of dependent signatures invalidated and persisted per cascade page.
pub const INVALIDATION_PAGE_SIZE: usize = 500;

/// Archive entry whose presence marks a package as signed.
pub const SIGNATURE_ENTRY_NAME: &str = ".signature.p7s";
