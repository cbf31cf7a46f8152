//! Trust pipeline workers for Sigwarden.
//!
//! This crate provides the message-driven side of the system:
//! - Certificate validation engine and its invalidation cascade
//! - Signature acceptance handler for uploaded packages
//! - Typed topic producers, subscriptions and worker pools
//! - Process runner with time-boxed drain on shutdown
//! - Prometheus metrics and health endpoints

pub mod acceptance;
pub mod alerts;
pub mod certificates;
pub mod fetcher;
pub mod handlers;
pub mod messaging;
pub mod metrics;
pub mod pool;
pub mod routes;
pub mod runner;
pub mod state;
pub mod verifier;

pub use acceptance::SignatureAcceptanceHandler;
pub use alerts::{AlertSink, TracingAlertSink};
pub use certificates::{ApplyOutcome, CertificateValidationEngine, EngineError, InvalidationPolicy};
pub use fetcher::{HttpPackageFetcher, PackageFetcher};
pub use handlers::{CertificateResultHandler, VerificationRequestHandler};
pub use messaging::{MessageHandler, Subscription, TopicProducer};
pub use pool::{Drainable, WorkerPool};
pub use routes::create_router;
pub use runner::{DrainOutcome, Runner};
pub use state::AppState;
pub use verifier::{CertificateVerifier, UnimplementedVerifier};
