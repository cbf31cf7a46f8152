//! Test fixtures: recording collaborators and package archives.

use async_trait::async_trait;
use bytes::Bytes;
use sigwarden_core::CertificateStatus;
use sigwarden_metadata::models::{Certificate, PackageSignature};
use sigwarden_worker::AlertSink;
use sigwarden_worker::fetcher::{ByteStream, FetchError, FetchResult, PackageFetcher};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;
use zip::write::SimpleFileOptions;

/// An alert as recorded by [`RecordingAlerts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    CertificateNeedsReview { certificate_key: i64 },
    SignatureNeedsInvalidation { signature_key: i64, cause: CertificateStatus },
}

/// Alert sink that keeps every alert in memory.
#[derive(Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<Alert>>,
}

#[allow(dead_code)]
impl RecordingAlerts {
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn review_count(&self) -> usize {
        self.all()
            .iter()
            .filter(|a| matches!(a, Alert::CertificateNeedsReview { .. }))
            .count()
    }

    pub fn invalidation_count(&self) -> usize {
        self.all()
            .iter()
            .filter(|a| matches!(a, Alert::SignatureNeedsInvalidation { .. }))
            .count()
    }
}

impl AlertSink for RecordingAlerts {
    fn certificate_needs_review(&self, certificate: &Certificate) {
        self.alerts.lock().unwrap().push(Alert::CertificateNeedsReview {
            certificate_key: certificate.key,
        });
    }

    fn signature_needs_invalidation(
        &self,
        signature: &PackageSignature,
        _certificate: &Certificate,
        cause: CertificateStatus,
    ) {
        self.alerts
            .lock()
            .unwrap()
            .push(Alert::SignatureNeedsInvalidation {
                signature_key: signature.key,
                cause,
            });
    }
}

/// Fetcher serving packages from memory.
#[derive(Default)]
pub struct MemoryFetcher {
    packages: Mutex<HashMap<Url, Bytes>>,
    pub fetches: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryFetcher {
    pub fn insert(&self, uri: &Url, body: Vec<u8>) {
        self.packages
            .lock()
            .unwrap()
            .insert(uri.clone(), Bytes::from(body));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageFetcher for MemoryFetcher {
    async fn fetch(&self, uri: &Url) -> FetchResult<ByteStream> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let body = self
            .packages
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))?;

        // Split into two chunks so the download loop runs more than once.
        let mid = body.len() / 2;
        let chunks: Vec<FetchResult<Bytes>> = vec![Ok(body.slice(..mid)), Ok(body.slice(mid..))];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Build a package archive with the given entry names.
pub fn package_archive(entries: &[&str]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for name in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"package content").unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[allow(dead_code)]
pub fn unsigned_package() -> Vec<u8> {
    package_archive(&["Contoso.Core.nuspec", "lib/net8.0/Contoso.Core.dll"])
}

#[allow(dead_code)]
pub fn signed_package() -> Vec<u8> {
    package_archive(&[
        "Contoso.Core.nuspec",
        "lib/net8.0/Contoso.Core.dll",
        ".signature.p7s",
    ])
}

#[allow(dead_code)]
pub fn package_uri(name: &str) -> Url {
    Url::parse(&format!("https://packages.example.com/{name}.pkg")).unwrap()
}
