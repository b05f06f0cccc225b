//! Certificate expiry checks.
//!
//! Connects to `host:443` with the platform trust store and reads the leaf
//! certificate's `notAfter`. Remaining days are floored, so a certificate
//! that expired an hour ago reports `-1`, and one expiring in 23 hours
//! reports `0`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, crypto::ring};

const SECONDS_PER_DAY: i64 = 86_400;
const HTTPS_PORT: u16 = 443;

#[derive(Debug, Error)]
pub enum TlsCheckError {
    #[error("invalid server name: {0}")]
    InvalidHost(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    #[error("peer presented no certificate")]
    NoCertificate,

    #[error("malformed certificate: {0}")]
    Certificate(String),

    #[error("certificate expiry out of range: {0}")]
    ExpiryOutOfRange(i64),
}

/// Source of certificate expiry information
#[async_trait::async_trait]
pub trait CertificateCheck: Send + Sync {
    /// Whole days until the certificate of `host` expires
    async fn days_until_expiry(&self, host: &str) -> Result<i64, TlsCheckError>;
}

/// Whole days from `now` until `not_after`, floored
pub fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Parse the `notAfter` instant out of a DER encoded certificate
pub fn not_after_from_der(der: &[u8]) -> Result<DateTime<Utc>, TlsCheckError> {
    let (_, certificate) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| TlsCheckError::Certificate(e.to_string()))?;

    let timestamp = certificate.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or(TlsCheckError::ExpiryOutOfRange(timestamp))
}

/// TLS expiry checker backed by rustls
pub struct TlsExpiryChecker {
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsExpiryChecker {
    /// Build a checker trusting the platform root certificates
    pub fn new(timeout: Duration) -> Result<Self> {
        let native = rustls_native_certs::load_native_certs();
        for error in &native.errors {
            tracing::warn!(%error, "Failed to load a native root certificate");
        }

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        tracing::debug!(added, ignored, "Loaded native root certificates");

        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self { connector: TlsConnector::from(Arc::new(config)), timeout })
    }

    async fn fetch_not_after(&self, host: &str) -> Result<DateTime<Utc>, TlsCheckError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| TlsCheckError::InvalidHost(host.to_string()))?;

        let stream = TcpStream::connect((host, HTTPS_PORT)).await.map_err(TlsCheckError::Connect)?;
        let tls = self.connector.connect(server_name, stream).await.map_err(TlsCheckError::Handshake)?;

        let (_, session) = tls.get_ref();
        let leaf = session
            .peer_certificates()
            .and_then(|chain| chain.first())
            .ok_or(TlsCheckError::NoCertificate)?;

        not_after_from_der(leaf.as_ref())
    }
}

#[async_trait::async_trait]
impl CertificateCheck for TlsExpiryChecker {
    async fn days_until_expiry(&self, host: &str) -> Result<i64, TlsCheckError> {
        let not_after = tokio::time::timeout(self.timeout, self.fetch_not_after(host))
            .await
            .map_err(|_| TlsCheckError::Timeout(self.timeout))??;

        Ok(days_until(not_after, Utc::now()))
    }
}
