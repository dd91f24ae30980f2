//! TLS certificate expiry check (spec §4.2 "SSL").
//!
//! Connects with SNI and inspects the peer's leaf certificate regardless of
//! trust chain validity — the check cares about expiry, not trust, so
//! verification is intentionally disabled in favor of reading whatever
//! certificate the server presents.

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

pub struct SslProbe;

/// Accepts any certificate chain; the point of this probe is to read the
/// certificate's expiry, not to validate trust.
#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

fn connector() -> TlsConnector {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Parse `host:port`, defaulting the port to 443 when absent.
fn parse_host_port(target: &str) -> (String, u16) {
    let without_scheme = target.trim_start_matches("https://").trim_start_matches("http://");
    let bare = without_scheme.split('/').next().unwrap_or(without_scheme);
    match bare.rsplit_once(':') {
        Some((host, port)) => port.parse().map(|p| (host.to_string(), p)).unwrap_or((bare.to_string(), 443)),
        None => (bare.to_string(), 443),
    }
}

#[async_trait]
impl Probe for SslProbe {
    async fn check(&self, target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let cfg = config.ssl_config.clone().unwrap_or_default();
        let (host, port) = parse_host_port(target);
        let start = Instant::now();

        let server_name = match rustls::pki_types::ServerName::try_from(host.clone()) {
            Ok(n) => n,
            Err(e) => return ProbeOutcome::down(format!("Invalid hostname for SNI: {e}")),
        };

        let connect = async {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            connector().connect(server_name, stream).await
        };

        let tls_stream = match tokio::time::timeout(deadline, connect).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("TLS connect failed: {e}")),
            Ok(Ok(s)) => s,
        };

        let (_, session) = tls_stream.get_ref();
        let leaf = match session.peer_certificates().and_then(|certs| certs.first()) {
            Some(c) => c.clone(),
            None => return ProbeOutcome::down("No peer certificate presented"),
        };

        let (_, parsed) = match x509_parser::parse_x509_certificate(leaf.as_ref()) {
            Ok(p) => p,
            Err(e) => return ProbeOutcome::down(format!("Failed to parse certificate: {e}")),
        };

        let not_after = parsed.validity().not_after;
        let valid_to = not_after.to_rfc2822().unwrap_or_else(|_| not_after.to_string());
        let now_secs = chrono::Utc::now().timestamp();
        let expires_in_secs = not_after.timestamp() - now_secs;
        let warning_secs = (cfg.warning_days as i64) * 86_400;

        let rt = crate::elapsed_ms(start);
        if expires_in_secs <= 0 {
            ProbeOutcome::down(format!("Certificate already expired (valid_to: {valid_to})"))
        } else if expires_in_secs <= warning_secs {
            ProbeOutcome::down(format!(
                "Certificate expires within {} day warning window (valid_to: {valid_to})",
                cfg.warning_days
            ))
        } else {
            ProbeOutcome::up(format!("Certificate valid (valid_to: {valid_to})"), Some(rt))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_default_port() {
        assert_eq!(parse_host_port("example.com"), ("example.com".to_string(), 443));
        assert_eq!(parse_host_port("example.com:8443"), ("example.com".to_string(), 8443));
        assert_eq!(
            parse_host_port("https://example.com/path"),
            ("example.com".to_string(), 443)
        );
    }
}
