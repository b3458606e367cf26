use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_native_certs::CertificateResult;
use thiserror::Error;
use tracing::debug;

/// Errors from Rustls
#[derive(Debug, Error)]
pub enum Error {
    /// Identity PEM is invalid
    #[error("identity PEM is invalid: {0}")]
    InvalidIdentityPem(#[source] rustls::pki_types::pem::Error),

    /// Identity PEM is missing a private key: the key must be PKCS8 or RSA/PKCS1
    #[error("identity PEM is missing a private key: the key must be PKCS8 or RSA/PKCS1")]
    MissingPrivateKey,

    /// Identity PEM is missing certificate
    #[error("identity PEM is missing certificate")]
    MissingCertificate,

    /// Invalid private key
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(#[source] rustls::Error),

    /// Unknown private key format
    #[error("unknown private key format")]
    UnknownPrivateKeyFormat,

    /// Failed to parse PEM-encoded certificates
    #[error("failed to parse PEM-encoded certificates: {0}")]
    ParseCertificates(#[source] pem::PemError),

    /// Failed to add a root certificate
    #[error("failed to add a root certificate: {0}")]
    AddRootCertificate(#[source] rustls::Error),

    /// The crypto provider rejected the default protocol versions
    #[error("build tls client config failed: {0}")]
    Build(#[source] rustls::Error),
}

/// Certificates and keys needed to talk to the API server.
///
/// Only the raw material is kept here, the rustls config is built by
/// [`TlsMaterial::client_config`] when a client is created.
#[derive(Clone, Debug, Default)]
pub struct TlsMaterial {
    /// DER encoded root certificates. The platform's native roots are used
    /// when empty.
    pub root_certs: Vec<Vec<u8>>,

    /// PEM encoded client key followed by its certificate chain.
    pub identity: Option<Vec<u8>>,

    /// Skips the validity check for the server's certificate.
    pub insecure_skip_verify: bool,
}

impl TlsMaterial {
    pub fn client_config(&self) -> Result<ClientConfig, Error> {
        let root_store = if self.root_certs.is_empty() {
            native_root_store()
        } else {
            let mut root_store = RootCertStore::empty();
            for cert in &self.root_certs {
                root_store
                    .add(CertificateDer::from(cert.clone()))
                    .map_err(Error::AddRootCertificate)?;
            }
            root_store
        };

        let builder =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()
                .map_err(Error::Build)?
                .with_root_certificates(root_store);

        let mut config = match &self.identity {
            Some(identity) => {
                let (chain, key) = client_auth(identity)?;
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(Error::InvalidPrivateKey)?
            }
            None => builder.with_no_client_auth(),
        };

        if self.insecure_skip_verify {
            config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoCertificateVerification));
        }

        Ok(config)
    }
}

/// Parses every `CERTIFICATE` block of a PEM bundle into DER.
pub fn parse_certificates(data: impl AsRef<[u8]>) -> Result<Vec<Vec<u8>>, Error> {
    let certs = pem::parse_many(data)
        .map_err(Error::ParseCertificates)?
        .into_iter()
        .filter_map(|p| {
            if p.tag() == "CERTIFICATE" {
                Some(p.into_contents())
            } else {
                None
            }
        })
        .collect();

    Ok(certs)
}

fn native_root_store() -> RootCertStore {
    let CertificateResult { certs, errors, .. } = rustls_native_certs::load_native_certs();
    for err in errors {
        debug!(
            message = "load native certificate failed",
            %err
        );
    }

    let mut root_store = RootCertStore::empty();
    for cert in certs {
        if let Err(err) = root_store.add(cert) {
            debug!(
                message = "certificate parse failed",
                %err
            );
        }
    }

    if root_store.is_empty() {
        debug!(message = "no valid native root CA certificates found");
    }

    root_store
}

pub fn client_auth(
    data: &[u8],
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), Error> {
    use rustls::pki_types::pem::{self, SectionKind};

    let mut cert_chain = Vec::new();
    let mut pkcs8_key = None;
    let mut pkcs1_key = None;
    let mut sec1_key = None;
    let mut reader = std::io::Cursor::new(data);
    while let Some((kind, der)) = pem::from_buf(&mut reader).map_err(Error::InvalidIdentityPem)? {
        match kind {
            SectionKind::Certificate => cert_chain.push(der.into()),
            SectionKind::PrivateKey => pkcs8_key = Some(PrivateKeyDer::Pkcs8(der.into())),
            SectionKind::RsaPrivateKey => pkcs1_key = Some(PrivateKeyDer::Pkcs1(der.into())),
            SectionKind::EcPrivateKey => sec1_key = Some(PrivateKeyDer::Sec1(der.into())),
            _ => return Err(Error::UnknownPrivateKeyFormat),
        }
    }

    let private_key = pkcs8_key
        .or(pkcs1_key)
        .or(sec1_key)
        .ok_or(Error::MissingPrivateKey)?;

    if cert_chain.is_empty() {
        return Err(Error::MissingCertificate);
    }

    Ok((cert_chain, private_key))
}

#[derive(Debug)]
pub struct NoCertificateVerification;

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer,
        _intermediates: &[CertificateDer],
        _server_name: &ServerName,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        tracing::warn!("Server cert bypassed");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
