use std::env;
use std::path::PathBuf;

use super::tls::{TlsMaterial, parse_certificates};
use super::{Auth, Config, RefreshableToken};

const SERVICE_HOSTENV: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORTENV: &str = "KUBERNETES_SERVICE_PORT";

// Mounted credential files
const SERVICE_TOKENFILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_CERTFILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const SERVICE_DEFAULT_NS: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Errors from loading in-cluster config
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to read the default namespace for the service account
    #[error("failed to read the default namespace: {0}")]
    ReadDefaultNamespace(#[source] std::io::Error),

    /// Failed to read the in-cluster environment variables
    #[error("failed to read an in-cluster environment variable {0}, {1}")]
    ReadEnvironmentVariable(&'static str, #[source] env::VarError),

    /// Failed to read a certificate
    #[error("failed to read the certificate file {0}")]
    ReadCertificate(#[source] std::io::Error),

    /// Failed to parse cluster port value
    #[error("failed to parse cluster port: {0}")]
    ParseClusterPort(#[source] std::num::ParseIntError),

    /// Failed to parse cluster url
    #[error("failed to parse cluster uri: {0}")]
    ParseClusterUri(#[source] http::uri::InvalidUri),

    /// Failed to parse PEM-encoded certificates
    #[error("failed to parse PEM-encoded certificates: {0}")]
    ParseCertificates(#[source] super::tls::Error),

    /// Failed to read token file
    #[error("failed to read token file: '{1:?}': {0}")]
    ReadTokenFile(#[source] std::io::Error, PathBuf),
}

/// Whether the in-cluster environment variables are present
pub fn in_cluster() -> bool {
    env::var_os(SERVICE_HOSTENV).is_some() && env::var_os(SERVICE_PORTENV).is_some()
}

pub fn incluster_env() -> Result<Config, Error> {
    let cluster_url = try_uri()?;
    let default_namespace = load_default_namespace()?;
    let root_certs = load_root_certs()?;
    let refreshable_token = RefreshableToken::new(PathBuf::from(SERVICE_TOKENFILE))
        .map_err(|err| Error::ReadTokenFile(err, SERVICE_TOKENFILE.into()))?;

    Ok(Config {
        cluster_url: Some(cluster_url),
        default_namespace,
        auth: Auth::RefreshableToken(refreshable_token),
        tls: TlsMaterial {
            root_certs,
            identity: None,
            insecure_skip_verify: false,
        },
    })
}

/// Returns the URI of the Kubernetes API server by reading the
/// `KUBERNETES_SERVICE_HOST` and `KUBERNETES_SERVICE_PORT` environment
/// variables.
fn try_uri() -> Result<http::Uri, Error> {
    let host = env::var(SERVICE_HOSTENV)
        .map_err(|err| Error::ReadEnvironmentVariable(SERVICE_HOSTENV, err))?;
    let port = env::var(SERVICE_PORTENV)
        .map_err(|err| Error::ReadEnvironmentVariable(SERVICE_PORTENV, err))?
        .parse::<u16>()
        .map_err(Error::ParseClusterPort)?;

    format_uri(&host, port)
        .parse()
        .map_err(Error::ParseClusterUri)
}

/// Format a host and, if not using 443, a port.
///
/// Ensure that IPv6 addresses are properly bracketed.
fn format_uri(host: &str, port: u16) -> String {
    const HTTPS: &str = "https";

    match host.parse::<std::net::IpAddr>() {
        Ok(ip) => {
            let ip = if ip.is_ipv6() {
                format!("[{ip}]")
            } else {
                ip.to_string()
            };

            if port == 443 {
                format!("{HTTPS}://{ip}")
            } else {
                format!("{HTTPS}://{ip}:{port}")
            }
        }
        Err(_err) => {
            if port == 443 {
                format!("{HTTPS}://{host}")
            } else {
                format!("{HTTPS}://{host}:{port}")
            }
        }
    }
}

/// Returns the default namespace from specified path in cluster.
fn load_default_namespace() -> Result<String, Error> {
    std::fs::read_to_string(SERVICE_DEFAULT_NS)
        .map(|ns| ns.trim().to_string())
        .map_err(Error::ReadDefaultNamespace)
}

/// Returns the cluster CA certificates from specified path in cluster
fn load_root_certs() -> Result<Vec<Vec<u8>>, Error> {
    let data = std::fs::read(SERVICE_CERTFILE).map_err(Error::ReadCertificate)?;
    parse_certificates(data).map_err(Error::ParseCertificates)
}
