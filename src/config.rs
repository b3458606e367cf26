use std::path::{Path, PathBuf};

use kubernetes::config::parse_certificates;
use kubernetes::{Auth, Client, Config, RefreshableToken};
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// Explicit settings for [`K8sConfig::with_options`]. Every field is
/// optional, anything left out is taken from the kubeconfig file or the
/// in-cluster environment.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOptions {
    /// Base URL of the API server, e.g. `https://10.0.0.1:6443`.
    pub api_host: Option<String>,

    /// Namespace used by objects which do not carry one.
    pub namespace: Option<String>,

    /// Path to a kubeconfig file. `$KUBECONFIG` and `~/.kube/config` are
    /// tried when absent.
    pub kubeconfig: Option<PathBuf>,

    /// Context to use instead of the kubeconfig's `current-context`.
    pub context: Option<String>,

    /// Static bearer token.
    pub token: Option<String>,

    /// File holding a bearer token, re-read when it rotates.
    pub token_file: Option<PathBuf>,

    /// PEM bundle of the CAs that sign the API server certificate.
    pub certificate_authority: Option<PathBuf>,

    /// PEM client certificate, requires `client_key`.
    pub client_certificate: Option<PathBuf>,

    /// PEM client key, requires `client_certificate`.
    pub client_key: Option<PathBuf>,

    pub insecure_skip_tls_verify: Option<bool>,
}

/// Where and how to reach the Kubernetes API server.
///
/// Resolution never touches the network, a `K8sConfig` without an api host
/// is valid and simply refuses to list anything.
#[derive(Clone, Debug)]
pub struct K8sConfig {
    api_host: Option<String>,
    inner: Config,
}

impl Default for K8sConfig {
    fn default() -> Self {
        K8sConfig::new()
    }
}

impl K8sConfig {
    /// Infers the configuration from the kubeconfig file or the in-cluster
    /// environment. Nothing found is not an error, the result just has no
    /// api host.
    pub fn new() -> Self {
        let inner = match Config::infer(None) {
            Ok(config) => config,
            Err(err) => {
                debug!(message = "no kubernetes configuration found", %err);
                Config::default()
            }
        };

        K8sConfig::from_config(inner)
    }

    /// Builds a configuration from explicit options layered over the
    /// inferred one. Options which are given but unusable are rejected.
    pub fn with_options(options: ConfigOptions) -> Result<Self> {
        let mut inner = match (&options.kubeconfig, &options.context) {
            (Some(path), context) => Config::from_kubeconfig(path, context.as_deref())
                .map_err(|err| {
                    Error::invalid(format!("kubeconfig: {}: {err}", path.display()))
                })?,
            (None, Some(context)) => Config::infer(Some(context.as_str()))
                .map_err(|err| Error::invalid(format!("context: {context:?}: {err}")))?,
            (None, None) => Config::infer(None).unwrap_or_else(|err| {
                debug!(message = "no kubernetes configuration found", %err);
                Config::default()
            }),
        };

        if let Some(api_host) = &options.api_host {
            inner.cluster_url = Some(parse_api_host(api_host)?);
        }

        if let Some(namespace) = options.namespace {
            validate_namespace(&namespace)?;
            inner.default_namespace = namespace;
        }

        match (options.token, options.token_file) {
            (Some(_), Some(_)) => {
                return Err(Error::invalid(
                    "token and token_file are mutually exclusive",
                ));
            }
            (Some(token), None) => {
                if token.trim().is_empty() {
                    return Err(Error::invalid("token must not be empty"));
                }
                inner.auth = Auth::Bearer { token };
            }
            (None, Some(path)) => {
                let token = RefreshableToken::new(path.clone()).map_err(|err| {
                    Error::invalid(format!("token_file: {}: {err}", path.display()))
                })?;
                inner.auth = Auth::RefreshableToken(token);
            }
            (None, None) => {}
        }

        if let Some(path) = &options.certificate_authority {
            let data = read_file("certificate_authority", path)?;
            let certs = parse_certificates(&data).map_err(|err| {
                Error::invalid(format!("certificate_authority: {}: {err}", path.display()))
            })?;
            if certs.is_empty() {
                return Err(Error::invalid(format!(
                    "certificate_authority: {}: no certificate found",
                    path.display()
                )));
            }
            inner.tls.root_certs = certs;
        }

        match (&options.client_certificate, &options.client_key) {
            (Some(cert), Some(key)) => {
                let mut identity = read_file("client_key", key)?;
                identity.extend(read_file("client_certificate", cert)?);
                inner.tls.identity = Some(identity);
            }
            (Some(_), None) => {
                return Err(Error::invalid("client_certificate requires client_key"));
            }
            (None, Some(_)) => {
                return Err(Error::invalid("client_key requires client_certificate"));
            }
            (None, None) => {}
        }

        if let Some(insecure) = options.insecure_skip_tls_verify {
            inner.tls.insecure_skip_verify = insecure;
        }

        Ok(K8sConfig::from_config(inner))
    }

    #[cfg(test)]
    pub(crate) fn unconfigured() -> Self {
        K8sConfig::from_config(Config::default())
    }

    fn from_config(inner: Config) -> Self {
        let api_host = inner
            .cluster_url
            .as_ref()
            .map(|uri| uri.to_string().trim_end_matches('/').to_string());

        K8sConfig { api_host, inner }
    }

    /// Base URL of the API server, `None` when no cluster is configured.
    pub fn api_host(&self) -> Option<&str> {
        self.api_host.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.inner.default_namespace
    }

    pub fn auth(&self) -> &Auth {
        &self.inner.auth
    }

    pub fn is_configured(&self) -> bool {
        self.api_host.is_some()
    }

    /// A client for this configuration. TLS material is only validated here.
    pub(crate) fn client(&self) -> Result<Client> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        Client::new(&self.inner).map_err(Into::into)
    }
}

fn parse_api_host(api_host: &str) -> Result<http::Uri> {
    let uri = api_host
        .parse::<http::Uri>()
        .map_err(|err| Error::invalid(format!("api_host: {api_host:?}: {err}")))?;

    match uri.scheme_str() {
        Some("http") | Some("https") if uri.host().is_some() => Ok(uri),
        _ => Err(Error::invalid(format!(
            "api_host: {api_host:?} must be an absolute http or https url"
        ))),
    }
}

/// Namespaces are RFC 1123 labels: at most 63 lowercase alphanumerics or
/// `-`, starting and ending with an alphanumeric.
pub(crate) fn validate_namespace(namespace: &str) -> Result<()> {
    let valid_char = |c: u8| c.is_ascii_lowercase() || c.is_ascii_digit();
    let bytes = namespace.as_bytes();

    let valid = match (bytes.first(), bytes.last()) {
        (Some(&first), Some(&last)) => {
            bytes.len() <= 63
                && valid_char(first)
                && valid_char(last)
                && bytes.iter().all(|&c| valid_char(c) || c == b'-')
        }
        _ => false,
    };

    if !valid {
        return Err(Error::invalid(format!(
            "namespace: {namespace:?} must be a lowercase RFC 1123 label"
        )));
    }

    Ok(())
}

fn read_file(field: &str, path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|err| Error::invalid(format!("{field}: {}: {err}", path.display())))
}
