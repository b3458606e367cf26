use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::tls::{TlsMaterial, parse_certificates};
use super::{Auth, Config, LoadDataError, RefreshableToken};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to read kube config
    #[error("failed to read '{1:?}': {0}")]
    ReadFile(#[source] std::io::Error, PathBuf),
    /// Failed to parse kube config YAML
    #[error("failed to parse kube config YAML: {0}")]
    Parse(#[source] serde_yaml::Error),
    /// Failed to determine current context
    #[error("failed to determine current context")]
    CurrentContextNotSet,
    /// Failed to load current context
    #[error("failed to load context: {0}")]
    LoadContext(String),
    /// Failed to load the cluster of context
    #[error("failed to load the cluster of context: {0}")]
    LoadClusterOfContext(String),
    /// Failed to find named user
    #[error("failed to find named user: {0}")]
    FindUser(String),
    /// Cluster url is missing on selected cluster
    #[error("cluster url is missing on selected cluster")]
    MissingClusterUrl,
    /// Failed to parse cluster uri
    #[error("failed to parse cluster url: {0}")]
    ParseClusterUri(#[source] http::uri::InvalidUri),
    #[error("build tls config failed, {0}")]
    Tls(#[from] super::tls::Error),
    /// Failed to load client certificate
    #[error("failed to load client certificate: {0}")]
    LoadClientCertificate(#[source] LoadDataError),
    /// Failed to load client key
    #[error("failed to load client key: {0}")]
    LoadClientKey(#[source] LoadDataError),
    /// Failed to load certificate authority
    #[error("failed to load certificate authority: {0}")]
    LoadCertificateAuthority(#[source] LoadDataError),
}

#[derive(Clone, Debug, Default, Deserialize)]
struct AuthInfo {
    /// The username for basic authentication to the kubernetes cluster.
    pub username: Option<String>,
    /// the password for basic authentication to the kubernetes cluster.
    pub password: Option<String>,

    /// The bearer token for authentication to the kubernetes cluster.
    pub token: Option<String>,
    /// Pointer to a file that contains a bearer token (as described above).
    #[serde(rename = "tokenFile")]
    pub token_file: Option<PathBuf>,

    /// Path to a client cert file for TLS.
    #[serde(rename = "client-certificate")]
    pub client_certificate: Option<PathBuf>,
    /// PEM-encoded data from a client cert file for TLS. Overrides `client_certificate`
    #[serde(rename = "client-certificate-data")]
    pub client_certificate_data: Option<String>,

    /// Path to a client key file for TLS
    #[serde(rename = "client-key")]
    pub client_key: Option<PathBuf>,
    /// PEM-encoded data from a client key file for TLS. Overrides `client_key`
    #[serde(rename = "client-key-data")]
    pub client_key_data: Option<String>,
}

/// NamedAuthInfo associates name with authentication.
#[derive(Deserialize)]
struct NamedAuthInfo {
    /// Name of the user
    name: String,

    /// Information that describes identity of the user
    #[serde(rename = "user")]
    auth_info: Option<AuthInfo>,
}

/// Cluster stores information to connect Kubernetes cluster.
#[derive(Clone, Deserialize)]
struct Cluster {
    /// The address of the kubernetes cluster (https://hostname:port)
    server: Option<String>,

    /// Skips the validity check for the server's certificate. This will make your HTTPS
    /// connections insecure.
    #[serde(rename = "insecure-skip-tls-verify", default)]
    insecure_skip_tls_verify: bool,

    /// The path to a cert file for the certificate authority.
    #[serde(rename = "certificate-authority")]
    certificate_authority: Option<PathBuf>,

    /// PEM-encoded certificate authority certificates. Overrides `certificate_authority`
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: Option<String>,
}

/// NamedCluster associates name with cluster.
#[derive(Deserialize)]
struct NamedCluster {
    /// Name of cluster
    name: String,

    /// Information about how to communicate with  a kubernetes cluster.
    cluster: Option<Cluster>,
}

/// Context stores tuple of cluster and user information.
#[derive(Clone, Deserialize)]
struct Context {
    /// Name of the cluster for this context.
    cluster: String,

    /// Name of the `AuthInfo` for this context.
    user: String,

    /// The default namespace to use on unspecified requests
    namespace: Option<String>,
}

/// NamedContext associates name with context.
#[derive(Deserialize)]
struct NamedContext {
    /// Name of the context
    name: String,

    /// Associations for the context
    context: Option<Context>,
}

/// [`KubeConfig`] represents information on how to connect to a remote
/// Kubernetes cluster.
///
/// NOTE: Only necessary fields are present here.
///
/// Stored in `~/.kube/config` by default, but can be pointed elsewhere with
/// `KUBECONFIG`.
#[derive(Deserialize)]
struct KubeConfig {
    /// Referencable names to cluster configs
    #[serde(default)]
    clusters: Vec<NamedCluster>,

    /// Referencable names to user configs
    #[serde(default, rename = "users")]
    auth_infos: Vec<NamedAuthInfo>,

    /// Referencable names to context configs
    #[serde(default)]
    contexts: Vec<NamedContext>,

    /// The name of the context that you would like to use by default
    #[serde(rename = "current-context")]
    current_context: Option<String>,
}

/// Loads the kubeconfig at `path`, using `context` instead of the file's
/// `current-context` when given.
pub fn from_kubeconfig(path: impl AsRef<Path>, context: Option<&str>) -> Result<Config, Error> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|err| Error::ReadFile(err, path.into()))?;
    let config = serde_yaml::from_slice::<KubeConfig>(&data).map_err(Error::Parse)?;

    // relative paths in a kubeconfig are resolved against the file's directory
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let context_name = context
        .map(String::from)
        .or(config.current_context)
        .ok_or(Error::CurrentContextNotSet)?;
    let context = config
        .contexts
        .iter()
        .find(|ctx| ctx.name == context_name)
        .and_then(|ctx| ctx.context.clone())
        .ok_or_else(|| Error::LoadContext(context_name.clone()))?;
    let cluster = config
        .clusters
        .iter()
        .find(|cluster| cluster.name == context.cluster)
        .and_then(|named_cluster| named_cluster.cluster.clone())
        .ok_or_else(|| Error::LoadClusterOfContext(context.cluster.clone()))?;
    let auth_info = config
        .auth_infos
        .iter()
        .find(|named_user| named_user.name == context.user)
        .and_then(|named_user| named_user.auth_info.clone())
        .ok_or_else(|| Error::FindUser(context.user))?;
    let cluster_url = cluster
        .server
        .ok_or(Error::MissingClusterUrl)?
        .parse::<http::Uri>()
        .map_err(Error::ParseClusterUri)?;
    let default_namespace = context.namespace.unwrap_or_else(|| String::from("default"));

    let root_certs = if cluster.certificate_authority.is_none()
        && cluster.certificate_authority_data.is_none()
    {
        Vec::new()
    } else {
        let data = load_base64_or_file(
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base,
        )
        .map_err(Error::LoadCertificateAuthority)?;

        parse_certificates(data)?
    };

    let has_cert =
        auth_info.client_certificate.is_some() || auth_info.client_certificate_data.is_some();
    let has_key = auth_info.client_key.is_some() || auth_info.client_key_data.is_some();
    let identity = if has_cert || has_key {
        let client_cert = load_base64_or_file(
            auth_info.client_certificate_data.as_deref(),
            auth_info.client_certificate.as_deref(),
            base,
        )
        .map_err(Error::LoadClientCertificate)?;
        let client_key = load_base64_or_file(
            auth_info.client_key_data.as_deref(),
            auth_info.client_key.as_deref(),
            base,
        )
        .map_err(Error::LoadClientKey)?;

        let mut identity_pem = client_key;
        identity_pem.extend_from_slice(&client_cert);
        Some(identity_pem)
    } else {
        None
    };

    let auth = if let (Some(username), Some(password)) = (auth_info.username, auth_info.password) {
        Auth::Basic { username, password }
    } else if let Some(token) = auth_info.token {
        // an inline token wins over tokenFile, as with kubectl
        Auth::Bearer { token }
    } else if let Some(path) = auth_info.token_file {
        let path = base.join(path);
        let refreshable_token =
            RefreshableToken::new(path.clone()).map_err(|err| Error::ReadFile(err, path))?;

        Auth::RefreshableToken(refreshable_token)
    } else {
        Auth::None
    };

    debug!(
        message = "kubeconfig loaded",
        ?path,
        context = %context_name,
        %cluster_url,
    );

    Ok(Config {
        cluster_url: Some(cluster_url),
        default_namespace,
        auth,
        tls: TlsMaterial {
            root_certs,
            identity,
            insecure_skip_verify: cluster.insecure_skip_tls_verify,
        },
    })
}

fn load_base64_or_file(
    data: Option<&str>,
    file: Option<&Path>,
    base: &Path,
) -> Result<Vec<u8>, LoadDataError> {
    if let Some(data) = data {
        return decode_base64(data);
    }

    match file {
        Some(path) => {
            let path = base.join(path);
            std::fs::read(&path).map_err(|err| LoadDataError::ReadFile(err, path))
        }
        None => Err(LoadDataError::MissingDataOrFile),
    }
}

#[inline]
fn decode_base64(value: impl AsRef<[u8]>) -> Result<Vec<u8>, LoadDataError> {
    use base64::Engine;

    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(LoadDataError::DecodeBase64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIND: &str = r#"
apiVersion: v1
clusters:
- cluster:
    certificate-authority-data: LS0tLS1CRUdJTiBDRVJ
    server: https://127.0.0.1:34139
  name: kind-kind
contexts:
- context:
    cluster: kind-kind
    user: kind-kind
  name: kind-kind
current-context: kind-kind
kind: Config
preferences: {}
users:
- name: kind-kind
  user:
    client-certificate-data: LS0tLS1CRUdJTiBDRVJUSUZ
    client-key-data: LS0tLS1CRUdJTiBSU0EgUFJJVkFURSB
"#;

    const TOKEN: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: dev
  cluster:
    server: http://10.0.0.1:8080
- name: prod
  cluster:
    server: https://k8s.example.com:6443
    insecure-skip-tls-verify: true
contexts:
- name: dev
  context:
    cluster: dev
    user: admin
- name: prod
  context:
    cluster: prod
    user: deployer
    namespace: payments
current-context: dev
users:
- name: admin
  user:
    username: admin
    password: secret
- name: deployer
  user:
    token: abc.def.ghi
"#;

    #[test]
    fn deserialize() {
        let config = serde_yaml::from_str::<KubeConfig>(KIND).unwrap();

        assert_eq!(config.clusters.len(), 1);
        assert_eq!(config.clusters[0].name, "kind-kind");
        let cluster = config.clusters.first().unwrap().cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_ref().unwrap(), "https://127.0.0.1:34139");
        assert_eq!(
            cluster.certificate_authority_data.as_ref().unwrap(),
            "LS0tLS1CRUdJTiBDRVJ"
        );

        assert_eq!(config.auth_infos.len(), 1);
        let auth_info = config.auth_infos.first().unwrap();
        assert_eq!(auth_info.name, "kind-kind");
        let user = auth_info.auth_info.as_ref().unwrap();
        assert_eq!(
            user.client_certificate_data.as_ref().unwrap(),
            "LS0tLS1CRUdJTiBDRVJUSUZ"
        );
        assert_eq!(
            user.client_key_data.as_ref().unwrap(),
            "LS0tLS1CRUdJTiBSU0EgUFJJVkFURSB"
        );
    }

    fn write_temp(content: &str) -> PathBuf {
        let path = testify::temp::temp_file();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn current_context() {
        let path = write_temp(TOKEN);
        let config = from_kubeconfig(&path, None).unwrap();

        assert_eq!(
            config.cluster_url.unwrap().to_string(),
            "http://10.0.0.1:8080/"
        );
        assert_eq!(config.default_namespace, "default");
        assert!(matches!(
            config.auth,
            Auth::Basic { ref username, ref password } if username == "admin" && password == "secret"
        ));
        assert!(config.tls.root_certs.is_empty());
        assert!(config.tls.identity.is_none());
        assert!(!config.tls.insecure_skip_verify);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn explicit_context() {
        let path = write_temp(TOKEN);
        let config = from_kubeconfig(&path, Some("prod")).unwrap();

        assert_eq!(
            config.cluster_url.unwrap().to_string(),
            "https://k8s.example.com:6443/"
        );
        assert_eq!(config.default_namespace, "payments");
        assert!(matches!(config.auth, Auth::Bearer { ref token } if token == "abc.def.ghi"));
        assert!(config.tls.insecure_skip_verify);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn inline_token_wins_over_token_file() {
        let token_file = write_temp("from-file\n");
        let path = write_temp(&format!(
            r#"
clusters:
- name: local
  cluster:
    server: https://127.0.0.1:6443
contexts:
- name: local
  context:
    cluster: local
    user: both
users:
- name: both
  user:
    token: inline
    tokenFile: {}
current-context: local
"#,
            token_file.display()
        ));

        let config = from_kubeconfig(&path, None).unwrap();
        assert!(matches!(config.auth, Auth::Bearer { ref token } if token == "inline"));

        std::fs::remove_file(path).unwrap();
        std::fs::remove_file(token_file).unwrap();
    }

    #[test]
    fn unknown_context() {
        let path = write_temp(TOKEN);
        let err = from_kubeconfig(&path, Some("staging")).unwrap_err();
        assert!(matches!(err, Error::LoadContext(ref name) if name == "staging"));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file() {
        let path = testify::temp::temp_file();
        let err = from_kubeconfig(&path, None).unwrap_err();
        assert!(matches!(err, Error::ReadFile(_, _)));
    }

    #[test]
    fn malformed() {
        let path = write_temp("clusters: [this is: not, valid");
        let err = from_kubeconfig(&path, None).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn certificate_authority_file() {
        let ca = write_temp(
            "-----BEGIN CERTIFICATE-----\nAAECAwQFBgcICQ==\n-----END CERTIFICATE-----\n",
        );
        let kubeconfig = format!(
            r#"
clusters:
- name: local
  cluster:
    server: https://127.0.0.1:6443
    certificate-authority: {}
contexts:
- name: local
  context:
    cluster: local
    user: nobody
current-context: local
users:
- name: nobody
  user: {{}}
"#,
            ca.display()
        );
        let path = write_temp(&kubeconfig);

        let config = from_kubeconfig(&path, None).unwrap();
        assert_eq!(config.tls.root_certs.len(), 1);
        assert!(matches!(config.auth, Auth::None));

        std::fs::remove_file(path).unwrap();
        std::fs::remove_file(ca).unwrap();
    }
}
