mod file;
mod incluster;
mod tls;

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use headers::{Authorization, HeaderMapExt};
use http::Request;
use tracing::debug;

pub use tls::{TlsMaterial, parse_certificates};

/// Errors from loading data from a base64 string or a file
#[derive(Debug, thiserror::Error)]
pub enum LoadDataError {
    /// Failed to decode base64 data
    #[error("failed to decode base64 data: {0}")]
    DecodeBase64(#[source] base64::DecodeError),

    /// Failed to read file
    #[error("failed to read file '{1:?}': {0}")]
    ReadFile(#[source] std::io::Error, PathBuf),

    /// No base64 data or file path was provided
    #[error("missing base64 data or file")]
    MissingDataOrFile,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InCluster(#[from] incluster::Error),

    #[error(transparent)]
    File(#[from] file::Error),

    #[error(transparent)]
    Tls(#[from] tls::Error),

    #[error("no kubeconfig found and not running inside a cluster")]
    NotFound,

    #[error("refresh token failed, {0}")]
    RefreshToken(#[source] std::io::Error),

    #[error("token is not a valid bearer token")]
    InvalidBearerToken,
}

struct Inner {
    token: String,
    expire_at: Instant,
}

/// A bearer token backed by a file which is re-read at most once a minute,
/// so rotated service account tokens are picked up.
#[derive(Clone)]
pub struct RefreshableToken {
    path: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

impl Debug for RefreshableToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        f.debug_struct("RefreshableToken")
            .field("path", &self.path)
            .field("expire_at", &inner.expire_at)
            .finish()
    }
}

impl RefreshableToken {
    pub fn new(path: PathBuf) -> std::io::Result<Self> {
        let token = read_token(&path)?;

        Ok(RefreshableToken {
            path,
            inner: Arc::new(Mutex::new(Inner {
                token,
                expire_at: Instant::now() + Duration::from_secs(60),
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> std::io::Result<String> {
        let now = Instant::now();

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if now > inner.expire_at {
            inner.token = read_token(&self.path)?;
            inner.expire_at = now + Duration::from_secs(60);
        }

        Ok(inner.token.clone())
    }
}

fn read_token(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path).map(|content| content.trim().to_string())
}

#[derive(Clone, Debug, Default)]
pub enum Auth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    RefreshableToken(RefreshableToken),
}

impl Auth {
    pub fn apply<T>(&self, req: &mut Request<T>) -> Result<(), Error> {
        match self {
            Auth::None => {}
            Auth::Basic { username, password } => {
                req.headers_mut()
                    .typed_insert(Authorization::basic(username, password));
            }
            Auth::Bearer { token } => {
                let auth = Authorization::bearer(token).map_err(|_| Error::InvalidBearerToken)?;
                req.headers_mut().typed_insert(auth);
            }
            Auth::RefreshableToken(refreshable_token) => {
                let token = refreshable_token.token().map_err(Error::RefreshToken)?;
                let auth = Authorization::bearer(&token).map_err(|_| Error::InvalidBearerToken)?;
                req.headers_mut().typed_insert(auth);
            }
        }

        Ok(())
    }
}

/// Configuration object detailing things like cluster URL, default namespace,
/// root certificates and credentials.
///
/// # Usage
/// Prefer [`Config::infer`] unless you have particular needs. A default
/// `Config` has no cluster url, which means no cluster is configured and
/// every request will be refused before touching the network.
#[derive(Clone, Debug)]
pub struct Config {
    /// The configured cluster url.
    pub cluster_url: Option<http::Uri>,

    /// The configured default namespace.
    pub default_namespace: String,

    /// Stores information to tell the cluster who you are.
    pub auth: Auth,

    pub tls: TlsMaterial,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster_url: None,
            default_namespace: String::from("default"),
            auth: Auth::None,
            tls: TlsMaterial::default(),
        }
    }
}

impl Config {
    /// Loads the user's kubeconfig, falling back to the in-cluster
    /// environment when there is none.
    ///
    /// A kubeconfig that exists but cannot be used is skipped unless a
    /// `context` was asked for explicitly.
    pub fn infer(context: Option<&str>) -> Result<Config, Error> {
        if let Some(path) = kubeconfig_path() {
            match file::from_kubeconfig(&path, context) {
                Ok(config) => return Ok(config),
                Err(err) => {
                    if context.is_some() {
                        return Err(err.into());
                    }

                    debug!(
                        message = "load kubeconfig failed",
                        ?path,
                        %err
                    );
                }
            }
        }

        if !incluster::in_cluster() {
            return Err(Error::NotFound);
        }

        incluster::incluster_env().map_err(Into::into)
    }

    pub fn from_kubeconfig(path: impl AsRef<Path>, context: Option<&str>) -> Result<Config, Error> {
        file::from_kubeconfig(path, context).map_err(Into::into)
    }

    pub fn incluster() -> Result<Config, Error> {
        incluster::incluster_env().map_err(Into::into)
    }
}

/// The first entry of `KUBECONFIG`, or `$HOME/.kube/config`
fn kubeconfig_path() -> Option<PathBuf> {
    if let Some(paths) = std::env::var_os("KUBECONFIG") {
        if let Some(path) = std::env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
            return Some(path);
        }
    }

    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join("config"))
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;

    use super::*;

    fn authorization(auth: &Auth) -> Option<String> {
        let mut req = Request::new(());
        auth.apply(&mut req).unwrap();
        req.headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap().to_string())
    }

    #[test]
    fn apply_auth() {
        assert_eq!(authorization(&Auth::None), None);
        assert_eq!(
            authorization(&Auth::Bearer {
                token: "abc".into()
            }),
            Some("Bearer abc".to_string())
        );
        assert_eq!(
            authorization(&Auth::Basic {
                username: "admin".into(),
                password: "secret".into()
            }),
            Some("Basic YWRtaW46c2VjcmV0".to_string())
        );
    }

    #[test]
    fn invalid_bearer_token() {
        let mut req = Request::new(());
        let auth = Auth::Bearer {
            token: "not\na token".into(),
        };
        assert!(matches!(
            auth.apply(&mut req),
            Err(Error::InvalidBearerToken)
        ));
    }

    #[test]
    fn refreshable_token_is_trimmed() {
        let path = testify::temp::temp_file();
        std::fs::write(&path, "abc.def\n").unwrap();

        let token = RefreshableToken::new(path.clone()).unwrap();
        assert_eq!(token.token().unwrap(), "abc.def");
        assert_eq!(
            authorization(&Auth::RefreshableToken(token)),
            Some("Bearer abc.def".to_string())
        );

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn default_is_unconfigured() {
        let config = Config::default();
        assert!(config.cluster_url.is_none());
        assert_eq!(config.default_namespace, "default");
        assert!(matches!(config.auth, Auth::None));
    }
}
