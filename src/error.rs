use http::StatusCode;
use kubernetes::Error as ClientError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while building or using a [`K8sObject`].
///
/// Validation problems are reported before any I/O happens, the rest come
/// from the single round trip made by `list`.
///
/// [`K8sObject`]: crate::K8sObject
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A constructor or setter argument was missing, of the wrong type or
    /// not one of the accepted values.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No API server is configured, so nothing was sent.
    #[error("no kubernetes api host configured")]
    NotConfigured,

    /// The API server could not be reached, or the connection broke while
    /// reading the response.
    #[error("network error")]
    Network(#[source] ClientError),

    /// The API server rejected the credentials.
    #[error("authentication rejected, status: {code}, message: {message}")]
    Auth { code: u16, message: String },

    /// The collection, usually the namespace, does not exist.
    #[error("not found, status: {code}, message: {message}")]
    NotFound { code: u16, message: String },

    /// The API server answered with a failure `Status` document.
    #[error("api server error, status: {code}, reason: {reason}, message: {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    /// The response could not be decoded or did not have the expected shape.
    #[error("malformed server response: {0}")]
    ServerResponse(String),

    /// Credentials or TLS material could not be turned into a client.
    #[error("invalid client configuration")]
    Config(#[source] ClientError),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    fn from_status(status: StatusCode, reason: String, message: String) -> Self {
        let code = status.as_u16();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth { code, message },
            StatusCode::NOT_FOUND => Error::NotFound { code, message },
            _ => Error::Api {
                code,
                reason,
                message,
            },
        }
    }
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(_) | ClientError::ReadResponse(_) => Error::Network(err),
            ClientError::Api { status, response } => {
                Error::from_status(status, response.reason, response.message)
            }
            ClientError::Status(status, body) => match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                    Error::from_status(status, String::new(), body.trim().to_string())
                }
                _ => Error::ServerResponse(format!("unexpected status {status}: {body}")),
            },
            ClientError::Deserialize(err) => Error::ServerResponse(err.to_string()),
            ClientError::Validation(msg) => Error::InvalidArgument(msg),
            ClientError::MissingClusterUrl => Error::NotConfigured,
            ClientError::Tls(_) | ClientError::Auth(_) | ClientError::BuildRequest(_) => {
                Error::Config(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use kubernetes::ErrorResponse;

    use super::*;

    fn api(status: StatusCode) -> ClientError {
        ClientError::Api {
            status,
            response: ErrorResponse {
                status: "Failure".into(),
                message: "nope".into(),
                reason: "Whatever".into(),
                code: status.as_u16(),
            },
        }
    }

    #[test]
    fn classify_api_status() {
        assert!(matches!(
            Error::from(api(StatusCode::UNAUTHORIZED)),
            Error::Auth { code: 401, .. }
        ));
        assert!(matches!(
            Error::from(api(StatusCode::FORBIDDEN)),
            Error::Auth { code: 403, .. }
        ));
        assert!(matches!(
            Error::from(api(StatusCode::NOT_FOUND)),
            Error::NotFound { code: 404, .. }
        ));
        assert!(matches!(
            Error::from(api(StatusCode::CONFLICT)),
            Error::Api { code: 409, ref reason, .. } if reason == "Whatever"
        ));
    }

    #[test]
    fn classify_raw_status() {
        let err = Error::from(ClientError::Status(
            StatusCode::UNAUTHORIZED,
            "401 Unauthorized\n".into(),
        ));
        assert!(matches!(err, Error::Auth { code: 401, ref message } if message == "401 Unauthorized"));

        let err = Error::from(ClientError::Status(
            StatusCode::BAD_GATEWAY,
            "<html>".into(),
        ));
        assert!(matches!(err, Error::ServerResponse(_)));
    }

    #[test]
    fn inner_error_is_only_the_source() {
        use std::error::Error as _;

        let err = Error::from(ClientError::Tls(kubernetes::config::Error::NotFound));
        assert_eq!(err.to_string(), "invalid client configuration");
        assert_eq!(
            err.source().map(|source| source.to_string()),
            Some(ClientError::Tls(kubernetes::config::Error::NotFound).to_string())
        );
    }

    #[test]
    fn classify_local_errors() {
        assert!(matches!(
            Error::from(ClientError::MissingClusterUrl),
            Error::NotConfigured
        ));
        assert!(matches!(
            Error::from(ClientError::Validation("bad".into())),
            Error::InvalidArgument(_)
        ));
    }
}
