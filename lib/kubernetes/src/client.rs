use bytes::Bytes;
use http::header::ACCEPT;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::config::{self, Auth, Config};
use super::resource::{ApiResource, ObjectList};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cluster url is not configured")]
    MissingClusterUrl,
    #[error("build tls config failed, {0}")]
    Tls(config::Error),
    #[error("apply credentials failed, {0}")]
    Auth(config::Error),
    #[error("build http request failed, {0}")]
    BuildRequest(http::Error),
    #[error("read http response failed, {0}")]
    ReadResponse(hyper::Error),
    #[error(transparent)]
    Http(hyper_util::client::legacy::Error),
    #[error("invalid params, {0}")]
    Validation(String),
    #[error("api server error, status: {}, reason: {}, message: {}", .status, .response.reason, .response.message)]
    Api {
        status: StatusCode,
        response: ErrorResponse,
    },
    #[error("unexpected response, status: {0}, body: {1}")]
    Status(StatusCode, String),
    #[error("deserialize response failed, {0}")]
    Deserialize(serde_json::Error),
}

impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Self {
        Error::ReadResponse(err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::BuildRequest(err)
    }
}

/// An error response from the API.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// The status
    pub status: String,
    /// A message about the error
    #[serde(default)]
    pub message: String,
    /// The reason for the error
    #[serde(default)]
    pub reason: String,
    /// The error code
    #[serde(default)]
    pub code: u16,
}

/// Controls how the resource version parameter is applied for list calls
///
/// Not specifying a `VersionMatch` strategy will give you different semantics
/// depending on what `resource_version`, `limit`, `continue_token` you include
/// with the list request.
///
/// See <https://kubernetes.io/docs/reference/using-api/api-concepts/#semantics-for-get-and-list> for details.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VersionMatch {
    /// Returns data at least as new as the provided resource version.
    NotOlderThan,

    /// Return data at the exact resource version provided.
    ///
    /// Note that `Exact` cannot be used with resource version "0".
    Exact,
}

/// Common query parameters used in list calls on collections
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    /// A selector to restrict the list of returned objects by their labels.
    pub label_selector: Option<String>,

    /// A selector to restrict the list of returned objects by their fields.
    pub field_selector: Option<String>,

    /// Timeout for the list call, enforced by the API server.
    pub timeout: Option<u32>,

    /// Limit the number of results
    ///
    /// If there are more results, the server will respond with a continue token
    /// which can be used to fetch another page of results.
    pub limit: Option<u32>,

    /// Fetch a second page of results.
    pub continue_token: Option<String>,

    /// Determines how resourceVersion is matched applied to list calls
    pub version_match: Option<VersionMatch>,

    /// An explicit resourceVersion using the given `VersionMatch` strategy
    pub resource_version: Option<String>,
}

impl ListParams {
    fn validate(&self) -> Result<(), Error> {
        if let Some(rv) = &self.resource_version {
            if self.version_match == Some(VersionMatch::Exact) && rv == "0" {
                return Err(Error::Validation(
                    "A non-zero resource_version is required when using an Exact match".into(),
                ));
            }
        } else if self.version_match.is_some() {
            return Err(Error::Validation(
                "A resource_version is required when using an explicit match".into(),
            ));
        }

        Ok(())
    }

    fn query(&self) -> String {
        let mut builder = form_urlencoded::Serializer::new(String::new());

        if let Some(field_selector) = &self.field_selector {
            builder.append_pair("fieldSelector", field_selector);
        }
        if let Some(label_selector) = &self.label_selector {
            builder.append_pair("labelSelector", label_selector);
        }
        if let Some(limit) = &self.limit {
            builder.append_pair("limit", &limit.to_string());
        }
        if let Some(timeout) = &self.timeout {
            builder.append_pair("timeoutSeconds", &timeout.to_string());
        }
        if let Some(continue_token) = &self.continue_token {
            builder.append_pair("continue", continue_token);
        } else {
            // When there's a continue token, we don't want to set resourceVersion
            if let Some(resource_version) = &self.resource_version {
                if resource_version != "0" || self.limit.is_none() {
                    builder.append_pair("resourceVersion", resource_version);

                    match self.version_match {
                        None => {}
                        Some(VersionMatch::NotOlderThan) => {
                            builder.append_pair("resourceVersionMatch", "NotOlderThan");
                        }
                        Some(VersionMatch::Exact) => {
                            builder.append_pair("resourceVersionMatch", "Exact");
                        }
                    }
                }
            }
        }

        builder.finish()
    }
}

#[derive(Clone)]
pub struct Client {
    http_client: HttpClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    auth: Auth,
    endpoint: String,
}

impl Client {
    /// Builds a client from `config`. Nothing is sent until the first request.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let cluster_url = config.cluster_url.as_ref().ok_or(Error::MissingClusterUrl)?;
        let tls = config
            .tls
            .client_config()
            .map_err(|err| Error::Tls(err.into()))?;

        let builder = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http();
        let mut inner = HttpConnector::new();
        inner.enforce_http(false);
        let connector = builder.enable_http1().wrap_connector(inner);

        let http_client =
            hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(connector);

        let endpoint = cluster_url.to_string().trim_end_matches('/').to_string();

        Ok(Client {
            http_client,
            endpoint,
            auth: config.auth.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List one page of a collection
    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<ObjectList<T>, Error> {
        params.validate()?;

        let query = params.query();
        let path = resource.url_path(namespace);
        let uri = if query.is_empty() {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}{}?{}", self.endpoint, path, query)
        };

        trace!(message = "doing http request", uri);

        let mut req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(ACCEPT, "application/json")
            .body(Full::<Bytes>::default())?;

        self.auth.apply(&mut req).map_err(Error::Auth)?;

        let resp = self.http_client.request(req).await.map_err(Error::Http)?;
        let (parts, incoming) = resp.into_parts();
        let body = incoming.collect().await?.to_bytes();

        if !parts.status.is_success() {
            return Err(match serde_json::from_slice::<ErrorResponse>(&body) {
                Ok(response) => Error::Api {
                    status: parts.status,
                    response,
                },
                Err(_) => Error::Status(parts.status, String::from_utf8_lossy(&body).into_owned()),
            });
        }

        serde_json::from_slice::<ObjectList<T>>(&body).map_err(Error::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_requires_non_zero_version() {
        let params = ListParams {
            version_match: Some(VersionMatch::Exact),
            resource_version: Some("0".into()),
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::Validation(_))));

        let params = ListParams {
            version_match: Some(VersionMatch::NotOlderThan),
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::Validation(_))));

        assert!(ListParams::default().validate().is_ok());
    }

    #[test]
    fn query() {
        assert_eq!(ListParams::default().query(), "");

        let params = ListParams {
            label_selector: Some("app=web,tier!=db".into()),
            limit: Some(2),
            timeout: Some(10),
            ..Default::default()
        };
        assert_eq!(
            params.query(),
            "labelSelector=app%3Dweb%2Ctier%21%3Ddb&limit=2&timeoutSeconds=10"
        );

        let params = ListParams {
            continue_token: Some("abc".into()),
            resource_version: Some("42".into()),
            version_match: Some(VersionMatch::NotOlderThan),
            ..Default::default()
        };
        assert_eq!(params.query(), "continue=abc");

        let params = ListParams {
            resource_version: Some("42".into()),
            version_match: Some(VersionMatch::Exact),
            ..Default::default()
        };
        assert_eq!(params.query(), "resourceVersion=42&resourceVersionMatch=Exact");
    }

    #[test]
    fn missing_cluster_url() {
        let err = Client::new(&Config::default()).err().unwrap();
        assert!(matches!(err, Error::MissingClusterUrl));
    }

    #[test]
    fn endpoint_without_trailing_slash() {
        let config = Config {
            cluster_url: Some("http://127.0.0.1:8080".parse().unwrap()),
            ..Default::default()
        };
        let client = Client::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8080");
    }
}
