use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::request::Parts;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

pub fn unauthorized() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .body(Full::new("401 Unauthorized\n".into()))
        .unwrap()
}

/// HTTP status code 404
pub fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new("Not Found".into()))
        .unwrap()
}

/// A JSON body with the given status
pub fn json(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(body.to_string().into()))
        .unwrap()
}

/// A Kubernetes `Status` failure document, the way the API server reports errors
pub fn status(code: StatusCode, reason: &str, message: &str) -> Response<Full<Bytes>> {
    json(
        code,
        &serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code.as_u16(),
        }),
    )
}

/// A `List` document wrapping `items`
pub fn list(kind: &str, items: Vec<serde_json::Value>) -> Response<Full<Bytes>> {
    json(
        StatusCode::OK,
        &serde_json::json!({
            "kind": format!("{kind}List"),
            "apiVersion": "v1",
            "metadata": {
                "resourceVersion": "1024",
            },
            "items": items,
        }),
    )
}

/// Starts an HTTP/1 server on a random local port, answering every request
/// with `handler`. The server lives until the runtime shuts down.
pub async fn serve<F>(handler: F) -> SocketAddr
where
    F: Fn(&Parts) -> Response<Full<Bytes>> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(message = "accept connection failed", %err);
                    continue;
                }
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = Arc::clone(&handler);

                    async move {
                        let (parts, _body) = req.into_parts();
                        Ok::<_, Infallible>(handler(&parts))
                    }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!(message = "serve connection failed", %err);
                }
            });
        }
    });

    addr
}
