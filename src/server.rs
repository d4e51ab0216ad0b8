//! Metrics exposition server
//!
//! Serves the registry snapshot on `/metrics` in Prometheus text format.
//! The accept loop exits when the shutdown token fires.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;
use crate::metrics::SyncMetrics;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

async fn handle<B>(
    req: Request<B>,
    metrics: Arc<SyncMetrics>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/metrics" => match metrics.encode() {
            Ok(body) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", TEXT_FORMAT)
                .body(Full::new(Bytes::from(body)))
                .unwrap(),
            Err(e) => {
                error!("failed to encode metrics snapshot: {}", e);
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::from("encoding error")))
                    .unwrap()
            }
        },
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap(),
    };
    Ok(response)
}

/// Serve the exposition endpoint until the shutdown token is cancelled.
pub async fn serve(
    addr: SocketAddr,
    metrics: Arc<SyncMetrics>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("metrics server listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let io = TokioIo::new(stream);
                let metrics = metrics.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(req, metrics.clone()));
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        error!("metrics server connection error: {}", e);
                    }
                });
            }
        }
    }

    info!("metrics server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_metrics_path_returns_snapshot() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        metrics.set_connection_status("mysql", true);

        let response = handle(request("/metrics"), metrics).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            TEXT_FORMAT
        );
    }

    #[tokio::test]
    async fn test_unknown_path_returns_not_found() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());

        let response = handle(request("/other"), metrics).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_shuts_down_on_cancel() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let shutdown = CancellationToken::new();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let handle = tokio::spawn(serve(addr, metrics, shutdown.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
