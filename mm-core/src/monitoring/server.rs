//! Lightweight HTTP server exposing `MetricsRegistry` at `/metrics` for
//! Prometheus scraping. One connection-handling task per accepted socket,
//! one task per connection rather than a single shared accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::MetricsRegistry;

/// Bind `addr` and serve `/metrics` forever. Runs until the process exits;
/// the caller spawns this as an independent task alongside the Supervisor.
pub async fn serve(addr: SocketAddr, registry: Arc<MetricsRegistry>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "metrics server listening on /metrics");

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "metrics server failed to accept connection");
                continue;
            }
        };

        let registry = registry.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let registry = registry.clone();
                async move { Ok::<_, std::convert::Infallible>(handle(req, registry)) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%remote, error = %e, "metrics connection closed with error");
            }
        });
    }
}

fn handle(req: Request<hyper::body::Incoming>, registry: Arc<MetricsRegistry>) -> Response<Full<Bytes>> {
    if req.uri().path() != "/metrics" {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"not found")))
            .expect("static response is well-formed");
    }

    let encoder = TextEncoder::new();
    let families = registry.registry().gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        error!(error = %e, "failed to encode metrics");
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::from_static(b"encode error")))
            .expect("static response is well-formed");
    }

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", encoder.format_type())
        .body(Full::new(Bytes::from(buf)))
        .expect("response built from encoded metrics is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathered_families_encode_to_prometheus_text_format() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        registry.mid_price.set(0.00245);

        let encoder = TextEncoder::new();
        let families = registry.registry().gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("mm_mid_price"));
    }
}
