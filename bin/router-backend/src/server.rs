//! Identifying HTTP responder for a backend instance

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::tokio::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Bind `address` on a port chosen by the OS
pub async fn bind_free_port(address: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind((address, 0)).await
}

/// Body every request receives, naming the service and process
pub fn response_body(service_type: &str, pid: u32) -> String {
    format!("{} response from {}\n", service_type, pid)
}

async fn handle_request(
    _req: Request<hyper::body::Incoming>,
    body: Arc<String>,
    pid: u32,
) -> Result<Response<Full<Bytes>>, Infallible> {
    info!("Handling request from {}", pid);
    Ok(Response::new(Full::new(Bytes::from(body.as_str().to_owned()))))
}

/// Accept connections until the listener fails
pub async fn serve(
    listener: TcpListener,
    service_type: String,
    pid: u32,
) -> std::io::Result<Infallible> {
    let body = Arc::new(response_body(&service_type, pid));

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let body = body.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, body.clone(), pid));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
            }
        });
    }
}
