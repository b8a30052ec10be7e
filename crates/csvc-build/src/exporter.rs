//! HTTP endpoint exposing build metrics
//!
//! The exporter runs on its own thread, independent of any build. It is
//! started once at process start and stopped by [`MetricsExporter::shutdown`]
//! or by dropping the handle.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

use crate::metrics::BuildMetrics;

/// Running metrics endpoint
pub struct MetricsExporter {
    addr: SocketAddr,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl MetricsExporter {
    /// Bind `addr` and start serving in a background thread.
    ///
    /// Port 0 picks a free port; see [`Self::addr`].
    pub fn start(addr: &str, metrics: Arc<BuildMetrics>) -> io::Result<Self> {
        let server = Arc::new(Server::http(addr).map_err(io::Error::other)?);
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| io::Error::other("metrics endpoint is not bound to an IP address"))?;

        let srv = Arc::clone(&server);
        let handle = std::thread::Builder::new()
            .name("metrics-exporter".to_string())
            .spawn(move || {
                for request in srv.incoming_requests() {
                    handle_request(&metrics, request);
                }
                debug!("Metrics exporter loop finished");
            })?;

        info!("Serving metrics on http://{}/metrics", addr);
        Ok(Self { addr, server, handle: Some(handle) })
    }

    /// Bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the endpoint
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop serving and wait for the thread to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.server.unblock();
            if handle.join().is_err() {
                warn!("Metrics exporter thread panicked");
            }
        }
    }
}

impl Drop for MetricsExporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn respond(req: Request, code: u16, content_type: &str, body: String) {
    let mut response = Response::from_string(body).with_status_code(StatusCode(code));
    if let Some(h) = header("Content-Type", content_type) {
        response = response.with_header(h);
    }
    if let Err(e) = req.respond(response) {
        debug!("Failed to send metrics response: {}", e);
    }
}

/// Handle a single HTTP request
fn handle_request(metrics: &BuildMetrics, req: Request) {
    let method = req.method().clone();
    let path = req.url().split('?').next().unwrap_or_default().to_owned();
    debug!("{method} {path}");

    match (path.as_str(), method) {
        ("/metrics", Method::Get) => {
            match metrics.render_prometheus() {
                Ok(body) => respond(req, 200, &metrics.content_type(), body),
                Err(e) => {
                    warn!("Failed to encode metrics: {}", e);
                    respond(req, 500, "text/plain", "failed to encode metrics".to_string());
                }
            }
        }
        ("/health", Method::Get) => {
            respond(req, 200, "application/json", r#"{"status":"ok"}"#.to_string());
        }
        ("/metrics" | "/health", _) => {
            respond(req, 405, "text/plain", "method not allowed".to_string());
        }
        _ => respond(req, 404, "text/plain", "not found".to_string()),
    }
}
