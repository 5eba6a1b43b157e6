//! Mock HTTP listener
//!
//! Serves a [`MockRouter`] over axum. Starting is explicit: binding failures
//! surface as `Error::Bind`, and the call only returns once the liveness
//! endpoint answers, so the first test request never races the listener.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::router::{MockRequest, MockResponse, MockRouter, STATUS_PATH};
use crate::common::{Error, Result};
use crate::net;

/// Largest request body the mock will read
const MAX_BODY_BYTES: usize = 16 << 20;

struct ServiceState {
    router: MockRouter,
    io_timeout: Duration,
}

/// A running mock service
pub struct MockService {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
    drain: Duration,
}

impl MockService {
    /// Bind `addr`, start serving and wait until the listener accepts requests
    ///
    /// `io_timeout` bounds request body reads, the readiness wait and the
    /// drain period on shutdown.
    pub async fn start(addr: &str, router: MockRouter, io_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local = listener.local_addr()?;

        let state = Arc::new(ServiceState { router, io_timeout });
        let app = axum::Router::new().fallback(handle).with_state(state);

        let (tx, rx) = oneshot::channel::<()>();
        let mut task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });

        let probe = [format!("http://{}{}", connect_addr(local), STATUS_PATH)];
        tokio::select! {
            ready = net::await_ready(&probe, io_timeout) => {
                if let Err(e) = ready {
                    task.abort();
                    return Err(e);
                }
            }
            exited = &mut task => {
                return Err(Error::ServerExited(describe_exit(exited)));
            }
        }

        tracing::info!(addr = %local, "Mock service listening");
        Ok(Self {
            addr: local,
            shutdown: Some(tx),
            task,
            drain: io_timeout,
        })
    }

    /// The address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL clients should use to reach the service
    pub fn base_url(&self) -> String {
        format!("http://{}/", connect_addr(self.addr))
    }

    /// Whether the server task is still serving
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Shut down gracefully
    ///
    /// In-flight responses get up to the I/O timeout to finish, after which
    /// the server is aborted. Returns `ServerExited` if the server had
    /// already stopped with an error.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match tokio::time::timeout(self.drain, &mut self.task).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!(addr = %self.addr, "Mock service stopped");
                Ok(())
            }
            Ok(exited) => Err(Error::ServerExited(describe_exit(exited))),
            Err(_) => {
                tracing::warn!(
                    addr = %self.addr,
                    "Mock service did not drain within {:?}; aborting",
                    self.drain
                );
                self.task.abort();
                Ok(())
            }
        }
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.task.abort();
        }
    }
}

/// Map a wildcard bind address to loopback so clients can connect to it
fn connect_addr(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
    } else {
        addr
    }
}

fn describe_exit(
    exited: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) -> String {
    match exited {
        Ok(Ok(())) => "server stopped unexpectedly".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    }
}

async fn handle(State(state): State<Arc<ServiceState>>, request: Request) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();

    let body = match tokio::time::timeout(
        state.io_timeout,
        axum::body::to_bytes(body, MAX_BODY_BYTES),
    )
    .await
    {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Could not read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
        Err(_) => {
            tracing::warn!(path = %parts.uri.path(), "Timed out reading request body");
            return StatusCode::REQUEST_TIMEOUT.into_response();
        }
    };

    let request = MockRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        content_type: parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    tracing::debug!(
        method = %request.method,
        path = %request.path,
        bytes = request.body.len(),
        "-> request"
    );
    if !request.body.is_empty() {
        tracing::trace!(body = %request.body, "-> entity");
    }

    let response = state.router.respond(&request);

    tracing::debug!(
        status = response.status,
        elapsed = ?started.elapsed(),
        bytes = response.body.len(),
        "<- {} {}",
        request.method,
        request.path
    );
    if !response.body.is_empty() {
        tracing::trace!(body = %response.body, "<- entity");
    }

    into_response(response)
}

fn into_response(response: MockResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Could not build response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::load_endpoints;

    #[tokio::test]
    async fn test_start_serves_liveness_and_stops() {
        let service = MockService::start("127.0.0.1:0", MockRouter::default(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(service.is_running());

        let url = format!("{}_hunit/status", service.base_url());
        let rsp = reqwest::get(&url).await.unwrap();
        assert_eq!(rsp.status().as_u16(), 200);
        assert_eq!(rsp.headers()["server"], "HUnit/1");

        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_distinct() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let err = MockService::start(&addr, MockRouter::default(), Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Bind { .. }));
    }

    #[tokio::test]
    async fn test_serves_templated_endpoint() {
        let endpoints = load_endpoints(
            "- request:\n    path: /echo/{word}\n  response:\n    status: 201\n    entity: '${request.vars.word}!'\n",
        )
        .unwrap();
        let service = MockService::start(
            "127.0.0.1:0",
            MockRouter::new(&endpoints).unwrap(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let rsp = reqwest::get(format!("{}echo/hi", service.base_url())).await.unwrap();
        assert_eq!(rsp.status().as_u16(), 201);
        assert_eq!(rsp.headers()["content-length"], "3");
        assert_eq!(rsp.text().await.unwrap(), "hi!");

        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_drains_in_flight_request() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let endpoints = load_endpoints(
            "- request:\n    path: /greet\n  response:\n    entity: '${request.form.w}!'\n",
        )
        .unwrap();
        let service = MockService::start(
            "127.0.0.1:0",
            MockRouter::new(&endpoints).unwrap(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        // Send the headers and half the body, then stop while the handler waits
        let mut stream = tokio::net::TcpStream::connect(service.local_addr()).await.unwrap();
        stream
            .write_all(
                b"POST /greet HTTP/1.1\r\nHost: mock\r\n\
                  Content-Type: application/x-www-form-urlencoded\r\n\
                  Content-Length: 7\r\n\r\nw=he",
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stopping = tokio::spawn(service.stop());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!stopping.is_finished());

        stream.write_all(b"llo").await.unwrap();
        let mut received = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), async {
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                if n == 0 || String::from_utf8_lossy(&received).ends_with("hello!") {
                    break;
                }
            }
        })
        .await;
        assert!(read.is_ok(), "response did not complete");

        let text = String::from_utf8_lossy(&received);
        assert!(text.starts_with("HTTP/1.1 200"), "{}", text);
        assert!(text.ends_with("hello!"), "{}", text);

        stopping.await.unwrap().unwrap();
    }

    #[test]
    fn test_connect_addr_maps_wildcard() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        assert_eq!(connect_addr(addr).to_string(), "127.0.0.1:8080");
        let addr: SocketAddr = "10.0.0.1:80".parse().unwrap();
        assert_eq!(connect_addr(addr), addr);
    }
}
