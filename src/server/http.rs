//! HTTP/1.1 echo server built on hyper.
//!
//! `POST /send` answers with the server receipt timestamp, `POST /get` with the
//! posted token followed by filler text.

use crate::clock::{lag_ms, Clock};
use crate::protocol::{
    fetch_body, form_field, parse_timestamp_lossy, FETCH_PATH, SUBMIT_PATH, TS_FIELD,
};
use crate::server::error::{Result, ServerError};
use crate::server::monitor::TransportCounters;
use crate::server::ERROR_BACKOFF;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::runtime::Builder;
use tracing::{debug, info, warn};

/// Status and plain-text body for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoResponse {
    pub status: StatusCode,
    pub body: String,
}

impl EchoResponse {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Route a request received at `received_ns`.
pub fn respond(method: &Method, path: &str, body: &[u8], received_ns: i64) -> EchoResponse {
    match path {
        SUBMIT_PATH if *method == Method::POST => {
            let client_ts = form_field(body, TS_FIELD)
                .map(|ts| parse_timestamp_lossy(&ts))
                .unwrap_or(0);
            info!(
                ts = received_ns,
                lag_ms = lag_ms(client_ts, received_ns),
                "HTTP: received a message"
            );
            EchoResponse::new(StatusCode::OK, received_ns.to_string())
        }
        FETCH_PATH if *method == Method::POST => {
            let token = form_field(body, TS_FIELD).unwrap_or_default();
            info!(ts = %token, "HTTP: received fetch");
            EchoResponse::new(StatusCode::OK, fetch_body(&token))
        }
        SUBMIT_PATH | FETCH_PATH => {
            EchoResponse::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => EchoResponse::new(StatusCode::NOT_FOUND, "not found"),
    }
}

pub struct HttpEchoServer {
    listener: TcpListener,
    clock: Arc<dyn Clock>,
    counters: Arc<TransportCounters>,
}

impl HttpEchoServer {
    /// Bind now so that a busy port fails at startup rather than inside `serve`.
    pub fn bind(
        addr: &str,
        clock: Arc<dyn Clock>,
        counters: Arc<TransportCounters>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        info!(address = %addr, "Listening (HTTP)");
        Ok(Self {
            listener,
            clock,
            counters,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections on a dedicated tokio runtime. Blocks the calling thread.
    pub fn serve(self) -> Result<()> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;
        runtime.block_on(self.accept_loop())
    }

    async fn accept_loop(self) -> Result<()> {
        let listener = tokio::net::TcpListener::from_std(self.listener)?;

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    self.counters.increment_error();
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };
            debug!(peer = %peer, "New HTTP connection");
            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %e, "Could not set TCP_NODELAY");
            }

            let clock = Arc::clone(&self.clock);
            let counters = Arc::clone(&self.counters);
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    handle(req, Arc::clone(&clock), Arc::clone(&counters))
                });
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(peer = %peer, error = %e, "HTTP connection error");
                }
            });
        }
    }
}

async fn handle(
    req: Request<Incoming>,
    clock: Arc<dyn Clock>,
    counters: Arc<TransportCounters>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    counters.increment_received();
    let received_ns = clock.now_ns();

    let (parts, body) = req.into_parts();
    let response = match body.collect().await {
        Ok(collected) => respond(
            &parts.method,
            parts.uri.path(),
            &collected.to_bytes(),
            received_ns,
        ),
        Err(e) => {
            counters.increment_error();
            warn!(error = %e, "HTTP: could not read request body");
            EchoResponse::new(StatusCode::BAD_REQUEST, "unreadable body")
        }
    };

    counters.increment_sent();
    let mut http_response = Response::new(Full::new(Bytes::from(response.body)));
    *http_response.status_mut() = response.status;
    http_response.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Ok(http_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::StepClock;
    use crate::protocol::{encode_form, FILLER_TEXT};

    #[test]
    fn test_submit_returns_receipt_timestamp() {
        let body = encode_form(&[(TS_FIELD, "5000000"), ("text", "hello")]);
        let response = respond(&Method::POST, SUBMIT_PATH, body.as_bytes(), 6_000_000);
        assert_eq!(response, EchoResponse::new(StatusCode::OK, "6000000"));
    }

    #[test]
    fn test_submit_without_ts_still_answers() {
        let response = respond(&Method::POST, SUBMIT_PATH, b"", 42);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "42");
    }

    #[test]
    fn test_fetch_echoes_token_and_filler() {
        let body = encode_form(&[(TS_FIELD, "abc123")]);
        let response = respond(&Method::POST, FETCH_PATH, body.as_bytes(), 0);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, format!("abc123\n{}", FILLER_TEXT));
    }

    #[test]
    fn test_unknown_route() {
        let response = respond(&Method::POST, "/nope", b"", 0);
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        let response = respond(&Method::GET, SUBMIT_PATH, b"", 0);
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_bind_reports_address() -> Result<()> {
        let counters = Arc::new(TransportCounters::default());
        let server =
            HttpEchoServer::bind("127.0.0.1:0", Arc::new(StepClock::new(0, 1)), counters)?;
        assert!(server.local_addr()?.port() > 0);
        Ok(())
    }

    #[test]
    fn test_bind_in_use() -> Result<()> {
        let taken = TcpListener::bind("127.0.0.1:0")?;
        let addr = taken.local_addr()?.to_string();
        let counters = Arc::new(TransportCounters::default());

        let result = HttpEchoServer::bind(&addr, Arc::new(StepClock::new(0, 1)), counters);
        assert!(matches!(result, Err(ServerError::Bind { .. })));
        Ok(())
    }
}
