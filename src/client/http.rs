//! Blocking HTTP/1.1 client for the echo server's form endpoints.
//!
//! hyper drives the exchange on a private single-threaded tokio runtime, so
//! the probe engine itself stays a plain thread. The connection is kept alive
//! between calls and rebuilt after any failure.

use crate::client::connection::SubmitTransport;
use crate::client::error::{ClientError, Result};
use crate::protocol::{encode_form, FETCH_PATH, PROBE_TEXT, SUBMIT_PATH, TEXT_FIELD, TS_FIELD};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::SendRequest;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

type Sender = SendRequest<Full<Bytes>>;

pub struct HttpEchoClient {
    runtime: Runtime,
    authority: String,
    timeout: Duration,
    sender: Option<Sender>,
}

impl HttpEchoClient {
    /// Client for `host:port`. Nothing is connected until the first call.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            authority: format!("{}:{}", host, port),
            timeout,
            sender: None,
        })
    }

    /// Post `token` to the fetch endpoint and return the body.
    pub fn fetch(&mut self, token: &str) -> Result<String> {
        self.post_form(FETCH_PATH, encode_form(&[(TS_FIELD, token)]))
    }

    fn post_form(&mut self, path: &str, form: String) -> Result<String> {
        let timeout = self.timeout;
        let authority = &self.authority;
        let mut sender = self.sender.take();

        // The timer needs the runtime's time driver, so it is created inside block_on.
        let result = self.runtime.block_on(async {
            tokio::time::timeout(timeout, exchange(&mut sender, authority, path, form)).await
        });

        match result {
            Ok(Ok(body)) => {
                self.sender = sender;
                Ok(body)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }
}

impl SubmitTransport for HttpEchoClient {
    fn submit(&mut self, ts: i64) -> Result<String> {
        let ts = ts.to_string();
        self.post_form(
            SUBMIT_PATH,
            encode_form(&[(TS_FIELD, ts.as_str()), (TEXT_FIELD, PROBE_TEXT)]),
        )
    }
}

/// One request/response on a reused or fresh connection.
///
/// `sender` is left empty if the exchange fails part way.
async fn exchange(
    sender: &mut Option<Sender>,
    authority: &str,
    path: &str,
    form: String,
) -> Result<String> {
    let mut conn = match sender.take() {
        Some(conn) if !conn.is_closed() => conn,
        _ => connect(authority).await?,
    };
    conn.ready().await.map_err(http_error)?;

    let request = Request::post(path)
        .header(HOST, authority)
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(Full::new(Bytes::from(form)))
        .map_err(http_error)?;

    let response = conn.send_request(request).await.map_err(http_error)?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(http_error)?
        .to_bytes();

    *sender = Some(conn);

    if !status.is_success() {
        return Err(ClientError::Http(format!("unexpected status {}", status)));
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

async fn connect(authority: &str) -> Result<Sender> {
    debug!(authority = authority, "Opening HTTP connection");
    let stream = TcpStream::connect(authority).await?;
    stream.set_nodelay(true)?;

    let (sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(http_error)?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "HTTP connection closed");
        }
    });
    Ok(sender)
}

fn http_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::Http(e.to_string())
}
