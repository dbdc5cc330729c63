use std::{
    future::Future,
    net::SocketAddr,
    time::{Duration, Instant},
};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{client::conn::http1, header, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use url::{Host, Url};

use crate::{
    config::ConfigError,
    request::{HelloReply, HelloRequest},
    sample::{CallError, CallOutcome, Timings},
};

/// Performs a single remote call.
///
/// Implementations must not panic on network, protocol or deadline failures:
/// those are reported through [`CallOutcome::err`].
pub trait CallInvoker: Send + Sync + 'static {
    fn invoke(
        &self,
        request: HelloRequest,
        timeout: Duration,
    ) -> impl Future<Output = CallOutcome> + Send;
}

/// Unary JSON-over-HTTP/1.1 invoker.
///
/// Every call dials a fresh connection, connections are never reused.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    host: String,
    port: u16,
    authority: String,
    path: String,
}

struct Reply {
    status: StatusCode,
    body: Bytes,
}

impl HttpInvoker {
    pub fn new(endpoint: &Url) -> Result<Self, ConfigError> {
        let host = match endpoint.host().ok_or(ConfigError::MissingHost)? {
            Host::Domain(v) => v.to_string(),
            Host::Ipv4(v) => v.to_string(),
            Host::Ipv6(v) => v.to_string(),
        };
        let port = endpoint.port_or_known_default().unwrap_or(80);
        let host_str = endpoint.host_str().unwrap_or(host.as_str());
        let authority = match endpoint.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };
        let path = match endpoint.query() {
            Some(query) => format!("{}?{query}", endpoint.path()),
            None => endpoint.path().to_string(),
        };

        Ok(Self {
            host,
            port,
            authority,
            path,
        })
    }

    async fn exchange(
        &self,
        request: &HelloRequest,
        timings: &mut Timings,
    ) -> Result<Reply, CallError> {
        let payload =
            serde_json::to_vec(request).map_err(|err| CallError::Transport(err.to_string()))?;

        let conn_start = Instant::now();
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|err| CallError::Connect(err.to_string()))?
            .collect();
        timings.dns = conn_start.elapsed();

        let stream = TcpStream::connect(addrs.as_slice())
            .await
            .map_err(|err| CallError::Connect(err.to_string()))?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("failed to set TCP_NODELAY: {err}");
        }

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|err| CallError::Connect(err.to_string()))?;
        timings.conn = conn_start.elapsed();

        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!("connection terminated: {err}");
            }
        });

        let req_start = Instant::now();
        sender
            .ready()
            .await
            .map_err(|err| CallError::Transport(err.to_string()))?;
        timings.req = req_start.elapsed();

        let req = Request::builder()
            .method(Method::POST)
            .uri(self.path.as_str())
            .header(header::HOST, self.authority.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|err| CallError::Transport(err.to_string()))?;

        let delay_start = Instant::now();
        let resp = sender
            .send_request(req)
            .await
            .map_err(|err| CallError::Transport(err.to_string()))?;
        timings.delay = delay_start.elapsed();

        let status = resp.status();
        let res_start = Instant::now();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|err| CallError::Transport(err.to_string()))?
            .to_bytes();
        timings.res = res_start.elapsed();

        Ok(Reply { status, body })
    }
}

impl CallInvoker for HttpInvoker {
    async fn invoke(&self, request: HelloRequest, timeout: Duration) -> CallOutcome {
        let mut timings = Timings::default();
        let reply = tokio::time::timeout(timeout, self.exchange(&request, &mut timings)).await;

        let Reply { status, body } = match reply {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => return CallOutcome::failed(err, timings),
            Err(..) => return CallOutcome::failed(CallError::Timeout(timeout), timings),
        };

        let mut outcome = CallOutcome::ok(status.as_u16(), body.len() as u64, timings);
        if !status.is_success() {
            outcome.err = Some(CallError::Status(status.as_u16()));
        } else if let Err(err) = serde_json::from_slice::<HelloReply>(&body) {
            outcome.err = Some(CallError::Decode(err.to_string()));
        }

        outcome
    }
}
