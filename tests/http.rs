use std::{net::SocketAddr, time::Duration};

use rpcwrk::{
    CallError, CallInvoker, HelloRequest, HttpInvoker, RunConfig, Statistics, Work,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use url::Url;

/// Returns true once the buffer holds the request head and its whole body.
fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(head_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..head_end]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    buf.len() >= head_end + 4 + content_length
}

async fn respond(mut stream: TcpStream, status: &str, body: &str) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request_complete(&buf) {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(..) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Serves the same canned response to every connection.
async fn serve(status: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(respond(stream, status, body));
        }
    });

    addr
}

/// An address nothing listens on.
async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn invoker(addr: SocketAddr) -> HttpInvoker {
    let url = Url::parse(&format!("http://{addr}/helloworld.Greeter/SayHello")).unwrap();
    HttpInvoker::new(&url).unwrap()
}

fn request() -> HelloRequest {
    HelloRequest {
        name: "zhu".to_string(),
    }
}

#[tokio::test]
async fn successful_call() {
    let body = r#"{"message":"Hello zhu"}"#;
    let addr = serve("200 OK", body).await;

    let outcome = invoker(addr).invoke(request(), Duration::from_secs(5)).await;

    assert_eq!(outcome.err, None);
    assert_eq!(outcome.status_code, 200);
    assert_eq!(outcome.content_length, body.len() as u64);
    assert!(outcome.timings.conn >= outcome.timings.dns);
}

#[tokio::test]
async fn error_status_is_recorded() {
    let addr = serve("500 Internal Server Error", "{}").await;

    let outcome = invoker(addr).invoke(request(), Duration::from_secs(5)).await;

    assert_eq!(outcome.err, Some(CallError::Status(500)));
    assert_eq!(outcome.status_code, 500);
}

#[tokio::test]
async fn undecodable_reply_is_recorded() {
    let addr = serve("200 OK", "not json").await;

    let outcome = invoker(addr).invoke(request(), Duration::from_secs(5)).await;

    assert!(matches!(outcome.err, Some(CallError::Decode(..))));
    assert_eq!(outcome.status_code, 200);
}

#[tokio::test]
async fn refused_connection_is_an_outcome() {
    let addr = closed_port().await;

    let outcome = invoker(addr).invoke(request(), Duration::from_secs(5)).await;

    assert!(matches!(outcome.err, Some(CallError::Connect(..))));
    assert_eq!(outcome.status_code, 0);
}

#[tokio::test]
async fn hanging_server_hits_the_deadline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let timeout = Duration::from_millis(100);
    let outcome = invoker(addr).invoke(request(), timeout).await;

    assert_eq!(outcome.err, Some(CallError::Timeout(timeout)));
}

#[tokio::test]
async fn run_against_dead_endpoint_completes() {
    let addr = closed_port().await;
    let config = RunConfig::builder(format!("http://{addr}/helloworld.Greeter/SayHello"))
        .requests(10)
        .concurrency(5)
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let invoker = HttpInvoker::new(config.endpoint()).unwrap();
    let stats = Statistics::new(std::io::sink()).unwrap();

    let summary = Work::new(config, invoker, stats).run().await.unwrap();

    assert_eq!(summary.requests, 10);
    assert_eq!(summary.errors, 10);
    assert_eq!(summary.success, 0);
}

#[tokio::test]
async fn run_against_live_endpoint() {
    let addr = serve("200 OK", r#"{"message":"Hello"}"#).await;
    let config = RunConfig::builder(format!("http://{addr}/helloworld.Greeter/SayHello"))
        .requests(20)
        .concurrency(4)
        .build()
        .unwrap();
    let invoker = HttpInvoker::new(config.endpoint()).unwrap();
    let stats = Statistics::new(std::io::sink()).unwrap();

    let summary = Work::new(config, invoker, stats).run().await.unwrap();

    assert_eq!(summary.requests, 20);
    assert_eq!(summary.success, 20);
    assert_eq!(summary.status_dist.get(&200), Some(&20));
}
