use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sentinel::http::connection::{Client, Handler};
use sentinel::http::request::{Request, RequestLimits};
use sentinel::http::response::{Response, ResponseBuilder, StatusCode};
use sentinel::server::{Server, ServerHandle, serve};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn echo(req: &Request) -> Option<Response> {
    Some(Response::text(format!(
        "{} {} host={}",
        req.method(),
        req.path_decoded(),
        req.header("Host").unwrap_or_default()
    )))
}

async fn roundtrip(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_request_response_roundtrip() {
    let server = serve("127.0.0.1:0", echo).await.unwrap();

    let reply = roundtrip(
        server.local_addr(),
        b"GET /hello%20world HTTP/1.0\r\nHost: test\r\n\r\n",
    )
    .await;

    assert!(reply.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(reply.contains("Content-Length: 26\r\n"));
    assert!(reply.ends_with("\r\n\r\nGET /hello world host=test"));

    server.stop().await;
    assert!(server.is_stopped());
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let server = serve("127.0.0.1:0", echo).await.unwrap();
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    for piece in [&b"GE"[..], b"T /sp", b"lit HTTP/1.0\r\nHo", b"st: a\r", b"\n\r\n"] {
        stream.write_all(piece).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();

    assert!(out.ends_with("GET /split host=a"));
    server.stop().await;
}

#[tokio::test]
async fn test_body_is_delivered_to_handler() {
    let server = serve("127.0.0.1:0", |req: &Request| {
        Some(Response::text(format!("name={}", req.form_param("name").unwrap_or_default())))
    })
    .await
    .unwrap();

    let reply = roundtrip(
        server.local_addr(),
        b"POST /form HTTP/1.0\r\nContent-Length: 12\r\n\r\nname=Grace+H",
    )
    .await;

    assert!(reply.ends_with("name=Grace H"));
    server.stop().await;
}

#[tokio::test]
async fn test_stop_waits_for_connection_mid_receive() {
    let server = Arc::new(serve("127.0.0.1:0", echo).await.unwrap());
    let addr = server.local_addr();

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET /slow HTTP/1.0\r\n").await.unwrap();
    wait_until(|| server.active_connections() == 1).await;

    let stopping = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.stop().await })
    };
    wait_until(|| !server.is_running()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!stopping.is_finished());
    assert!(!server.is_stopped());

    // nothing new is served once stop was issued
    if let Ok(mut late) = TcpStream::connect(addr).await {
        let _ = late.write_all(b"GET /late HTTP/1.0\r\n\r\n").await;
        let mut out = Vec::new();
        let _ = late.read_to_end(&mut out).await;
        assert!(out.is_empty());
    }
    assert!(!stopping.is_finished());

    client.write_all(b"Host: slow\r\n\r\n").await.unwrap();
    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    assert!(out.ends_with("GET /slow host=slow"));

    stopping.await.unwrap();
    assert!(server.is_stopped());
    assert_eq!(server.active_connections(), 0);
    assert_eq!(server.counters().snapshot().total_connections, 1);
}

#[tokio::test]
async fn test_stop_twice() {
    let server = serve("127.0.0.1:0", echo).await.unwrap();
    server.stop().await;
    server.stop().await;
    server.wait_stopped().await;
    assert!(server.is_stopped());
}

struct RawWriter;

impl Handler for RawWriter {
    async fn handle(&self, _request: &Request, client: &mut Client) -> Option<Response> {
        let _ = client
            .stream_mut()
            .write_all(b"HTTP/1.0 299 Handwritten\r\n\r\nraw")
            .await;
        None
    }
}

#[tokio::test]
async fn test_handler_can_take_over_socket() {
    let server = Server::new(RawWriter).run("127.0.0.1:0").await.unwrap();

    let reply = roundtrip(server.local_addr(), b"GET / HTTP/1.0\r\n\r\n").await;

    assert_eq!(reply, "HTTP/1.0 299 Handwritten\r\n\r\nraw");
    server.stop().await;
    assert_eq!(server.active_connections(), 0);
}

struct Reporter;

impl Handler for Reporter {
    async fn handle(&self, request: &Request, client: &mut Client) -> Option<Response> {
        let report = client.debug_report(request);
        Some(Response::text(report))
    }
}

#[tokio::test]
async fn test_debug_report() {
    let server = Server::new(Reporter).run("127.0.0.1:0").await.unwrap();

    let reply = roundtrip(server.local_addr(), b"GET /dbg?x=1 HTTP/1.0\r\nX-Probe: yes\r\n\r\n").await;

    assert!(reply.contains("method 'GET' path '/dbg?x=1'"));
    assert!(reply.contains("'X-Probe' = 'yes'"));
    assert!(reply.contains("host 127.0.0.1"));
    server.stop().await;
}

#[tokio::test]
async fn test_empty_response_closes_connection_only() {
    let server = serve("127.0.0.1:0", |req: &Request| {
        if req.path() == "/empty" {
            Some(ResponseBuilder::new(StatusCode::NoContent).build())
        } else {
            echo(req)
        }
    })
    .await
    .unwrap();

    let reply = roundtrip(server.local_addr(), b"GET /empty HTTP/1.0\r\n\r\n").await;
    assert!(reply.is_empty());

    // the server keeps serving other connections
    let reply = roundtrip(server.local_addr(), b"GET /ok HTTP/1.0\r\nHost: h\r\n\r\n").await;
    assert!(reply.ends_with("GET /ok host=h"));
    server.stop().await;
}

#[tokio::test]
async fn test_limits_flag_but_still_answer() {
    let limits = RequestLimits {
        max_headers: 1,
        ..RequestLimits::default()
    };
    let server = Server::new(|req: &Request| {
        Some(Response::text(format!(
            "headers={} dropped={}",
            req.header_count(),
            req.warnings().too_many_headers
        )))
    })
    .with_limits(limits)
    .with_scratch_size(8)
    .run("127.0.0.1:0")
    .await
    .unwrap();

    let reply = roundtrip(server.local_addr(), b"GET / HTTP/1.0\r\nA: 1\r\nB: 2\r\n\r\n").await;

    assert!(reply.ends_with("headers=1 dropped=true"));
    server.stop().await;
}

#[tokio::test]
async fn test_counters_are_per_server() {
    let first = serve("127.0.0.1:0", echo).await.unwrap();
    let second = serve("127.0.0.1:0", echo).await.unwrap();

    let request = b"GET / HTTP/1.0\r\nHost: c\r\n\r\n";
    let reply = roundtrip(first.local_addr(), request).await;
    first.stop().await;
    second.stop().await;

    let snap = first.counters().snapshot();
    assert_eq!(snap.total_connections, 1);
    assert_eq!(snap.active_connections, 0);
    assert_eq!(snap.bytes_received, request.len() as i64);
    assert_eq!(snap.bytes_sent, reply.len() as i64);
    assert_eq!(second.counters().snapshot().total_connections, 0);
}

#[tokio::test]
async fn test_run_all_interfaces() {
    let server: ServerHandle = Server::new(echo).run_all_interfaces(0).await.unwrap();
    let port = server.local_addr().port();
    assert_ne!(port, 0);

    let reply = roundtrip(SocketAddr::from(([127, 0, 0, 1], port)), b"GET /any HTTP/1.0\r\n\r\n").await;
    assert!(reply.ends_with("GET /any host="));
    server.stop().await;
}

#[tokio::test]
async fn test_panicking_handler_releases_counters() {
    let server = serve("127.0.0.1:0", |req: &Request| {
        if req.path() == "/boom" {
            panic!("handler failure");
        }
        echo(req)
    })
    .await
    .unwrap();

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(b"GET /boom HTTP/1.0\r\n\r\n").await.unwrap();
    let mut out = Vec::new();
    let _ = stream.read_to_end(&mut out).await;
    assert!(out.is_empty());

    wait_until(|| server.counters().snapshot().active_connections == 0).await;
    let reply = roundtrip(server.local_addr(), b"GET /after HTTP/1.0\r\nHost: p\r\n\r\n").await;
    assert!(reply.ends_with("GET /after host=p"));

    server.stop().await;
    let snap = server.counters().snapshot();
    assert_eq!(snap.total_connections, 2);
    assert_eq!(snap.active_connections, 0);
}
