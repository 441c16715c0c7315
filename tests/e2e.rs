mod common;

use common::{closed_by_peer, read_response, request, start};
use onion_web::{
    handlers, limits::ConnLimits, middleware, Context, Error, Result, Server, StatusCode,
};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

fn hello_server() -> Server {
    let mut server = Server::new();
    server.get("/test", handlers![|ctx: &mut Context| ctx.send_string("Hello World")]);
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_hello_world() {
    let handle = start(hello_server()).await;

    let resp = request(handle.local_addr(), "GET /test HTTP/1.1\r\nHost: h\r\n\r\n").await;

    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.header("Content-Length"), Some("11"));
    assert_eq!(resp.body_str(), "Hello World");

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_not_found() {
    let handle = start(hello_server()).await;

    let resp = request(handle.local_addr(), "GET /missing HTTP/1.1\r\n\r\n").await;

    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(resp.header("Content-Length"), Some("0"));
    assert!(resp.body.is_empty());

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_recovered_panic() {
    let mut server = Server::new();
    server.middleware(middleware::recovery::new()).get(
        "/panic",
        handlers![|_: &mut Context| -> Result<()> { panic!("handler fault") }],
    );
    let handle = start(server).await;

    let resp = request(handle.local_addr(), "GET /panic HTTP/1.1\r\n\r\n").await;

    assert_eq!(resp.status_line, "HTTP/1.1 503 Service Unavailable");
    assert_eq!(resp.body_str(), "received an error while executing");

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_error_is_500() {
    let mut server = Server::new();
    server.get(
        "/fail",
        handlers![
            |ctx: &mut Context| {
                ctx.send_string("discarded")?;
                ctx.next()
            },
            |_: &mut Context| -> Result<()> { Err(Error::handler("database is down")) }
        ],
    );
    let handle = start(server).await;

    let resp = request(handle.local_addr(), "GET /fail HTTP/1.1\r\n\r\n").await;

    assert_eq!(resp.status_line, "HTTP/1.1 500 Internal Server Error");
    assert!(resp.body.is_empty());

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_connections() {
    let mut server = Server::new();
    server.get("/", handlers![|ctx: &mut Context| ctx.send_string("OK")]);
    let handle = start(server).await;
    let addr = handle.local_addr();

    let clients: Vec<_> = (0..32)
        .map(|_| tokio::spawn(async move { request(addr, "GET / HTTP/1.1\r\n\r\n").await }))
        .collect();

    for client in clients {
        let resp = client.await.unwrap();
        assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
        assert_eq!(resp.body_str(), "OK");
    }

    handle.shutdown(false).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn keep_alive_then_close() {
    let handle = start(hello_server()).await;
    let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();

    for _ in 0..3 {
        stream
            .write_all(b"GET /test HTTP/1.1\r\nHost: h\r\n\r\n")
            .await
            .unwrap();
        let resp = read_response(&mut stream).await.unwrap();

        assert_eq!(resp.body_str(), "Hello World");
        assert_eq!(resp.header("connection"), Some("keep-alive"));
    }

    stream
        .write_all(b"GET /test HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let resp = read_response(&mut stream).await.unwrap();

    assert_eq!(resp.body_str(), "Hello World");
    assert_eq!(resp.header("connection"), None);
    assert!(closed_by_peer(&mut stream).await);

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_timeout_closes_connection() {
    let mut server = Server::builder()
        .connection_limits(ConnLimits {
            idle_timeout: Duration::from_millis(200),
            ..ConnLimits::default()
        })
        .build();
    server.get("/", handlers![|ctx: &mut Context| ctx.send_string("OK")]);
    let handle = start(server).await;

    let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    assert_eq!(read_response(&mut stream).await.unwrap().body_str(), "OK");

    // Silent after the first response
    assert!(closed_by_peer(&mut stream).await);

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_request_closes_silently() {
    let handle = start(hello_server()).await;
    let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();

    stream.write_all(b"nonsense\r\n\r\n").await.unwrap();

    let mut received = Vec::new();
    let _ = stream.read_to_end(&mut received).await;
    assert!(received.is_empty());

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn headers_ignore_case() {
    let mut server = Server::new();
    server.get(
        "/",
        handlers![|ctx: &mut Context| {
            let value = ctx.get("x-test").to_owned();
            ctx.set("X-Echo", value);
            ctx.send_status(StatusCode::NoContent)
        }],
    );
    let handle = start(server).await;

    let resp = request(handle.local_addr(), "GET / HTTP/1.1\r\nX-TEST: loud\r\n\r\n").await;

    assert_eq!(resp.status_line, "HTTP/1.1 204 No Content");
    assert_eq!(resp.header("x-echo"), Some("loud"));

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn middleware_only_for_resolved_routes() {
    let mut server = hello_server();
    server.middleware(|ctx: &mut Context| {
        ctx.set("X-Middleware", "in");
        ctx.next()?;
        let body = String::from_utf8_lossy(ctx.response().body_bytes()).into_owned();
        ctx.send_string(format!("<{body}>"))
    });
    let handle = start(server).await;

    let resp = request(handle.local_addr(), "GET /test HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.body_str(), "<Hello World>");
    assert_eq!(resp.header("x-middleware"), Some("in"));

    let resp = request(handle.local_addr(), "GET /nope HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(resp.header("x-middleware"), None);

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn body_follows_headers() {
    let mut server = Server::new();
    server.post(
        "/echo",
        handlers![|ctx: &mut Context| {
            let body = ctx.request().body().to_vec();
            ctx.send(body);
            Ok(())
        }],
    );
    let handle = start(server).await;

    let resp = request(
        handle.local_addr(),
        "POST /echo HTTP/1.1\r\nConnection: close\r\n\r\nline one\r\nline two",
    )
    .await;

    assert_eq!(resp.body_str(), "line one\r\nline two");

    handle.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bundled_middleware_stack() {
    let mut server = Server::new();
    server
        .middleware(middleware::recovery::new())
        .middleware(middleware::cors::new())
        .middleware(middleware::compress::new())
        .get("/", handlers![|ctx: &mut Context| ctx.send_string("plain")]);
    let handle = start(server).await;

    let resp = request(handle.local_addr(), "OPTIONS / HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");

    let resp = request(handle.local_addr(), "GET / HTTP/1.1\r\nAccept-Encoding: br\r\n\r\n").await;
    assert_eq!(resp.body_str(), "plain");
    assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
    assert_eq!(resp.header("content-encoding"), None);

    let resp = request(handle.local_addr(), "GET / HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n").await;
    assert_eq!(resp.header("content-encoding"), Some("gzip"));
    assert_ne!(resp.body, b"plain");

    handle.shutdown(true).await;
}
