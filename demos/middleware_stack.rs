use onion_web::{
    handlers, middleware, Context, Error, Handler, Result, Server, StatusCode,
};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};
use tracing_subscriber::EnvFilter;

// Logs every resolved request with its status and duration
fn access_log(ctx: &mut Context) -> Result<()> {
    let started = Instant::now();
    let result = ctx.next();

    tracing::info!(
        method = ctx.method(),
        path = ctx.path(),
        status = ctx.response().status_code().as_u16(),
        elapsed = ?started.elapsed(),
        "request"
    );
    result
}

struct RequestCounter(AtomicUsize);

impl Handler for RequestCounter {
    fn handle(&self, ctx: &mut Context) -> Result<()> {
        let count = self.0.fetch_add(1, Ordering::Relaxed) + 1;

        ctx.set("Content-Type", "application/json");
        ctx.send_string(format!(r#"{{"count_request": {count}}}"#))
    }
}

fn require_token(ctx: &mut Context) -> Result<()> {
    if ctx.get("authorization") != "Bearer demo" {
        return ctx.send_status(StatusCode::Unauthorized);
    }
    ctx.next()
}

fn echo(ctx: &mut Context) -> Result<()> {
    let body = ctx.request().body().to_vec();
    ctx.send(body);
    Ok(())
}

fn parse_number(ctx: &mut Context) -> Result<()> {
    let number: i64 = ctx.get("x-number").parse().map_err(Error::handler)?;
    ctx.send_string((number * 2).to_string())
}

fn crash(_: &mut Context) -> Result<()> {
    panic!("this handler always panics")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut server = Server::new();

    server
        .middleware(middleware::recovery::new())
        .middleware(access_log)
        .middleware(middleware::cors::new())
        .middleware(middleware::compress::new())
        .get("/count", handlers![RequestCounter(AtomicUsize::new(0))])
        .get("/secret", handlers![require_token, |ctx: &mut Context| ctx.send_string("42")])
        .post("/echo", handlers![echo])
        // 500 when `X-Number` is missing or not a number
        .get("/double", handlers![parse_number])
        // 503 through the recovery middleware
        .get("/crash", handlers![crash]);

    let handle = server.listen("127.0.0.1:8080").await;

    tokio::signal::ctrl_c().await.unwrap();
    handle.shutdown(false).await;
}
