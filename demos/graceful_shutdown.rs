use onion_web::{handlers, limits::ConnLimits, Context, Server};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("onion_web=debug")),
        )
        .init();

    let mut server = Server::builder()
        .connection_limits(ConnLimits {
            idle_timeout: Duration::from_secs(15),
            ..ConnLimits::default()
        })
        .build();

    server.get(
        "/slow",
        handlers![|ctx: &mut Context| {
            // Blocks this connection's worker thread, not the others
            std::thread::sleep(Duration::from_secs(3));
            ctx.send_string("done")
        }],
    );

    let handle = match server.try_listen("127.0.0.1:8080").await {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    tracing::info!(address = %handle.local_addr(), "try `curl localhost:8080/slow` and press Ctrl-C");

    tokio::signal::ctrl_c().await.unwrap();
    tracing::info!("Ctrl-C again to abort in-flight requests");

    let active = handle.active_connections();
    tokio::select! {
        _ = handle.shutdown(false) => tracing::info!(active, "drained"),
        _ = tokio::signal::ctrl_c() => tracing::warn!("aborted"),
    }
}
