use onion_web::{handlers, Context, Result, Server};

fn hello_world(ctx: &mut Context) -> Result<()> {
    ctx.set("Content-Type", "text/plain");
    ctx.send_string("Hello, world!")
}

#[tokio::main]
async fn main() {
    let mut server = Server::new();
    server.get("/", handlers![hello_world]);

    let handle = server.listen("127.0.0.1:8080").await;

    tokio::signal::ctrl_c().await.unwrap();
    handle.shutdown(true).await;
}
