//! Stand-alone chat hub behind a trusted gateway.
//!
//! ```text
//! ROOMCAST_ADDR=127.0.0.1:9000 RUST_LOG=roomcast_hub=debug cargo run -p chat-server
//! ```
//!
//! Clients connect to `/ws/{roomId}`; the gateway in front supplies the
//! `x-user-id` and `x-user-name` headers (or `userId` / `userName` query
//! parameters when testing by hand).

use roomcast::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

fn listen_addr(configured: Option<String>) -> String {
    configured
        .filter(|addr| !addr.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = listen_addr(std::env::var("ROOMCAST_ADDR").ok());
    tracing::info!(%addr, "starting chat server");

    let server = RoomcastServerBuilder::new()
        .bind(&addr)
        .build(GatewayAuthenticator)
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
