use std::sync::Arc;

use mock_server::ServerState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let username = std::env::var("ENROLL_USER").unwrap_or_else(|_| "demo".to_string());
    let password = std::env::var("ENROLL_PASSWORD").unwrap_or_else(|_| "demo".to_string());

    let state = Arc::new(ServerState::new(&[(username.as_str(), password.as_str())])?);
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, username = %username, "Listening");
    mock_server::run(listener, state).await?;
    Ok(())
}
