//! fileroot server - Entry Point
//!
//! Serves one sandboxed directory tree over a line-based control protocol.

use log::info;

use fileroot::{Server, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching fileroot server...");

    let config = ServerConfig::load()?;
    let server = Server::new(config).await?;
    server.start().await;
    Ok(())
}
