pub mod cli;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod repl;
pub mod server;
pub mod session;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

use cli::Args;
use config::{ AppConfig, Mode };
use endpoint::HttpChatEndpoint;
use log::info;
use server::Server;
use session::SessionConfig;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("Mode: {}", config.mode);
    info!("Chat Endpoint: {}", config.endpoint);
    info!("Request Timeout: {} ms", config.request_timeout.as_millis());
    info!("User: {} ({}, logged in: {})", config.profile.user_id, config.profile.platform, config.profile.logged_in);
    if config.mode == Mode::Repl {
        info!("Fixed Location: {}", config.location.map_or_else(|| "none".to_string(), |c| c.formatted()));
    } else {
        info!("Server Address: {}", config.server.addr);
        info!("Connections Per Second: {}", config.server.connections_per_second);
        info!("Max Message Bytes: {}", config.server.max_message_bytes);
    }
    info!("-------------------------");

    let http = reqwest::Client
        ::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let endpoint = Arc::new(HttpChatEndpoint::with_client(http, config.endpoint.clone()));
    let sessions = SessionConfig::new(endpoint, config.profile.clone()).with_timeout(
        config.request_timeout
    );

    match config.mode {
        Mode::Server => {
            let server = Server::new(config.server, sessions, config.initial_status);
            server.run().await?;
        }
        Mode::Repl => {
            repl::run(&sessions, config.initial_status, config.location).await?;
        }
    }

    Ok(())
}
