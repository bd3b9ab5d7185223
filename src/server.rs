use crate::config::ServerSettings;
use crate::models::device::DeviceStatus;
use crate::session::SessionConfig;
use crate::websocket::handle_connection;
use std::error::Error;
use std::net::SocketAddr;
use tokio::net::{ TcpListener, TcpStream };
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use log::{ info, warn, error, debug };

pub const API_KEY_HEADER: &str = "X-API-Key";
const API_KEY_QUERY_PARAM: &str = "api_key";

type ConnectionLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// WebSocket front-end: every connection gets its own chat session.
pub struct Server {
    settings: ServerSettings,
    sessions: SessionConfig,
    initial_status: DeviceStatus,
    limiter: ConnectionLimiter,
}

fn provided_api_key(req: &Request) -> Option<String> {
    if let Some(key) = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.to_owned());
    }
    let query = req.uri().query()?;
    url::form_urlencoded
        ::parse(query.as_bytes())
        .find(|(name, _)| name == API_KEY_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

fn unauthorized() -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some("Unauthorized".to_string()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}

impl Server {
    pub fn new(settings: ServerSettings, sessions: SessionConfig, initial_status: DeviceStatus) -> Self {
        if settings.api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }
        let limiter = RateLimiter::direct(Quota::per_second(settings.connections_per_second));

        Self { settings, sessions, initial_status, limiter }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.settings.addr).await?;
        info!("WS server listening on: {}", self.settings.addr);
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn Error + Send + Sync>> {
        loop {
            let (stream, peer) = listener.accept().await?;

            if self.limiter.check().is_err() {
                warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming connection from: {}", peer);
            let sessions = self.sessions.clone();
            let initial_status = self.initial_status.clone();
            let required_api_key = self.settings.api_key.clone();
            let max_message_bytes = self.settings.max_message_bytes;

            tokio::spawn(async move {
                if
                    let Err(e) = Self::process_connection(
                        peer,
                        stream,
                        sessions,
                        initial_status,
                        required_api_key,
                        max_message_bytes
                    ).await
                {
                    error!("Failed to process connection for {}: {}", peer, e);
                }
            });
        }
    }

    async fn process_connection(
        peer: SocketAddr,
        stream: TcpStream,
        sessions: SessionConfig,
        initial_status: DeviceStatus,
        required_api_key: Option<String>,
        max_message_bytes: usize
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            debug!("Handshake from {}", peer);

            let Some(required) = required_api_key.as_deref() else {
                return Ok(response);
            };
            if provided_api_key(req).as_deref() != Some(required) {
                warn!("{}: bad or missing API key", peer);
                return Err(unauthorized());
            }
            info!("{} authenticated", peer);
            Ok(response)
        };

        match accept_hdr_async(stream, auth_callback).await {
            Ok(ws) => {
                handle_connection(peer, ws, &sessions, initial_status, max_message_bytes).await;
                Ok(())
            }
            Err(e) => {
                error!("Handshake failed for {}: {}", peer, e);
                Err(Box::new(e) as _)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, header: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = header {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn api_key_from_header_wins() {
        let req = request("/ws?api_key=query", Some("header"));
        assert_eq!(provided_api_key(&req).as_deref(), Some("header"));
    }

    #[test]
    fn api_key_from_query_is_decoded() {
        let req = request("/ws?foo=1&api_key=a%2Bb", None);
        assert_eq!(provided_api_key(&req).as_deref(), Some("a+b"));
    }

    #[test]
    fn missing_api_key() {
        assert_eq!(provided_api_key(&request("/ws", None)), None);
    }

    #[test]
    fn unauthorized_response_status() {
        assert_eq!(unauthorized().status(), StatusCode::UNAUTHORIZED);
    }
}
