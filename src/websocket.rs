use crate::{
    context::{ self, DeviceFeeds },
    models::device::{ Coordinates, DeviceStatus, StatusUpdate },
    models::websocket::{ ClientMessage, ServerMessage },
    session::{ ChatSession, SessionConfig, SessionEvent },
};
use futures::{ Sink, SinkExt, StreamExt };
use log::{ debug, info, warn, error };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };

enum Flow {
    Continue,
    Close,
}

async fn send<T>(tx: &mut T, msg: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where T: Sink<Message> + Unpin, T::Error: Error + Send + Sync + 'static
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

fn event_message(event: SessionEvent) -> ServerMessage {
    match event {
        SessionEvent::MessageAppended(message) => ServerMessage::Message { message },
        SessionEvent::StateChanged(state) => ServerMessage::State { state },
    }
}

/// Serves one UI connection: the peer feeds location and device status, submits chat
/// text, and receives every transcript entry and state change of its own session.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    sessions: &SessionConfig,
    initial_status: DeviceStatus,
    max_message_bytes: usize
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);

    let (feeds, device_context) = context::channel(initial_status);
    let session = Arc::new(sessions.open(device_context));
    let mut events = session.subscribe();
    // Dropping the set aborts any turn still waiting on the endpoint.
    let mut turns: JoinSet<()> = JoinSet::new();
    let (mut tx, mut rx) = websocket.split();
    info!("Assigned chat session {} to {}", session.id(), peer);

    let greeting = ServerMessage::Transcript { messages: session.transcript().await };
    if let Err(e) = send(&mut tx, &greeting).await {
        error!("Error sending transcript to {}: {}", peer, e);
        return;
    }

    loop {
        tokio::select! {
            incoming = rx.next() => {
                let Some(incoming) = incoming else {
                    break;
                };
                let message = match incoming {
                    Ok(message) => message,
                    Err(e) => {
                        log_receive_error(peer, &e);
                        break;
                    }
                };
                if message.len() > max_message_bytes {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        max_message_bytes
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                    };
                    if send(&mut tx, &error_msg).await.is_err() {
                        error!("Failed to send size limit error to {}", peer);
                    }
                    break;
                }

                let flow = match message {
                    Message::Text(text) => {
                        on_text(peer, &text, &session, &feeds, &mut turns, &mut tx).await
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        Ok(Flow::Close)
                    }
                    Message::Ping(ping_data) => {
                        tx.send(Message::Pong(ping_data)).await
                            .map(|_| Flow::Continue)
                            .map_err(|e| Box::new(e) as _)
                    }
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                        Ok(Flow::Continue)
                    }
                    Message::Pong(_) | Message::Frame(_) => Ok(Flow::Continue),
                };
                match flow {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Close) => break,
                    Err(e) => {
                        error!("Error replying to {}: {}", peer, e);
                        break;
                    }
                }
            }
            event = events.recv() => {
                let outgoing = match event {
                    Ok(event) => event_message(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{} lagged {} session events, resending transcript", peer, skipped);
                        ServerMessage::Transcript { messages: session.transcript().await }
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Err(e) = send(&mut tx, &outgoing).await {
                    error!("Error sending session update to {}: {}", peer, e);
                    break;
                }
            }
            Some(joined) = turns.join_next(), if !turns.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!("Chat turn for {} panicked: {}", peer, e);
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed for {} (session {})", peer, session.id());
}

async fn on_text<T>(
    peer: SocketAddr,
    text: &str,
    session: &Arc<ChatSession>,
    feeds: &DeviceFeeds,
    turns: &mut JoinSet<()>,
    tx: &mut T
) -> Result<Flow, Box<dyn Error + Send + Sync>>
    where T: Sink<Message> + Unpin, T::Error: Error + Send + Sync + 'static
{
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            error!("Failed to parse message from {}: {}", peer, e);
            let error_msg = ServerMessage::Error {
                message: format!("Failed to parse message: {}", e),
            };
            send(tx, &error_msg).await?;
            return Ok(Flow::Continue);
        }
    };

    match client_msg {
        ClientMessage::Chat { content } => {
            // Reserved before spawning, so frames take the `Sending` state in arrival order.
            match session.reserve(&content).await {
                Ok(turn) => {
                    turns.spawn(async move {
                        turn.run().await;
                    });
                }
                Err(reason) => {
                    debug!("Chat from {} not sent: {:?}", peer, reason);
                }
            }
        }
        ClientMessage::Location { latitude, longitude } => {
            let coords = Coordinates::new(latitude, longitude);
            if coords.in_range() {
                feeds.grant_location(coords);
            } else {
                warn!("{} sent out-of-range location {}, {}", peer, latitude, longitude);
                let error_msg = ServerMessage::Error {
                    message: format!("Location out of range: {}, {}", latitude, longitude),
                };
                send(tx, &error_msg).await?;
            }
        }
        ClientMessage::LocationError { message } => {
            feeds.location_failed(&message);
        }
        ClientMessage::Status { online, connection, battery } => {
            feeds.update_status(StatusUpdate { online, connection, battery });
        }
        ClientMessage::History => {
            let transcript = ServerMessage::Transcript { messages: session.transcript().await };
            send(tx, &transcript).await?;
        }
    }
    Ok(Flow::Continue)
}

fn log_receive_error(peer: SocketAddr, e: &tokio_tungstenite::tungstenite::Error) {
    match e {
        | tokio_tungstenite::tungstenite::Error::ConnectionClosed
        | tokio_tungstenite::tungstenite::Error::Protocol(_)
        | tokio_tungstenite::tungstenite::Error::Utf8 => {
            info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
        }
        tokio_tungstenite::tungstenite::Error::Io(io_err) if
            io_err.kind() == std::io::ErrorKind::ConnectionReset
        => {
            info!("WebSocket connection reset by peer {}", peer);
        }
        _ => {
            error!("Error receiving message from {}: {}", peer, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;
    use crate::endpoint::{ ChatEndpoint, EndpointReply };
    use crate::error::ChatError;
    use crate::models::chat::Sender;
    use crate::models::payload::ChatRequest;
    use crate::server::Server;
    use crate::session::SessionState;
    use crate::test_support::profile;
    use async_trait::async_trait;
    use std::num::NonZeroU32;
    use tokio::net::TcpListener;
    use tokio::sync::Notify;
    use tokio_tungstenite::{ connect_async, MaybeTlsStream };

    /// Replies with what it saw of the device context.
    struct ContextEcho;

    #[async_trait]
    impl ChatEndpoint for ContextEcho {
        async fn post(&self, request: &ChatRequest) -> Result<EndpointReply, ChatError> {
            Ok(EndpointReply {
                status: 200,
                body: format!(
                    "{} | battery {} | {}",
                    request.message,
                    request.status.battery.level,
                    request.coordinates.formatted_coordinates
                ),
            })
        }

        fn describe(&self) -> String {
            "echo".into()
        }
    }

    /// Holds every request until released.
    struct Gate {
        release: Notify,
    }

    #[async_trait]
    impl ChatEndpoint for Gate {
        async fn post(&self, _request: &ChatRequest) -> Result<EndpointReply, ChatError> {
            self.release.notified().await;
            Ok(EndpointReply { status: 200, body: "dispatch confirmed".into() })
        }

        fn describe(&self) -> String {
            "gate".into()
        }
    }

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn start(max_message_bytes: usize) -> Client {
        start_with(Arc::new(ContextEcho), max_message_bytes).await
    }

    async fn start_with(endpoint: Arc<dyn ChatEndpoint>, max_message_bytes: usize) -> Client {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let settings = ServerSettings {
            addr: addr.to_string(),
            api_key: None,
            connections_per_second: NonZeroU32::new(100).unwrap(),
            max_message_bytes,
        };
        let sessions = SessionConfig::new(endpoint, profile());
        let server = Server::new(settings, sessions, DeviceStatus::default());
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let (client, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        client
    }

    async fn recv(client: &mut Client) -> ServerMessage {
        loop {
            match client.next().await.unwrap().unwrap() {
                Message::Text(text) => {
                    return serde_json::from_str(&text).unwrap();
                }
                Message::Close(_) => panic!("connection closed"),
                _ => {}
            }
        }
    }

    async fn push(client: &mut Client, json: &str) {
        client.send(Message::Text(json.to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn chat_turn_uses_pushed_context() {
        let mut client = start(1024 * 1024).await;

        match recv(&mut client).await {
            ServerMessage::Transcript { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].sender, Sender::Bot);
            }
            other => panic!("expected transcript, got {:?}", other),
        }

        push(&mut client, r#"{"type":"location","latitude":37.7749,"longitude":-122.4194}"#).await;
        push(&mut client, r#"{"type":"location_error","message":"timeout"}"#).await;
        push(&mut client, r#"{"type":"status","battery":{"level":33.2,"charging":true}}"#).await;
        push(&mut client, r#"{"type":"chat","content":"car crash"}"#).await;

        assert!(
            matches!(recv(&mut client).await, ServerMessage::State { state: SessionState::Sending })
        );
        match recv(&mut client).await {
            ServerMessage::Message { message } => {
                assert_eq!(message.sender, Sender::User);
                assert_eq!(message.text, "car crash");
            }
            other => panic!("expected user message, got {:?}", other),
        }
        match recv(&mut client).await {
            ServerMessage::Message { message } => {
                assert_eq!(message.sender, Sender::Bot);
                assert_eq!(message.text, "car crash | battery 33 | 37.774900, -122.419400");
            }
            other => panic!("expected bot message, got {:?}", other),
        }
        assert!(matches!(recv(&mut client).await, ServerMessage::State { state: SessionState::Idle }));

        push(&mut client, r#"{"type":"history"}"#).await;
        match recv(&mut client).await {
            ServerMessage::Transcript { messages } => assert_eq!(messages.len(), 3),
            other => panic!("expected transcript, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn bad_json_gets_an_error_reply() {
        let mut client = start(1024 * 1024).await;
        recv(&mut client).await;

        push(&mut client, r#"{"type":"teleport"}"#).await;
        match recv(&mut client).await {
            ServerMessage::Error { message } => assert!(message.starts_with("Failed to parse message")),
            other => panic!("expected error, got {:?}", other),
        }

        push(&mut client, r#"{"type":"chat","content":"   "}"#).await;
        push(&mut client, r#"{"type":"history"}"#).await;
        match recv(&mut client).await {
            ServerMessage::Transcript { messages } => assert_eq!(messages.len(), 1),
            other => panic!("expected transcript, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_message_closes_connection() {
        let mut client = start(64).await;
        recv(&mut client).await;

        let content = "x".repeat(200);
        push(&mut client, &format!(r#"{{"type":"chat","content":"{}"}}"#, content)).await;
        match recv(&mut client).await {
            ServerMessage::Error { message } => assert_eq!(message, "Message too large"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn first_of_two_quick_chats_wins() {
        let gate = Arc::new(Gate { release: Notify::new() });
        let mut client = start_with(gate.clone(), 1024 * 1024).await;
        recv(&mut client).await;

        push(&mut client, r#"{"type":"chat","content":"first"}"#).await;
        push(&mut client, r#"{"type":"chat","content":"second"}"#).await;
        push(&mut client, r#"{"type":"history"}"#).await;

        let messages = loop {
            if let ServerMessage::Transcript { messages } = recv(&mut client).await {
                break messages;
            }
        };
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "first");

        gate.release.notify_one();
        loop {
            if let ServerMessage::Message { message } = recv(&mut client).await {
                if message.sender == Sender::Bot {
                    assert_eq!(message.text, "dispatch confirmed");
                    break;
                }
            }
        }
        push(&mut client, r#"{"type":"history"}"#).await;
        let messages = loop {
            if let ServerMessage::Transcript { messages } = recv(&mut client).await {
                break messages;
            }
        };
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts[1..], ["first", "dispatch confirmed"]);
    }
}
