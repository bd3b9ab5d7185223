//! Line-oriented terminal front-end: each input line is one chat turn.

use log::info;
use std::error::Error;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader };

use crate::context::{ self, DeviceFeeds };
use crate::models::chat::{ ChatMessage, Sender };
use crate::models::device::{ Coordinates, DeviceStatus };
use crate::session::{ ChatSession, RejectReason, SessionConfig, SubmitOutcome };

const HELP: &str = "Commands: /history, /location <lat>, <lon>, /quit";

fn render(message: &ChatMessage) -> String {
    let who = match message.sender {
        Sender::User => "You",
        Sender::Bot => "Assistant",
    };
    format!("[{}] {}: {}\n", message.display_time(), who, message.text)
}

fn parse_location(raw: &str) -> Result<Coordinates, String> {
    let (lat, lon) = raw.split_once(',').ok_or_else(|| format!("expected '<lat>, <lon>', got '{}'", raw))?;
    let latitude: f64 = lat.trim().parse().map_err(|e| format!("bad latitude '{}': {}", lat.trim(), e))?;
    let longitude: f64 = lon.trim().parse().map_err(|e| format!("bad longitude '{}': {}", lon.trim(), e))?;
    let coords = Coordinates::new(latitude, longitude);
    if !coords.in_range() {
        return Err(format!("{}, {} is out of range", latitude, longitude));
    }
    Ok(coords)
}

pub async fn run(
    sessions: &SessionConfig,
    initial_status: DeviceStatus,
    location: Option<Coordinates>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (feeds, device_context) = context::channel(initial_status);
    if let Some(coords) = location {
        feeds.grant_location(coords);
    }
    let session = sessions.open(device_context);
    info!("Interactive chat session {} started", session.id());

    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();
    drive(&session, &feeds, input, output).await
}

/// Reads lines until EOF or `/quit`, printing every transcript entry as it is added.
pub async fn drive<R, W>(
    session: &ChatSession,
    feeds: &DeviceFeeds,
    input: R,
    mut output: W
) -> Result<(), Box<dyn Error + Send + Sync>>
    where R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin
{
    for message in session.transcript().await {
        output.write_all(render(&message).as_bytes()).await?;
    }
    output.write_all(format!("{}\n", HELP).as_bytes()).await?;
    output.flush().await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        if command == "/quit" || command == "/exit" {
            break;
        }
        if command == "/history" {
            for message in session.transcript().await {
                output.write_all(render(&message).as_bytes()).await?;
            }
        } else if let Some(raw) = command.strip_prefix("/location") {
            match parse_location(raw) {
                Ok(coords) => {
                    feeds.grant_location(coords);
                    output.write_all(format!("Location set to {}\n", coords.formatted()).as_bytes()).await?;
                }
                Err(e) => {
                    feeds.location_failed(&e);
                    output.write_all(format!("Location unavailable: {}\n", e).as_bytes()).await?;
                }
            }
        } else {
            session.set_draft(line).await;
            match session.submit_draft().await {
                SubmitOutcome::Settled { reply, .. } => {
                    output.write_all(render(&reply).as_bytes()).await?;
                }
                SubmitOutcome::Rejected(RejectReason::EmptyInput) => {}
                SubmitOutcome::Rejected(RejectReason::RequestPending) => {
                    output.write_all(b"Still waiting for the previous reply.\n").await?;
                }
            }
        }
        output.flush().await?;
    }
    Ok(())
}
