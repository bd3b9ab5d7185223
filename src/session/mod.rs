//! Chat session controller.
//!
//! A session owns the transcript and the draft, and runs at most one request to the
//! chat endpoint at a time. Every accepted submit ends with exactly one bot message,
//! whatever happened to the request.

use log::{ debug, info, warn };
use serde::{ Deserialize, Serialize };
use std::ops::Deref;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{ broadcast, Mutex };
use uuid::Uuid;

use crate::context::DeviceContext;
use crate::endpoint::ChatEndpoint;
use crate::error::{ ChatError, EMPTY_REPLY_FALLBACK };
use crate::models::chat::{ ChatMessage, Sender, Transcript };
use crate::models::payload::ChatRequest;
use crate::models::user::UserProfile;

pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(40_000);
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Sending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended(ChatMessage),
    StateChanged(SessionState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    RequestPending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing happened: transcript, draft and state are untouched.
    Rejected(RejectReason),
    Settled {
        user: ChatMessage,
        reply: ChatMessage,
    },
}

/// Everything sessions share: where to send, who is sending, how long to wait.
#[derive(Clone)]
pub struct SessionConfig {
    endpoint: Arc<dyn ChatEndpoint>,
    profile: UserProfile,
    timeout: Duration,
}

impl SessionConfig {
    pub fn new(endpoint: Arc<dyn ChatEndpoint>, profile: UserProfile) -> Self {
        Self {
            endpoint,
            profile,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn open(&self, context: DeviceContext) -> ChatSession {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = ChatSession {
            id: Uuid::new_v4(),
            endpoint: Arc::clone(&self.endpoint),
            profile: self.profile.clone(),
            timeout: self.timeout,
            context,
            sending: AtomicBool::new(false),
            transcript: Mutex::new(Transcript::new()),
            draft: Mutex::new(String::new()),
            events,
        };
        info!("Opened chat session {} against {}", session.id, self.endpoint.describe());
        session
    }
}

pub struct ChatSession {
    id: Uuid,
    endpoint: Arc<dyn ChatEndpoint>,
    profile: UserProfile,
    timeout: Duration,
    context: DeviceContext,
    sending: AtomicBool,
    transcript: Mutex<Transcript>,
    draft: Mutex<String>,
    events: broadcast::Sender<SessionEvent>,
}

/// Holds the `Sending` state. Dropping it, on any path, returns the session to `Idle`.
/// `S` is either a borrow of the session or an `Arc` to it for turns run on another task.
struct SendingGuard<S: Deref<Target = ChatSession>> {
    session: S,
}

impl<S: Deref<Target = ChatSession>> SendingGuard<S> {
    fn acquire(session: S) -> Option<Self> {
        session.sending.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        session.publish(SessionEvent::StateChanged(SessionState::Sending));
        Some(Self { session })
    }
}

impl<S: Deref<Target = ChatSession>> Drop for SendingGuard<S> {
    fn drop(&mut self) {
        self.session.sending.store(false, Ordering::Release);
        self.session.publish(SessionEvent::StateChanged(SessionState::Idle));
    }
}

/// Checks the preconditions, enters `Sending` and records the user message.
async fn begin<S: Deref<Target = ChatSession>>(
    session: S,
    draft: &str
) -> Result<(SendingGuard<S>, ChatMessage), RejectReason> {
    if draft.trim().is_empty() {
        debug!("Session {}: ignoring empty submit", session.id);
        return Err(RejectReason::EmptyInput);
    }
    let id = session.id;
    let Some(guard) = SendingGuard::acquire(session) else {
        debug!("Session {}: request already in flight, ignoring submit", id);
        return Err(RejectReason::RequestPending);
    };

    let user = guard.session.append(Sender::User, draft).await;
    guard.session.draft.lock().await.clear();
    Ok((guard, user))
}

/// A turn that already owns the `Sending` state and has its user message in the
/// transcript; `run` performs the request, typically on a spawned task.
pub struct ReservedTurn {
    guard: SendingGuard<Arc<ChatSession>>,
    user: ChatMessage,
    text: String,
}

impl ReservedTurn {
    pub fn user(&self) -> &ChatMessage {
        &self.user
    }

    pub async fn run(self) -> SubmitOutcome {
        let reply = self.guard.session.settle(&self.text).await;
        SubmitOutcome::Settled { user: self.user, reply }
    }
}

impl ChatSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        if self.sending.load(Ordering::Acquire) {
            SessionState::Sending
        } else {
            SessionState::Idle
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().await.messages().to_vec()
    }

    pub async fn draft(&self) -> String {
        self.draft.lock().await.clone()
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        *self.draft.lock().await = text.into();
    }

    pub async fn submit_draft(&self) -> SubmitOutcome {
        let draft = self.draft().await;
        self.submit(&draft).await
    }

    /// Runs one chat turn. Empty input and a submit while another is in flight are
    /// silently rejected.
    pub async fn submit(&self, draft: &str) -> SubmitOutcome {
        let (_guard, user) = match begin(self, draft).await {
            Ok(started) => started,
            Err(reason) => {
                return SubmitOutcome::Rejected(reason);
            }
        };
        let reply = self.settle(draft.trim()).await;
        SubmitOutcome::Settled { user, reply }
    }

    /// Like `submit`, but returns as soon as the turn holds the `Sending` state so the
    /// caller decides where the request runs. Turns are accepted in call order.
    pub async fn reserve(self: &Arc<Self>, draft: &str) -> Result<ReservedTurn, RejectReason> {
        let (guard, user) = begin(Arc::clone(self), draft).await?;
        Ok(ReservedTurn {
            guard,
            user,
            text: draft.trim().to_string(),
        })
    }

    /// Sends `text` with the current context and appends the single bot reply.
    async fn settle(&self, text: &str) -> ChatMessage {
        let location = self.context.location();
        let request = ChatRequest::build(
            text,
            &self.profile,
            &self.context.status(),
            location.as_ref()
        );
        info!(
            "Session {}: sending {} chars (location {})",
            self.id,
            text.chars().count(),
            if location.is_some() { "granted" } else { "unavailable" }
        );

        let reply_text = match self.exchange(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Session {}: chat request failed: {:?}", self.id, e);
                e.to_string()
            }
        };
        self.append(Sender::Bot, reply_text).await
    }

    /// The request is dropped when the timeout fires, so a late reply is never seen.
    async fn exchange(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let reply = tokio::time
            ::timeout(self.timeout, self.endpoint.post(request)).await
            .map_err(|_| ChatError::Timeout)??;

        if !reply.is_success() {
            return Err(ChatError::from_server_reply(reply.status, &reply.body));
        }
        if reply.body.is_empty() {
            Ok(EMPTY_REPLY_FALLBACK.to_string())
        } else {
            Ok(reply.body)
        }
    }

    async fn append(&self, sender: Sender, text: impl Into<String>) -> ChatMessage {
        let message = self.transcript.lock().await.append(sender, text);
        self.publish(SessionEvent::MessageAppended(message.clone()));
        message
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
