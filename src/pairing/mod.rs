//! Session pairing synchronizer
//!
//! Drives one device-pairing session from initiation to a terminal outcome,
//! merging two independent information sources: the synchronous response of
//! the start call and the asynchronous push events. The backend may answer
//! the start request with the pairing artifact immediately or deliver it
//! later over the event channel; connection confirmations only ever arrive
//! as push events. State-machine guards make the merge commutative, so the
//! order in which the two sources report does not affect the outcome.

use crate::api::bot::StartOutcome;
use crate::api::{self, ApiError};
use crate::events::{ChannelEvent, EventChannel, EventChannelError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delay between the connection confirmation and the navigate notice, so
/// the confirmation stays visible before leaving the pairing view.
pub const REDIRECT_DELAY: Duration = Duration::from_millis(1500);

/// Pairing session state. Artifact and limit message live inside their
/// states, so they cannot coexist or outlive them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    /// No session in flight.
    Idle,
    /// Start accepted; artifact expected over the event channel.
    AwaitingArtifact,
    /// Artifact available for scanning.
    ArtifactReady(String),
    /// The paired device is live.
    Connected,
    /// Pairing-attempt limit reached; sticky until an explicit restart.
    LimitReached(String),
    /// Start failed; restart is allowed.
    Failed(String),
}

impl PairingState {
    /// The pairing artifact, when one is held.
    pub fn artifact(&self) -> Option<&str> {
        match self {
            PairingState::ArtifactReady(artifact) => Some(artifact),
            _ => None,
        }
    }

    /// Whether a new start may be issued from this state. In-flight and
    /// connected sessions reject it; the terminal limit/failure states are
    /// left only through an explicit new start.
    fn accepts_start(&self) -> bool {
        matches!(
            self,
            PairingState::Idle | PairingState::LimitReached(_) | PairingState::Failed(_)
        )
    }
}

/// Notices surfaced to the owning view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingNotice {
    /// Artifact ready to render as a scannable code.
    ArtifactReady(String),
    /// Start accepted; the artifact will arrive over the event channel.
    AwaitingConnection,
    /// The device is live.
    Connected { already_running: bool },
    /// Fired once, a short delay after the first connection confirmation.
    Navigate,
    /// Pairing-attempt limit reached.
    LimitReached(String),
    /// Start or event processing failed; no retry is performed.
    Failed(String),
    /// Teardown completed and a fresh registration is in place.
    SessionCleared,
}

/// Pairing errors
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("a pairing session is already in flight")]
    AlreadyStarted,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Channel(#[from] EventChannelError),
}

/// REST side of the pairing lifecycle.
#[async_trait]
pub trait PairingBackend: Send {
    async fn start_session(&self) -> api::Result<StartOutcome>;
    async fn delete_session(&self) -> api::Result<()>;
}

#[async_trait]
impl PairingBackend for crate::api::bot::BotApi {
    async fn start_session(&self) -> api::Result<StartOutcome> {
        crate::api::bot::BotApi::start_session(self).await
    }

    async fn delete_session(&self) -> api::Result<()> {
        crate::api::bot::BotApi::delete_session(self).await
    }
}

/// Event side of the pairing lifecycle: a stream of decoded events plus the
/// ability to replace the registration wholesale.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<ChannelEvent>;
    async fn reset(&mut self) -> Result<(), EventChannelError>;
}

#[async_trait]
impl EventSource for EventChannel {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.recv().await
    }

    async fn reset(&mut self) -> Result<(), EventChannelError> {
        self.reconnect().await
    }
}

/// The synchronizer. Owns the session state, the REST backend handle and the
/// event registration; the caller pumps events through it and renders the
/// notices. All transitions run to completion on the caller's task, so the
/// only races left are "which source reports first", which the guards make
/// order-insensitive.
pub struct PairingSynchronizer<B, E> {
    owner_id: String,
    state: PairingState,
    backend: B,
    events: E,
    notices: mpsc::UnboundedSender<PairingNotice>,
    redirect: Option<JoinHandle<()>>,
}

impl<B: PairingBackend, E: EventSource> PairingSynchronizer<B, E> {
    /// Create a synchronizer for one owner. Returns the notice receiver the
    /// view renders from.
    pub fn new(
        owner_id: impl Into<String>,
        backend: B,
        events: E,
    ) -> (Self, mpsc::UnboundedReceiver<PairingNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                owner_id: owner_id.into(),
                state: PairingState::Idle,
                backend,
                events,
                notices: tx,
                redirect: None,
            },
            rx,
        )
    }

    /// Current session state.
    pub fn state(&self) -> &PairingState {
        &self.state
    }

    /// The owner this session is scoped to.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn notify(&self, notice: PairingNotice) {
        let _ = self.notices.send(notice);
    }

    /// Begin pairing. The synchronous response is applied immediately; when
    /// it carries no artifact the session waits on the event channel. No
    /// automatic retry on failure.
    pub async fn start(&mut self) -> Result<(), PairingError> {
        if !self.state.accepts_start() {
            return Err(PairingError::AlreadyStarted);
        }
        self.state = PairingState::AwaitingArtifact;

        match self.backend.start_session().await {
            Ok(StartOutcome::ArtifactIssued(artifact)) => {
                tracing::info!("pairing artifact issued synchronously");
                self.state = PairingState::ArtifactReady(artifact.clone());
                self.notify(PairingNotice::ArtifactReady(artifact));
                Ok(())
            }
            Ok(StartOutcome::Pending) => {
                tracing::info!("pairing accepted, awaiting artifact over event channel");
                self.notify(PairingNotice::AwaitingConnection);
                Ok(())
            }
            Err(ApiError::LimitReached { message }) => {
                self.state = PairingState::LimitReached(message.clone());
                self.notify(PairingNotice::LimitReached(message));
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.state = PairingState::Failed(message.clone());
                self.notify(PairingNotice::Failed(message));
                Err(e.into())
            }
        }
    }

    /// Apply an asynchronously delivered pairing artifact. Stale events
    /// (wrong owner, or the session is no longer waiting) are a no-op.
    pub fn on_artifact_event(&mut self, owner_id: &str, payload: &str) {
        if owner_id != self.owner_id || self.state != PairingState::AwaitingArtifact {
            tracing::debug!(owner_id, state = ?self.state, "ignoring stale artifact event");
            return;
        }
        self.state = PairingState::ArtifactReady(payload.to_string());
        self.notify(PairingNotice::ArtifactReady(payload.to_string()));
    }

    /// Apply an attempt-limit report delivered over the event channel.
    pub fn on_limit_event(&mut self, owner_id: &str, message: &str) {
        if owner_id != self.owner_id || self.state != PairingState::AwaitingArtifact {
            tracing::debug!(owner_id, state = ?self.state, "ignoring stale limit event");
            return;
        }
        self.state = PairingState::LimitReached(message.to_string());
        self.notify(PairingNotice::LimitReached(message.to_string()));
    }

    /// The backend confirmed a fresh connection.
    pub fn on_connected_event(&mut self, owner_id: &str) {
        self.connected(owner_id, false);
    }

    /// The backend reports the device was already connected.
    pub fn on_already_running_event(&mut self, owner_id: &str) {
        self.connected(owner_id, true);
    }

    fn connected(&mut self, owner_id: &str, already_running: bool) {
        if owner_id != self.owner_id {
            tracing::debug!(owner_id, "ignoring connection event for another owner");
            return;
        }
        // Connection supersedes pairing, but never the sticky limit state.
        if matches!(self.state, PairingState::LimitReached(_)) {
            tracing::debug!("ignoring connection event while limit reached");
            return;
        }
        self.state = PairingState::Connected;
        self.notify(PairingNotice::Connected { already_running });

        if self.redirect.is_none() {
            let notices = self.notices.clone();
            self.redirect = Some(tokio::spawn(async move {
                tokio::time::sleep(REDIRECT_DELAY).await;
                let _ = notices.send(PairingNotice::Navigate);
            }));
        }
    }

    /// Dispatch one decoded channel event into the state machine.
    pub fn apply_event(&mut self, event: &ChannelEvent) {
        match event {
            ChannelEvent::QrCode { user_id, qr, error, message } => {
                if error.as_deref() == Some(api::LIMIT_REACHED_CODE) {
                    let message = message
                        .as_deref()
                        .unwrap_or("pairing attempt limit reached");
                    self.on_limit_event(user_id, message);
                } else if let Some(qr) = qr {
                    self.on_artifact_event(user_id, qr);
                } else if user_id == &self.owner_id
                    && self.state == PairingState::AwaitingArtifact
                {
                    // Event addressed to us but carrying nothing usable;
                    // keep waiting and tell the view.
                    self.notify(PairingNotice::Failed(
                        "pairing event carried no artifact".to_string(),
                    ));
                }
            }
            ChannelEvent::BotConnected { user_id } => self.on_connected_event(user_id),
            ChannelEvent::BotAlreadyRunning { user_id } => {
                self.on_already_running_event(user_id)
            }
            ChannelEvent::BotStatusChanged { .. } => {
                // Assistant-page concern, not part of the pairing lifecycle.
            }
        }
    }

    /// Wait for the next channel event. `None` means the registration ended.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.next_event().await
    }

    /// Delete the backend-side session. On success the state resets, a
    /// not-yet-fired navigate timer is cancelled, and the event registration
    /// is replaced with a fresh one; on failure the state is left untouched.
    pub async fn teardown(&mut self) -> Result<(), PairingError> {
        self.backend.delete_session().await?;
        self.state = PairingState::Idle;
        if let Some(timer) = self.redirect.take() {
            timer.abort();
        }
        self.events.reset().await?;
        self.notify(PairingNotice::SessionCleared);
        Ok(())
    }
}
