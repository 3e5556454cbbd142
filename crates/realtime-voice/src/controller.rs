//! The session state machine.
//!
//! One negotiation is in flight at a time. Each negotiation runs under an epoch; a teardown
//! bumps the epoch so continuations and transport listeners of a superseded negotiation find
//! themselves stale and leave the state alone.

use crate::broker::{CredentialBroker, HttpCredentialBroker};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::event_log::{EventLog, EventLogEntry};
use crate::media::{MediaDevices, MicrophoneManager};
use crate::rtc::{AudioSink, PeerConnectionFactory, PeerConnectionState, PlaybackEvent};
use crate::signaling::{HttpSignalingClient, SignalingClient};
use crate::status;
use crate::transport::{TransportEvent, TransportObserver, TransportOptions, TransportSession};
use crate::types::SessionPreferences;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStage {
    #[default]
    Idle,
    Connecting,
    Live,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub stage: SessionStage,
    pub status: String,
    pub error: Option<String>,
    /// Remote audio is attached but the host refused to start it without a user gesture.
    pub autoplay_blocked: bool,
    pub assistant_speaking: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            stage: SessionStage::Idle,
            status: status::READY.to_string(),
            error: None,
            autoplay_blocked: false,
            assistant_speaking: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The answer was applied; the stage turns `Live` once the connection reports connected.
    Negotiated,
    /// A session was already connecting or live. Nothing was requested.
    AlreadyActive,
    /// A teardown superseded this negotiation before it finished.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started(StartOutcome),
    Stopped,
}

/// The host surfaces a controller drives.
#[derive(Clone)]
pub struct HostPorts {
    pub media: Arc<dyn MediaDevices>,
    pub peers: Arc<dyn PeerConnectionFactory>,
    pub sink: Arc<dyn AudioSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// Stops sender tracks and releases the microphone.
    Destructive,
    /// Keeps the microphone warm for a reconnect.
    NonDestructive,
}

struct State {
    epoch: u64,
    stage: SessionStage,
    status: String,
    error: Option<String>,
    autoplay_blocked: bool,
    assistant_speaking: bool,
    transport: Option<Arc<TransportSession>>,
    answer_applied: bool,
    connected: bool,
    last_teardown: Option<Teardown>,
    log: EventLog,
}

impl State {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            status: self.status.clone(),
            error: self.error.clone(),
            autoplay_blocked: self.autoplay_blocked,
            assistant_speaking: self.assistant_speaking,
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}

struct Inner {
    config: ClientConfig,
    broker: Arc<dyn CredentialBroker>,
    signaling: Arc<dyn SignalingClient>,
    microphone: MicrophoneManager,
    peers: Arc<dyn PeerConnectionFactory>,
    sink: Arc<dyn AudioSink>,
    state: Mutex<State>,
    snapshot: watch::Sender<SessionSnapshot>,
}

/// Drives one realtime voice session at a time. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        config: ClientConfig,
        broker: Arc<dyn CredentialBroker>,
        signaling: Arc<dyn SignalingClient>,
        host: HostPorts,
    ) -> Self {
        let log = EventLog::new(config.event_log_capacity());
        let initial = SessionSnapshot::default();
        let (snapshot, _) = watch::channel(initial.clone());
        let state = State {
            epoch: 0,
            stage: initial.stage,
            status: initial.status,
            error: None,
            autoplay_blocked: false,
            assistant_speaking: false,
            transport: None,
            answer_applied: false,
            connected: false,
            last_teardown: None,
            log,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                broker,
                signaling,
                microphone: MicrophoneManager::new(host.media),
                peers: host.peers,
                sink: host.sink,
                state: Mutex::new(state),
                snapshot,
            }),
        }
    }

    /// Uses the HTTP broker and signaling clients at the configured URLs.
    pub fn with_http(config: ClientConfig, host: HostPorts) -> Self {
        let broker = Arc::new(HttpCredentialBroker::new(
            config.broker_url(),
            config.default_model(),
        ));
        let signaling = Arc::new(HttpSignalingClient::new(config.base_url()));
        Self::new(config, broker, signaling, host)
    }

    /// Negotiates a new session. A no-op while one is connecting or live.
    ///
    /// Any failure tears everything down, records the message in the snapshot and is returned.
    pub async fn start(
        &self,
        preferences: SessionPreferences,
    ) -> Result<StartOutcome, SessionError> {
        let epoch = {
            let mut state = self.inner.state();
            if state.stage != SessionStage::Idle {
                tracing::debug!(stage = ?state.stage, "start ignored, session already active");
                return Ok(StartOutcome::AlreadyActive);
            }
            state.stage = SessionStage::Connecting;
            state.error = None;
            state.autoplay_blocked = false;
            state.assistant_speaking = false;
            state.answer_applied = false;
            state.connected = false;
            state.set_status(status::REQUESTING_SESSION);
            state.log.push("Starting realtime session");
            self.inner.publish(&state);
            state.epoch
        };
        tracing::info!(epoch, "starting realtime session");

        match self.negotiate(epoch, &preferences).await {
            Ok(()) => Ok(StartOutcome::Negotiated),
            Err(_) if !self.inner.is_current(epoch) => {
                self.inner.settle_cancelled(epoch);
                Ok(StartOutcome::Cancelled)
            }
            Err(SessionError::Cancelled) => {
                self.inner.settle_cancelled(epoch);
                Ok(StartOutcome::Cancelled)
            }
            Err(error) => {
                if !self.inner.fail(epoch, &error) {
                    self.inner.settle_cancelled(epoch);
                    return Ok(StartOutcome::Cancelled);
                }
                Err(error)
            }
        }
    }

    /// Tears the session down from any stage, releasing the microphone. Safe to call while a
    /// negotiation is in flight and any number of times.
    pub fn stop(&self) {
        let mut state = self.inner.state();
        let was = state.stage;
        self.inner.teardown(&mut state, Teardown::Destructive);
        state.error = None;
        state.set_status(status::READY);
        if was != SessionStage::Idle {
            state.log.push("Session stopped");
            tracing::info!(from = ?was, "realtime session stopped");
        }
        self.inner.publish(&state);
    }

    /// Starts when idle, stops otherwise.
    pub async fn toggle(
        &self,
        preferences: SessionPreferences,
    ) -> Result<ToggleOutcome, SessionError> {
        if self.stage() == SessionStage::Idle {
            return self.start(preferences).await.map(ToggleOutcome::Started);
        }
        self.stop();
        Ok(ToggleOutcome::Stopped)
    }

    /// Retries remote playback, ex: after the host blocked autoplay. A no-op without a session.
    pub async fn resume_playback(&self) -> Result<(), SessionError> {
        let (epoch, transport) = {
            let state = self.inner.state();
            match &state.transport {
                Some(transport) => (state.epoch, transport.clone()),
                None => return Ok(()),
            }
        };

        let result = transport.resume_playback().await;
        let mut state = self.inner.state();
        if state.epoch == epoch {
            state.autoplay_blocked = result.is_err();
            if let Err(e) = &result {
                state.log.push(format!("Playback still blocked: {e}"));
            }
            self.inner.publish(&state);
        }
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn stage(&self) -> SessionStage {
        self.inner.state().stage
    }

    pub fn event_log(&self) -> Vec<EventLogEntry> {
        self.inner.state().log.entries()
    }

    pub fn microphone_held(&self) -> bool {
        self.inner.microphone.is_held()
    }

    pub fn has_transport(&self) -> bool {
        self.inner.state().transport.is_some()
    }

    async fn negotiate(
        &self,
        epoch: u64,
        preferences: &SessionPreferences,
    ) -> Result<(), SessionError> {
        let inner = &self.inner;

        let grant = inner.broker.create_session(preferences).await?;
        inner.advance(
            epoch,
            status::PREPARING_MICROPHONE,
            format!("Session granted for {}", grant.config().model()),
        )?;

        let stream = inner.microphone.acquire().await?;
        inner.checkpoint(epoch)?;

        let (credential, session) = grant.into_parts();
        let options = TransportOptions {
            ice_servers: inner.config.ice_servers().to_vec(),
            channel_label: inner.config.channel_label().to_string(),
            greeting: inner.config.greeting().map(str::to_string),
        };
        let observer = Arc::new(ScopedObserver {
            inner: Arc::downgrade(inner),
            epoch,
        });
        let transport = Arc::new(TransportSession::open(
            inner.peers.as_ref(),
            inner.sink.clone(),
            &options,
            observer,
        )?);
        inner.install(epoch, &transport)?;

        transport.attach_microphone(&stream)?;
        transport.create_local_offer().await?;
        inner.checkpoint(epoch)?;
        transport.wait_for_ice_gathering_complete().await?;
        inner.advance(epoch, status::CONNECTING, "Sending offer")?;

        let offer = transport.local_offer()?;
        let answer = inner
            .signaling
            .exchange(session.model(), credential, offer)
            .await?;
        inner.checkpoint(epoch)?;

        transport.apply_answer(answer).await?;
        inner.answer_applied(epoch)
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &State) {
        self.snapshot.send_replace(state.snapshot());
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state().epoch == epoch
    }

    fn checkpoint(&self, epoch: u64) -> Result<(), SessionError> {
        if self.is_current(epoch) {
            Ok(())
        } else {
            Err(SessionError::Cancelled)
        }
    }

    /// Moves a live negotiation to its next step.
    fn advance(
        &self,
        epoch: u64,
        status: &str,
        entry: impl Into<String>,
    ) -> Result<(), SessionError> {
        let mut state = self.state();
        if state.epoch != epoch {
            return Err(SessionError::Cancelled);
        }
        state.set_status(status);
        state.log.push(entry);
        self.publish(&state);
        Ok(())
    }

    fn install(&self, epoch: u64, transport: &Arc<TransportSession>) -> Result<(), SessionError> {
        let mut state = self.state();
        if state.epoch != epoch {
            transport.close(false);
            return Err(SessionError::Cancelled);
        }
        state.transport = Some(transport.clone());
        Ok(())
    }

    fn answer_applied(&self, epoch: u64) -> Result<(), SessionError> {
        let mut state = self.state();
        if state.epoch != epoch {
            return Err(SessionError::Cancelled);
        }
        state.answer_applied = true;
        state.log.push("Remote description applied");
        self.promote_if_ready(&mut state);
        self.publish(&state);
        Ok(())
    }

    fn promote_if_ready(&self, state: &mut State) {
        if state.stage == SessionStage::Connecting && state.answer_applied && state.connected {
            state.stage = SessionStage::Live;
            state.set_status(status::LISTENING);
            state.log.push("Session live");
            tracing::info!(epoch = state.epoch, "realtime session live");
        }
    }

    /// Records a negotiation failure. Returns `false` when the negotiation was already stale.
    fn fail(&self, epoch: u64, error: &SessionError) -> bool {
        let mut state = self.state();
        if state.epoch != epoch {
            return false;
        }
        tracing::error!(%error, "realtime session negotiation failed");
        self.teardown(&mut state, Teardown::Destructive);
        state.error = Some(error.to_string());
        state.set_status(status::TRY_AGAIN);
        state.log.push(format!("Error: {error}"));
        self.publish(&state);
        true
    }

    /// A superseded negotiation may have opened the microphone after the teardown that
    /// cancelled it ran. Release it unless a newer session owns it or the teardown meant to
    /// keep it.
    fn settle_cancelled(&self, epoch: u64) {
        let state = self.state();
        tracing::info!(epoch, "realtime session negotiation cancelled");
        if state.stage == SessionStage::Idle
            && state.transport.is_none()
            && state.last_teardown == Some(Teardown::Destructive)
        {
            self.microphone.release();
        }
    }

    /// Releases every handle of the current session and leaves the stage `Idle`.
    fn teardown(&self, state: &mut State, kind: Teardown) {
        state.epoch += 1;
        state.last_teardown = Some(kind);

        if let Some(transport) = state.transport.take() {
            transport.close(kind == Teardown::Destructive);
        }
        if kind == Teardown::Destructive {
            self.microphone.release();
        }

        state.answer_applied = false;
        state.connected = false;
        state.autoplay_blocked = false;
        state.assistant_speaking = false;
        state.stage = SessionStage::Idle;
    }

    fn on_transport_event(&self, epoch: u64, event: TransportEvent) {
        let mut state = self.state();
        if state.epoch != epoch {
            tracing::trace!(epoch, ?event, "dropping event from superseded transport");
            return;
        }

        match event {
            TransportEvent::ConnectionState(PeerConnectionState::Connected) => {
                state.connected = true;
                state.log.push("Peer connection connected");
                self.promote_if_ready(&mut state);
            }
            TransportEvent::ConnectionState(connection) if connection.is_lost() => {
                tracing::warn!(?connection, "peer connection lost");
                self.teardown(&mut state, Teardown::NonDestructive);
                state.set_status(status::SESSION_ENDED);
                state.log.push(format!("Peer connection lost ({connection:?})"));
            }
            TransportEvent::ConnectionState(connection) => {
                tracing::debug!(?connection, "peer connection state");
                return;
            }
            TransportEvent::IceGatheringFinished => {
                state.set_status(status::ICE_COMPLETE);
                state.log.push("ICE gathering complete");
            }
            TransportEvent::ChannelOpen => state.log.push("Data channel open"),
            TransportEvent::ChannelClosed => state.log.push("Data channel closed"),
            TransportEvent::Remote(event) => match status::for_server_event(&event) {
                Some(line) => {
                    state.log.push(line.clone());
                    state.set_status(line);
                }
                None => return,
            },
            TransportEvent::PlaybackStarted => state.autoplay_blocked = false,
            TransportEvent::PlaybackBlocked(reason) => {
                state.autoplay_blocked = true;
                state.log.push(format!("Autoplay blocked: {reason}"));
            }
            TransportEvent::Playback(PlaybackEvent::Playing) => {
                state.assistant_speaking = true;
                state.set_status(status::ASSISTANT_SPEAKING);
            }
            TransportEvent::Playback(_) => {
                state.assistant_speaking = false;
                if state.stage == SessionStage::Live {
                    state.set_status(status::LISTENING);
                }
            }
        }
        self.publish(&state);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let mut state = self.state();
        if state.transport.is_some() || self.microphone.is_held() {
            self.teardown(&mut state, Teardown::Destructive);
        }
    }
}

/// Forwards one transport's events into the controller for as long as its epoch is current.
struct ScopedObserver {
    inner: Weak<Inner>,
    epoch: u64,
}

impl TransportObserver for ScopedObserver {
    fn on_event(&self, event: TransportEvent) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_transport_event(self.epoch, event);
        }
    }
}
