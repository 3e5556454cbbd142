//! One negotiated peer connection plus its signaling channel and playback sink.

use crate::error::SessionError;
use crate::media::{MediaStream, TrackGroup};
use crate::rtc::{
    AudioSink, ChannelEvent, DataChannel, IceGatheringState, IceServer, PeerConnection,
    PeerConnectionConfig, PeerConnectionFactory, PeerConnectionState, PeerEvent, PlaybackEvent,
    SdpType, SessionDescription,
};
use crate::types::events::client::{ResponseConfig, ResponseCreateEvent};
use crate::types::{ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What a transport reports back to whoever owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    ConnectionState(PeerConnectionState),
    /// The end-of-candidates marker was seen.
    IceGatheringFinished,
    ChannelOpen,
    ChannelClosed,
    Remote(ServerEvent),
    PlaybackStarted,
    /// Playback needs a user gesture before it can start.
    PlaybackBlocked(String),
    Playback(PlaybackEvent),
}

pub trait TransportObserver: Send + Sync + 'static {
    fn on_event(&self, event: TransportEvent);
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub ice_servers: Vec<IceServer>,
    pub channel_label: String,
    pub greeting: Option<String>,
}

pub struct TransportSession {
    peer: Arc<dyn PeerConnection>,
    channel: Arc<dyn DataChannel>,
    sink: Arc<dyn AudioSink>,
    listeners: Vec<JoinHandle<()>>,
    /// Flipped by `close`. Hosts do not reliably report their own close.
    closed: watch::Sender<bool>,
}

impl TransportSession {
    /// Creates the peer connection and its single outbound data channel, and subscribes to
    /// both (and to the sink) before any offer exists.
    pub fn open(
        factory: &dyn PeerConnectionFactory,
        sink: Arc<dyn AudioSink>,
        options: &TransportOptions,
        observer: Arc<dyn TransportObserver>,
    ) -> Result<Self, SessionError> {
        if options.ice_servers.is_empty() {
            return Err(SessionError::Configuration(
                "At least one ICE server is required.".to_string(),
            ));
        }

        let peer = factory.create(&PeerConnectionConfig::new(options.ice_servers.clone()))?;
        let peer_events = peer.subscribe();

        let channel = match peer.create_data_channel(&options.channel_label) {
            Ok(channel) => channel,
            Err(e) => {
                peer.close();
                return Err(e.into());
            }
        };
        let channel_events = channel.subscribe();
        let sink_events = sink.subscribe();
        tracing::debug!(label = %channel.label(), "peer connection and data channel created");

        let greeting = ClientEvent::ResponseCreate(ResponseCreateEvent::new().with_response(
            match options.greeting.as_deref() {
                Some(greeting) => ResponseConfig::audio_and_text().with_instructions(greeting),
                None => ResponseConfig::audio_and_text(),
            },
        ));

        let listeners = vec![
            tokio::spawn(forward_peer_events(peer_events, sink.clone(), observer.clone())),
            tokio::spawn(forward_channel_events(
                channel_events,
                channel.clone(),
                greeting,
                observer.clone(),
            )),
            tokio::spawn(forward_playback_events(sink_events, observer)),
        ];

        let (closed, _) = watch::channel(false);
        Ok(Self {
            peer,
            channel,
            sink,
            listeners,
            closed,
        })
    }

    /// Adds every audio track of the local stream, hinted as speech. Returns how many.
    pub fn attach_microphone(&self, stream: &Arc<dyn MediaStream>) -> Result<usize, SessionError> {
        let tracks = stream.audio_tracks();
        for track in &tracks {
            track.set_content_hint("speech");
            self.peer.add_track(track.clone(), stream.clone())?;
        }
        tracing::debug!(tracks = tracks.len(), "microphone attached");
        Ok(tracks.len())
    }

    pub async fn create_local_offer(&self) -> Result<(), SessionError> {
        let offer = self.peer.create_offer().await?;
        self.peer.set_local_description(offer).await?;
        Ok(())
    }

    /// Resolves once ICE gathering is complete. Checks the current state first and only
    /// subscribes when gathering is still running. Closing the transport ends the wait with
    /// [`SessionError::Cancelled`].
    pub async fn wait_for_ice_gathering_complete(&self) -> Result<(), SessionError> {
        if self.peer.ice_gathering_state() == IceGatheringState::Complete {
            return Ok(());
        }

        let mut closed = self.closed.subscribe();
        let mut events = self.peer.subscribe();
        // Gathering may have finished between the check and the subscription.
        if self.peer.ice_gathering_state() == IceGatheringState::Complete {
            return Ok(());
        }
        if *closed.borrow_and_update() {
            return Err(SessionError::Cancelled);
        }
        if self.peer.connection_state() == PeerConnectionState::Closed {
            return Err(closed_during_gathering());
        }
        loop {
            let event = tokio::select! {
                _ = closed.wait_for(|closed| *closed) => return Err(SessionError::Cancelled),
                event = events.recv() => event,
            };
            match event {
                Ok(PeerEvent::IceGatheringStateChange(IceGatheringState::Complete)) => {
                    tracing::debug!("ICE gathering complete");
                    return Ok(());
                }
                Ok(PeerEvent::ConnectionStateChange(PeerConnectionState::Closed)) => {
                    return Err(closed_during_gathering());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if self.peer.ice_gathering_state() == IceGatheringState::Complete {
                        return Ok(());
                    }
                }
                Err(RecvError::Closed) => return Err(closed_during_gathering()),
            }
        }
    }

    /// The local description with its gathered candidates.
    pub fn local_offer(&self) -> Result<SessionDescription, SessionError> {
        self.peer.local_description().ok_or_else(|| {
            SessionError::Transport("Local description is missing after gathering.".to_string())
        })
    }

    /// Applies the provider's answer. Connectivity is reported later through the observer.
    pub async fn apply_answer(&self, answer: SessionDescription) -> Result<(), SessionError> {
        if answer.sdp_type() != SdpType::Answer {
            return Err(SessionError::Transport(
                "Remote description is not an answer.".to_string(),
            ));
        }
        self.peer.set_remote_description(answer).await?;
        tracing::debug!("remote description applied");
        Ok(())
    }

    pub async fn resume_playback(&self) -> Result<(), SessionError> {
        self.sink
            .play()
            .await
            .map_err(|e| SessionError::Playback(e.to_string()))
    }

    /// Releases everything this transport holds. Listeners go first so closing the handles
    /// does not feed notifications back to the owner. Sender tracks are stopped only when
    /// `stop_tracks` is set.
    pub fn close(&self, stop_tracks: bool) {
        self.closed.send_replace(true);
        self.unsubscribe();
        let senders = self.peer.sender_tracks();
        self.channel.close();
        self.peer.close();
        if stop_tracks {
            for track in senders {
                track.stop();
            }
        }
        self.sink.pause();
        self.sink.attach(None);
        tracing::debug!(stop_tracks, "transport closed");
    }

    fn unsubscribe(&self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

fn closed_during_gathering() -> SessionError {
    SessionError::Transport("Peer connection closed during ICE gathering.".to_string())
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn forward_peer_events(
    mut events: broadcast::Receiver<PeerEvent>,
    sink: Arc<dyn AudioSink>,
    observer: Arc<dyn TransportObserver>,
) {
    loop {
        match events.recv().await {
            Ok(PeerEvent::ConnectionStateChange(state)) => {
                tracing::debug!(?state, "connection state changed");
                observer.on_event(TransportEvent::ConnectionState(state));
            }
            Ok(PeerEvent::IceCandidate(None)) => {
                observer.on_event(TransportEvent::IceGatheringFinished);
            }
            Ok(PeerEvent::IceCandidate(Some(candidate))) => {
                tracing::trace!(%candidate, "gathered ICE candidate");
            }
            Ok(PeerEvent::IceGatheringStateChange(state)) => {
                tracing::trace!(?state, "ICE gathering state changed");
            }
            Ok(PeerEvent::Track { track, streams }) => {
                let stream: Arc<dyn MediaStream> = match streams.into_iter().next() {
                    Some(stream) => stream,
                    None => Arc::new(TrackGroup::single(track.clone())),
                };
                tracing::debug!(
                    track = %track.id(),
                    stream = %stream.id(),
                    "remote track received"
                );
                sink.attach(Some(stream));
                match sink.play().await {
                    Ok(()) => observer.on_event(TransportEvent::PlaybackStarted),
                    Err(e) => {
                        tracing::warn!(error = %e, "remote audio playback blocked");
                        observer.on_event(TransportEvent::PlaybackBlocked(e.to_string()));
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "peer connection events lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn forward_channel_events(
    mut events: broadcast::Receiver<ChannelEvent>,
    channel: Arc<dyn DataChannel>,
    greeting: ClientEvent,
    observer: Arc<dyn TransportObserver>,
) {
    loop {
        match events.recv().await {
            Ok(ChannelEvent::Open) => {
                match greeting.to_json() {
                    Ok(text) => {
                        if let Err(e) = channel.send(&text) {
                            tracing::error!(error = %e, "failed to send greeting request");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "failed to serialize greeting request"),
                }
                observer.on_event(TransportEvent::ChannelOpen);
            }
            Ok(ChannelEvent::Message(text)) => match ServerEvent::parse(&text) {
                Some(event) => observer.on_event(TransportEvent::Remote(event)),
                None => tracing::trace!(bytes = text.len(), "ignoring unparseable channel message"),
            },
            Ok(ChannelEvent::Close) => observer.on_event(TransportEvent::ChannelClosed),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "data channel events lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn forward_playback_events(
    mut events: broadcast::Receiver<PlaybackEvent>,
    observer: Arc<dyn TransportObserver>,
) {
    loop {
        match events.recv().await {
            Ok(event) => observer.on_event(TransportEvent::Playback(event)),
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}
