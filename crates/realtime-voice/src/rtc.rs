//! Host WebRTC surface: peer connection, data channel and the remote playback sink.
//!
//! Notifications are delivered over `tokio::sync::broadcast` so each subscriber owns its own
//! receiver and can be dropped (unsubscribed) independently.

use crate::error::HostError;
use crate::media::{MediaStream, MediaTrack};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    urls: Vec<String>,
}

impl IceServer {
    pub fn new(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerConnectionConfig {
    ice_servers: Vec<IceServer>,
}

impl PeerConnectionConfig {
    pub fn new(ice_servers: Vec<IceServer>) -> Self {
        Self { ice_servers }
    }

    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    sdp_type: SdpType,
    sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    pub fn sdp_type(&self) -> SdpType {
        self.sdp_type
    }

    pub fn sdp(&self) -> &str {
        &self.sdp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// States after which the connection will not carry media again.
    pub fn is_lost(&self) -> bool {
        matches!(
            self,
            PeerConnectionState::Disconnected
                | PeerConnectionState::Failed
                | PeerConnectionState::Closed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A gathered candidate, or `None` once gathering has ended.
    IceCandidate(Option<String>),
    IceGatheringStateChange(IceGatheringState),
    ConnectionStateChange(PeerConnectionState),
    Track {
        track: Arc<dyn MediaTrack>,
        streams: Vec<Arc<dyn MediaStream>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Playing,
    Paused,
    Ended,
    Suspended,
}

pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;
    fn ready_state(&self) -> DataChannelState;
    fn send(&self, text: &str) -> Result<(), HostError>;
    fn close(&self);
    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, HostError>;

    fn add_track(
        &self,
        track: Arc<dyn MediaTrack>,
        stream: Arc<dyn MediaStream>,
    ) -> Result<(), HostError>;

    /// Tracks currently attached to outbound senders.
    fn sender_tracks(&self) -> Vec<Arc<dyn MediaTrack>>;

    async fn create_offer(&self) -> Result<SessionDescription, HostError>;

    async fn set_local_description(&self, description: SessionDescription)
    -> Result<(), HostError>;

    /// The local description including every candidate gathered so far.
    fn local_description(&self) -> Option<SessionDescription>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), HostError>;

    fn ice_gathering_state(&self) -> IceGatheringState;

    fn connection_state(&self) -> PeerConnectionState;

    fn subscribe(&self) -> broadcast::Receiver<PeerEvent>;

    fn close(&self);
}

pub trait PeerConnectionFactory: Send + Sync {
    fn create(&self, config: &PeerConnectionConfig) -> Result<Arc<dyn PeerConnection>, HostError>;
}

/// The element remote audio is played through.
#[async_trait]
pub trait AudioSink: Send + Sync {
    fn attach(&self, stream: Option<Arc<dyn MediaStream>>);

    /// Starts playback. Fails when the host blocks autoplay until a user gesture.
    async fn play(&self) -> Result<(), HostError>;

    fn pause(&self);

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent>;
}
