//! Client-side lifecycle for a realtime voice session over WebRTC.
//!
//! The [`SessionController`] sequences a credential request, microphone capture and the
//! offer/answer exchange, then keeps one authoritative [`SessionStage`] for the presentation
//! layer. Peer connections, data channels, capture devices and the playback element are host
//! surfaces reached through the traits in [`rtc`] and [`media`].

pub mod broker;
pub mod config;
pub mod controller;
pub mod error;
pub mod event_log;
pub mod media;
pub mod rtc;
pub mod signaling;
pub mod status;
pub mod transport;

mod consts;

#[cfg(test)]
mod fakes;

pub use realtime_voice_types as types;

pub use broker::{
    CredentialBroker, EphemeralCredential, HttpCredentialBroker, SessionConfig, SessionGrant,
};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::{
    HostPorts, SessionController, SessionSnapshot, SessionStage, StartOutcome, ToggleOutcome,
};
pub use error::{HostError, PermissionError, SessionError};
pub use event_log::EventLogEntry;
pub use signaling::{HttpSignalingClient, SignalingClient};
