//! Local capture: the host's media-device surface and the manager that owns the microphone.

use crate::error::{HostError, PermissionError, SessionError};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single media track owned by the host.
pub trait MediaTrack: Debug + Send + Sync {
    fn id(&self) -> String;
    fn kind(&self) -> TrackKind;
    /// Processing hint for downstream consumers, ex: "speech".
    fn set_content_hint(&self, hint: &str);
    fn stop(&self);
}

/// A group of tracks that play or are sent together.
pub trait MediaStream: Debug + Send + Sync {
    fn id(&self) -> String;
    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>>;

    fn audio_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks()
            .into_iter()
            .filter(|track| track.kind() == TrackKind::Audio)
            .collect()
    }
}

/// Stream synthesized locally when the remote side sends a track without a stream.
#[derive(Debug)]
pub struct TrackGroup {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl TrackGroup {
    pub fn single(track: Arc<dyn MediaTrack>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: format!("group-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            tracks: vec![track],
        }
    }
}

impl MediaStream for TrackGroup {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks.clone()
    }
}

/// What the host can tell about its capture environment before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureContext {
    pub is_browser: bool,
    pub is_secure_context: bool,
    pub capture_supported: bool,
}

impl CaptureContext {
    pub const SECURE_BROWSER: CaptureContext = CaptureContext {
        is_browser: true,
        is_secure_context: true,
        capture_supported: true,
    };

    /// Checks the preconditions in the order the user would have to fix them.
    pub fn check(&self) -> Result<(), PermissionError> {
        if !self.is_browser {
            return Err(PermissionError::NotInBrowser);
        }
        if !self.is_secure_context {
            return Err(PermissionError::InsecureContext);
        }
        if !self.capture_supported {
            return Err(PermissionError::CaptureUnavailable);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl AudioConstraints {
    /// AGC stays off so it does not fight the provider's own level normalization.
    pub const MICROPHONE: AudioConstraints = AudioConstraints {
        echo_cancellation: true,
        noise_suppression: true,
        auto_gain_control: false,
    };
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    fn context(&self) -> CaptureContext;

    /// Prompts for (or reuses a grant for) an audio input stream.
    async fn get_user_media(
        &self,
        constraints: AudioConstraints,
    ) -> Result<Arc<dyn MediaStream>, HostError>;
}

/// Owns the local microphone stream. Acquisition is idempotent and the stream is only stopped
/// by [`MicrophoneManager::release`].
pub struct MicrophoneManager {
    devices: Arc<dyn MediaDevices>,
    stream: Mutex<Option<Arc<dyn MediaStream>>>,
}

impl MicrophoneManager {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            stream: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) -> Result<Arc<dyn MediaStream>, SessionError> {
        if let Some(stream) = self.current() {
            tracing::debug!(stream = %stream.id(), "reusing held microphone stream");
            return Ok(stream);
        }

        self.devices.context().check()?;

        tracing::debug!("requesting microphone access");
        let stream = self
            .devices
            .get_user_media(AudioConstraints::MICROPHONE)
            .await
            .map_err(|e| PermissionError::Denied(e.to_string()))?;

        let mut held = self.held();
        if let Some(existing) = held.as_ref() {
            // Another acquisition finished first; keep its stream.
            if !Arc::ptr_eq(existing, &stream) {
                stop_tracks(stream.as_ref());
            }
            return Ok(existing.clone());
        }
        tracing::info!(stream = %stream.id(), "microphone acquired");
        *held = Some(stream.clone());
        Ok(stream)
    }

    /// Stops every track and forgets the stream. Returns whether anything was held.
    pub fn release(&self) -> bool {
        let Some(stream) = self.held().take() else {
            return false;
        };
        stop_tracks(stream.as_ref());
        tracing::info!(stream = %stream.id(), "microphone released");
        true
    }

    pub fn current(&self) -> Option<Arc<dyn MediaStream>> {
        self.held().clone()
    }

    pub fn is_held(&self) -> bool {
        self.held().is_some()
    }

    fn held(&self) -> MutexGuard<'_, Option<Arc<dyn MediaStream>>> {
        self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn stop_tracks(stream: &dyn MediaStream) {
    for track in stream.tracks() {
        track.stop();
    }
}
