//! User-visible status lines.

use crate::types::ServerEvent;

pub const READY: &str = "Tap the mic to start a realtime session.";
pub const PREPARING_MICROPHONE: &str = "Preparing microphone…";
pub const REQUESTING_SESSION: &str = "Requesting realtime session…";
pub const ICE_COMPLETE: &str = "ICE complete. Finalizing connection…";
pub const CONNECTING: &str = "Connecting to OpenAI…";
pub const LISTENING: &str = "Listening…";
pub const HEARD_YOU: &str = "Heard you. Processing…";
pub const WORKING: &str = "Working on a reply…";
pub const ASSISTANT_SPEAKING: &str = "Assistant speaking…";
pub const SESSION_ENDED: &str = "Session ended. Tap the mic to reconnect.";
pub const TRY_AGAIN: &str = "Tap the mic to try again.";

/// Status line for an inbound channel event, or `None` when the event does not change it.
pub fn for_server_event(event: &ServerEvent) -> Option<String> {
    match event {
        ServerEvent::InputAudioBufferSpeechStarted(_) => Some(HEARD_YOU.to_string()),
        ServerEvent::InputAudioBufferSpeechStopped(_) => Some(WORKING.to_string()),
        ServerEvent::ResponseCompleted(_) | ServerEvent::ResponseDone(_) => {
            Some(LISTENING.to_string())
        }
        ServerEvent::ResponseError(e) | ServerEvent::Error(e) => Some(format!(
            "Assistant error: {}",
            e.message().unwrap_or("unknown issue")
        )),
        ServerEvent::Other => None,
    }
}
