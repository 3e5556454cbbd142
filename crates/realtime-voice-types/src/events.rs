pub mod client;
pub mod server;

use client::*;
use server::*;

/// Messages the client writes to the signaling data channel.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "response.create")]
    ResponseCreate(ResponseCreateEvent),
}

/// Messages the provider writes to the signaling data channel.
///
/// Only the events the session lifecycle reacts to are modelled; everything else lands in
/// [`ServerEvent::Other`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(InputAudioBufferSpeechStartedEvent),
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped(InputAudioBufferSpeechStoppedEvent),
    #[serde(rename = "response.completed")]
    ResponseCompleted(ResponseCompletedEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseCompletedEvent),
    #[serde(rename = "response.error")]
    ResponseError(ErrorEvent),
    #[serde(other)]
    Other,
}

impl ClientEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ServerEvent {
    /// Parses one data-channel message. Returns `None` for anything that is not a JSON object
    /// with a string `type` field.
    ///
    /// The category comes from `type` alone. A payload that does not match its model is kept
    /// with whatever fields could be read.
    pub fn parse(text: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        let kind = value.get("type")?.as_str()?.to_string();
        let event = match kind.as_str() {
            "error" => ServerEvent::Error(ErrorEvent::from_value(&value)),
            "response.error" => ServerEvent::ResponseError(ErrorEvent::from_value(&value)),
            "input_audio_buffer.speech_started" => {
                ServerEvent::InputAudioBufferSpeechStarted(payload_or_default(value))
            }
            "input_audio_buffer.speech_stopped" => {
                ServerEvent::InputAudioBufferSpeechStopped(payload_or_default(value))
            }
            "response.completed" => ServerEvent::ResponseCompleted(payload_or_default(value)),
            "response.done" => ServerEvent::ResponseDone(payload_or_default(value)),
            _ => ServerEvent::Other,
        };
        Some(event)
    }
}

fn payload_or_default<T>(value: serde_json::Value) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    serde_json::from_value(value).unwrap_or_default()
}
