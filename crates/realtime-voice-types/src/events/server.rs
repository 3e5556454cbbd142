pub mod error;

pub use error::ErrorDetails;

/// `error` and `response.error` events
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    event_id: Option<String>,

    /// Details about the error
    #[serde(default)]
    error: Option<ErrorDetails>,
}

impl ErrorEvent {
    pub fn new(error: ErrorDetails) -> Self {
        Self {
            event_id: None,
            error: Some(error),
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorDetails> {
        self.error.as_ref()
    }

    /// Reads the event from any JSON object. When the payload does not match the model only
    /// `event_id` and a string `error.message` are kept.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| Self {
            event_id: value
                .get("event_id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            error: value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(ErrorDetails::new),
        })
    }

    /// Shortcut for `error.message`.
    pub fn message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.message())
    }
}

/// `input_audio_buffer.speech_started` event
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferSpeechStartedEvent {
    #[serde(default)]
    event_id: Option<String>,

    /// Milliseconds since the session started when speech was detected
    #[serde(default)]
    audio_start_ms: Option<i64>,
    /// The ID of the user message item that will be created when speech stops
    #[serde(default)]
    item_id: Option<String>,
}

impl InputAudioBufferSpeechStartedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn audio_start_ms(&self) -> Option<i64> {
        self.audio_start_ms
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }
}

/// `input_audio_buffer.speech_stopped` event
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferSpeechStoppedEvent {
    #[serde(default)]
    event_id: Option<String>,

    /// Milliseconds since the session started when speech stopped
    #[serde(default)]
    audio_end_ms: Option<i64>,
    #[serde(default)]
    item_id: Option<String>,
}

impl InputAudioBufferSpeechStoppedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn audio_end_ms(&self) -> Option<i64> {
        self.audio_end_ms
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }
}

/// `response.completed` / `response.done` event
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseCompletedEvent {
    #[serde(default)]
    event_id: Option<String>,

    /// The response resource, kept opaque.
    #[serde(default)]
    response: Option<serde_json::Value>,
}

impl ResponseCompletedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn response(&self) -> Option<&serde_json::Value> {
        self.response.as_ref()
    }
}
