use crate::session::response_modalities;

/// Per-response overrides carried by `response.create`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseConfig {
    /// The set of modalities the model responds with.
    modalities: Vec<String>,

    /// Instructions for this response only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
}

impl ResponseConfig {
    pub fn audio_and_text() -> Self {
        Self {
            modalities: response_modalities(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.to_string());
        self
    }

    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}

/// `response.create` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseCreateEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// Configuration for the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<ResponseConfig>,
}

impl Default for ResponseCreateEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCreateEvent {
    pub fn new() -> Self {
        Self {
            event_id: None,
            response: None,
        }
    }

    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn with_response(mut self, response: ResponseConfig) -> Self {
        self.response = Some(response);
        self
    }

    pub fn response(&self) -> Option<&ResponseConfig> {
        self.response.as_ref()
    }
}
