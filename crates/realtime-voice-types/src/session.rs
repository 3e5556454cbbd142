use crate::audio::{
    AUDIO_AND_TEXT, DEFAULT_MODEL, DEFAULT_VOICE, TranscriptionModel, TurnDetection, Voice,
};

/// What a client asks the credential broker for. Every field is optional and the broker is free
/// to replace any of them with its own defaults.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionPreferences {
    /// Free-text behavioral instructions for the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    /// Requested model id, ex: "gpt-realtime-mini"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// Requested voice, ex: "verse"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voice: Option<String>,
}

impl SessionPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank instructions are treated as absent.
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        let trimmed = instructions.trim();
        self.instructions = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_voice(mut self, voice: &str) -> Self {
        self.voice = Some(voice.to_string());
        self
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    /// Reads preferences out of an arbitrary JSON document, keeping only the string fields and
    /// ignoring everything else. A body that is not an object yields empty preferences.
    pub fn from_json_lenient(value: &serde_json::Value) -> Self {
        let field = |name: &str| value.get(name).and_then(|v| v.as_str());
        let mut preferences = Self::new();
        if let Some(instructions) = field("instructions") {
            preferences = preferences.with_instructions(instructions);
        }
        if let Some(model) = field("model") {
            preferences = preferences.with_model(model.trim());
        }
        if let Some(voice) = field("voice") {
            preferences = preferences.with_voice(voice.trim());
        }
        preferences
    }
}

/// Transcription of the user's side of the conversation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputAudioTranscription {
    pub model: TranscriptionModel,
}

/// Session-creation request sent by the broker to the provider.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionRequest {
    /// The realtime model the session is bound to.
    model: String,

    /// The set of modalities the model can respond with.
    modalities: Vec<String>,

    /// The voice the model uses to respond.
    voice: Voice,

    /// The default system instructions prepended to model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    /// Configuration for turn detection.
    turn_detection: TurnDetection,

    /// Configuration for input audio transcription.
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<InputAudioTranscription>,
}

impl SessionRequest {
    pub fn builder() -> SessionRequestBuilder {
        SessionRequestBuilder::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    pub fn turn_detection(&self) -> &TurnDetection {
        &self.turn_detection
    }

    pub fn input_audio_transcription(&self) -> Option<&InputAudioTranscription> {
        self.input_audio_transcription.as_ref()
    }
}

pub struct SessionRequestBuilder {
    request: SessionRequest,
}

impl Default for SessionRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRequestBuilder {
    pub fn new() -> Self {
        Self {
            request: SessionRequest {
                model: DEFAULT_MODEL.to_string(),
                modalities: vec!["text".to_string(), "audio".to_string()],
                voice: DEFAULT_VOICE,
                instructions: None,
                turn_detection: TurnDetection::default(),
                input_audio_transcription: Some(InputAudioTranscription {
                    model: TranscriptionModel::Whisper,
                }),
            },
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.request.model = model.to_string();
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.request.voice = voice;
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.request.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_modalities_disable_audio(mut self) -> Self {
        self.request.modalities = vec!["text".to_string()];
        self
    }

    pub fn with_turn_detection(mut self, turn_detection: TurnDetection) -> Self {
        self.request.turn_detection = turn_detection;
        self
    }

    pub fn with_input_audio_transcription_disable(mut self) -> Self {
        self.request.input_audio_transcription = None;
        self
    }

    pub fn build(self) -> SessionRequest {
        self.request
    }
}

/// The ephemeral credential minted by the provider.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClientSecret {
    #[serde(default)]
    value: Option<String>,

    /// Unix timestamp (seconds) after which the provider rejects the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

impl ClientSecret {
    pub fn new(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            expires_at: None,
        }
    }

    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// The token, if the provider sent a non-empty one.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }
}

/// Session resource returned by the provider and relayed verbatim by the broker.
///
/// Parsing is lenient on purpose: every field is optional so that the caller can decide which
/// missing pieces are fatal.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, alias = "effectiveModel", skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    #[serde(default, alias = "effectiveVoice", skip_serializing_if = "Option::is_none")]
    voice: Option<Voice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    turn_detection: Option<TurnDetection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<ClientSecret>,
}

impl SessionResponse {
    pub fn new(client_secret: ClientSecret) -> Self {
        Self {
            client_secret: Some(client_secret),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn turn_detection(&self) -> Option<&TurnDetection> {
        self.turn_detection.as_ref()
    }

    pub fn client_secret(&self) -> Option<&ClientSecret> {
        self.client_secret.as_ref()
    }
}

/// Modalities requested for outbound responses.
pub fn response_modalities() -> Vec<String> {
    AUDIO_AND_TEXT.iter().map(|m| m.to_string()).collect()
}
