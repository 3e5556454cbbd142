pub const BROKER_URL_VAR: &str = "REALTIME_BROKER_URL";
pub const BASE_URL_VAR: &str = "REALTIME_BASE_URL";
pub const MODEL_VAR: &str = "REALTIME_MODEL";
pub const ICE_SERVERS_VAR: &str = "REALTIME_ICE_SERVERS";

pub const DEFAULT_BROKER_URL: &str = "http://localhost:3000/api/realtime-session";
pub const BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";

pub const EVENTS_CHANNEL_LABEL: &str = "oai-events";
pub const GREETING_INSTRUCTIONS: &str =
    "Say a quick hello so the user can confirm playback, then listen for their next turn.";
pub const EVENT_LOG_CAPACITY: usize = 200;

pub const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";
pub const OPENAI_BETA_REALTIME: &str = "realtime=v1";
pub const SDP_CONTENT_TYPE: &str = "application/sdp";
