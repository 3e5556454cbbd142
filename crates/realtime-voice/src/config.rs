use crate::consts::*;
use crate::rtc::IceServer;
use crate::types::audio::DEFAULT_MODEL;

/// Settings for one [`SessionController`](crate::SessionController).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    broker_url: String,
    base_url: String,
    default_model: String,
    ice_servers: Vec<IceServer>,
    channel_label: String,
    greeting: Option<String>,
    event_log_capacity: usize,
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn with_broker_url(mut self, broker_url: &str) -> Self {
        self.config.broker_url = broker_url.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: &str) -> Self {
        self.config.default_model = model.to_string();
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.config.ice_servers = ice_servers;
        self
    }

    pub fn with_channel_label(mut self, label: &str) -> Self {
        self.config.channel_label = label.to_string();
        self
    }

    /// Instructions sent with the `response.create` that fires when the channel opens.
    /// `None` sends the request without instructions.
    pub fn with_greeting(mut self, greeting: Option<&str>) -> Self {
        self.config.greeting = greeting.map(str::to_string);
        self
    }

    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.config.event_log_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            base_url: BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            ice_servers: vec![IceServer::new(DEFAULT_ICE_SERVER)],
            channel_label: EVENTS_CHANNEL_LABEL.to_string(),
            greeting: Some(GREETING_INSTRUCTIONS.to_string()),
            event_log_capacity: EVENT_LOG_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Loads overrides from the environment (and a `.env` file when present):
    ///
    /// *   `REALTIME_BROKER_URL`: where the credential broker listens.
    /// *   `REALTIME_BASE_URL`: provider API root used for the SDP exchange.
    /// *   `REALTIME_MODEL`: model requested when the broker does not report one.
    /// *   `REALTIME_ICE_SERVERS`: comma-separated ICE server URLs.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(BROKER_URL_VAR) {
            builder = builder.with_broker_url(&url);
        }
        if let Ok(url) = std::env::var(BASE_URL_VAR) {
            builder = builder.with_base_url(&url);
        }
        if let Ok(model) = std::env::var(MODEL_VAR) {
            builder = builder.with_default_model(&model);
        }
        if let Ok(servers) = std::env::var(ICE_SERVERS_VAR) {
            let servers = parse_ice_servers(&servers);
            if !servers.is_empty() {
                builder = builder.with_ice_servers(servers);
            }
        }
        builder.build()
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }

    pub fn channel_label(&self) -> &str {
        &self.channel_label
    }

    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    pub fn event_log_capacity(&self) -> usize {
        self.event_log_capacity
    }
}

fn parse_ice_servers(raw: &str) -> Vec<IceServer> {
    raw.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(IceServer::new)
        .collect()
}
