//! Credential relay for realtime voice sessions.
//!
//! Holds the long-lived provider key and hands out short-lived client secrets, so browsers never
//! see the key itself.

pub mod config;
pub mod error;
pub mod provider;
pub mod routes;

pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use provider::{OpenAiSessionProvider, ProviderError, SessionProvider};
pub use routes::{AppState, router};
