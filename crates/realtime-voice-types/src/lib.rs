//re-export the wire types shared by the client core and the broker service
pub mod audio;
pub mod broker;
pub mod events;
pub mod session;

pub use broker::BrokerErrorBody;
pub use events::{ClientEvent, ServerEvent};
pub use session::{ClientSecret, SessionPreferences, SessionRequest, SessionResponse};
