mod consts;
mod turn_detection;

pub use consts::*;
pub use turn_detection::{ServerVadTurnDetection, TurnDetection};
