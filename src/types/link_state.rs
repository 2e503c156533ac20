//! Session lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Link lifecycle: `Disconnected → Connecting → Connected → Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    /// Whether a session exists in this state.
    pub fn is_active(self) -> bool {
        !matches!(self, LinkState::Disconnected)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => f.write_str("disconnected"),
            LinkState::Connecting => f.write_str("connecting"),
            LinkState::Connected => f.write_str("connected"),
        }
    }
}
