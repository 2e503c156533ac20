//! Core types for link sessions.
//!
//! ## Architecture
//!
//! - [`LinkEndpoint`] describes where a session connects (TCP or UDP, host, port)
//! - [`LinkState`] is the lifecycle state of the current session
//! - [`VehicleState`] is the merged per-message-type view of vehicle telemetry
//! - [`FieldValue`] / [`FieldMap`] hold decoded field values by name
//! - [`LinkEvent`] is what a session tells the host asynchronously
//! - [`UpdateRate`] controls how often snapshot streams emit
//!
//! ## Usage Example
//!
//! ```rust
//! use mavsession::types::{FieldMap, FieldValue, VehicleState};
//!
//! let mut state = VehicleState::default();
//!
//! let mut heartbeat = FieldMap::new();
//! heartbeat.insert("base_mode".to_string(), FieldValue::Int(89));
//! heartbeat.insert("custom_mode".to_string(), FieldValue::Int(0));
//! state.merge("HEARTBEAT", heartbeat);
//!
//! let mut update = FieldMap::new();
//! update.insert("custom_mode".to_string(), FieldValue::Int(4));
//! state.merge("HEARTBEAT", update);
//!
//! assert_eq!(state.custom_mode(), Some(4));
//! assert_eq!(state.base_mode(), Some(89));
//! ```

mod endpoint;
mod event;
mod field;
mod link_state;
mod update_rate;
mod vehicle_state;

pub use endpoint::{DEFAULT_HOST, DEFAULT_PORT, LinkEndpoint, TransportKind};
pub use event::{CommandAck, DisconnectReason, Diagnostic, LinkEvent};
pub use field::{FieldMap, FieldValue};
pub use link_state::LinkState;
pub use update_rate::UpdateRate;
pub use vehicle_state::{HEARTBEAT_TYPE, VehicleState};
