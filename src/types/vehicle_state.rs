//! Aggregated vehicle state for one session

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

use super::{FieldMap, FieldValue};

/// Message type name of the connectivity-signalling frame.
pub const HEARTBEAT_TYPE: &str = "HEARTBEAT";

/// Cumulative view of the most recent fields seen per message type.
///
/// `by_type[T]` only exists once a frame of type `T` arrived. After that it is
/// never replaced, only merged: incoming values overwrite keys of the same name
/// and keys the new frame does not carry are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Set on the first vehicle heartbeat, cleared only by disconnect.
    pub is_connected: bool,
    /// Wall-clock time of the most recent vehicle heartbeat.
    pub last_heartbeat_at: Option<SystemTime>,
    /// Latest field set per message type name.
    pub by_type: BTreeMap<String, FieldMap>,
}

impl VehicleState {
    /// Merge `fields` into the entry for `type_name`, creating it on first use.
    pub fn merge(&mut self, type_name: &str, fields: FieldMap) {
        match self.by_type.get_mut(type_name) {
            Some(existing) => existing.extend(fields),
            None => {
                self.by_type.insert(type_name.to_string(), fields);
            }
        }
    }

    /// Field set for a message type, if any frame of that type was seen.
    pub fn get(&self, type_name: &str) -> Option<&FieldMap> {
        self.by_type.get(type_name)
    }

    /// Single field lookup.
    pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldValue> {
        self.by_type.get(type_name).and_then(|fields| fields.get(field))
    }

    /// Last reported `HEARTBEAT.custom_mode`.
    pub fn custom_mode(&self) -> Option<u32> {
        self.field(HEARTBEAT_TYPE, "custom_mode")
            .and_then(FieldValue::as_i64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Last reported `HEARTBEAT.base_mode`.
    pub fn base_mode(&self) -> Option<u8> {
        self.field(HEARTBEAT_TYPE, "base_mode")
            .and_then(FieldValue::as_i64)
            .and_then(|v| u8::try_from(v).ok())
    }
}
