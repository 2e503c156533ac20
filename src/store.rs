//! Vehicle state store
//!
//! Owns the [`VehicleState`] of one session and publishes every change through
//! a `watch` channel, so snapshot readers never see a half-applied merge.

use std::time::SystemTime;
use tokio::sync::watch;

use crate::types::{FieldMap, HEARTBEAT_TYPE, VehicleState};

/// Single-writer store for the aggregated vehicle state.
#[derive(Debug)]
pub struct VehicleStateStore {
    tx: watch::Sender<VehicleState>,
}

impl VehicleStateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(VehicleState::default());
        Self { tx }
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<VehicleState> {
        self.tx.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> VehicleState {
        self.tx.borrow().clone()
    }

    /// Merge one frame's fields into its type entry.
    pub fn merge(&self, type_name: &str, fields: FieldMap) {
        self.tx.send_modify(|state| state.merge(type_name, fields));
    }

    /// Merge a vehicle heartbeat and stamp its arrival.
    ///
    /// Returns `true` when this heartbeat flipped the store to connected.
    pub fn record_heartbeat(&self, fields: FieldMap, at: SystemTime) -> bool {
        let mut became_connected = false;
        self.tx.send_modify(|state| {
            state.merge(HEARTBEAT_TYPE, fields);
            state.last_heartbeat_at = Some(at);
            if !state.is_connected {
                state.is_connected = true;
                became_connected = true;
            }
        });
        became_connected
    }

    /// Clear the connected flag. Field data is kept for the final snapshot.
    pub fn mark_disconnected(&self) {
        self.tx.send_if_modified(|state| std::mem::replace(&mut state.is_connected, false));
    }
}

impl Default for VehicleStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    fn heartbeat(custom_mode: i64) -> FieldMap {
        FieldMap::from([("custom_mode".to_string(), FieldValue::Int(custom_mode))])
    }

    #[test]
    fn connected_edge_fires_once() {
        let store = VehicleStateStore::new();
        let now = SystemTime::now();

        assert!(store.record_heartbeat(heartbeat(0), now));
        assert!(!store.record_heartbeat(heartbeat(4), now));
        assert!(!store.record_heartbeat(heartbeat(5), now));

        let snapshot = store.snapshot();
        assert!(snapshot.is_connected);
        assert_eq!(snapshot.custom_mode(), Some(5));
        assert_eq!(snapshot.last_heartbeat_at, Some(now));
    }

    #[test]
    fn subscribers_see_merges() {
        let store = VehicleStateStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.merge("ATTITUDE", FieldMap::from([("roll".to_string(), FieldValue::Float(0.25))]));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().field("ATTITUDE", "roll"), Some(&FieldValue::Float(0.25)));
    }

    #[test]
    fn disconnect_clears_flag_and_keeps_fields() {
        let store = VehicleStateStore::new();
        store.record_heartbeat(heartbeat(3), SystemTime::now());
        let mut rx = store.subscribe();

        store.mark_disconnected();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(!state.is_connected);
        assert_eq!(state.custom_mode(), Some(3));

        // Already disconnected: no new publication
        store.mark_disconnected();
        assert!(!rx.has_changed().unwrap());
    }
}
