//! Payload encoding
//!
//! Alerts and updates are written in the binary protobuf layout the collector
//! expects. Older pub/sub senders published JSON instead, so the decoder falls
//! back to JSON when the binary form is rejected. JSON is never produced.

use prost::Message;
use tracing::trace;

use crate::alert::Alert;
use crate::error::{RelayError, RelayResult};
use crate::update::AlertUpdate;

pub fn encode_alert(alert: &Alert) -> Vec<u8> {
    alert.encode_to_vec()
}

pub fn encode_update(update: &AlertUpdate) -> Vec<u8> {
    update.encode_to_vec()
}

/// Decode an alert published on the bus, binary first, then JSON
///
/// An alert without an id is treated as undecodable by either path, so a
/// half-populated record is never handed on.
pub fn decode_alert(payload: &[u8]) -> RelayResult<Alert> {
    let binary = match Alert::decode(payload) {
        Ok(alert) if !alert.id.is_empty() => return Ok(alert),
        Ok(_) => "missing alert id".to_string(),
        Err(e) => e.to_string(),
    };

    trace!("binary decode failed ({binary}), trying json");

    let json = match serde_json::from_slice::<Alert>(payload) {
        Ok(alert) if !alert.id.is_empty() => return Ok(alert),
        Ok(_) => "missing alert id".to_string(),
        Err(e) => e.to_string(),
    };

    Err(RelayError::UndecodablePayload { binary, json })
}

pub fn decode_update(payload: &[u8]) -> RelayResult<AlertUpdate> {
    AlertUpdate::decode(payload).map_err(|e| RelayError::UndecodablePayload {
        binary: e.to_string(),
        json: "not attempted".to_string(),
    })
}
