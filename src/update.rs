//! AlertUpdate envelope
//!
//! An update carries one or more alerts from a single source in one send
//! attempt. It is built right before sending and never kept afterwards.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::time::unix_seconds;

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct AlertUpdate {
    /// The reporting entity, distinct from the subjects of the alerts
    #[prost(string, required, tag = "1")]
    pub source: String,

    /// Supersede all earlier alerts from this source
    #[prost(bool, required, tag = "2")]
    pub replace: bool,

    /// Alerts in send order
    #[prost(message, repeated, tag = "3")]
    #[serde(rename = "alert", default)]
    pub alerts: Vec<Alert>,

    /// Random tag for this send attempt, not a sequence number
    #[prost(uint64, required, tag = "4")]
    pub transmission_id: u64,

    #[prost(uint64, required, tag = "8")]
    pub transmission_time: u64,
}

impl AlertUpdate {
    /// Wrap `alerts` into an update stamped with the current time
    pub fn wrap(source: impl Into<String>, replace: bool, alerts: Vec<Alert>) -> Self {
        Self::wrap_at(source, replace, alerts, Utc::now())
    }

    /// Like [`AlertUpdate::wrap`], with the send time supplied by the caller
    pub fn wrap_at(
        source: impl Into<String>,
        replace: bool,
        alerts: Vec<Alert>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            replace,
            alerts,
            transmission_id: transmission_id(),
            transmission_time: unix_seconds(now),
        }
    }

    /// Short description used in log lines: `id@source/subject` of the first alert
    pub fn describe(&self) -> String {
        match self.alerts.first() {
            Some(alert) if self.alerts.len() == 1 => {
                format!("{}@{}/{}", alert.id, self.source, alert.subject())
            }
            Some(alert) => format!(
                "{}@{}/{} (+{} more)",
                alert.id,
                self.source,
                alert.subject(),
                self.alerts.len() - 1
            ),
            None => format!("<empty>@{}", self.source),
        }
    }
}

/// Random 63-bit transmission id
///
/// Drawn from the thread-local generator, which is seeded from the OS and
/// safe to use from any number of senders at once.
pub fn transmission_id() -> u64 {
    rand::rng().random_range(0..=i64::MAX as u64)
}
