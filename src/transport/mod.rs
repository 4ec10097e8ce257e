//! Alert transports
//!
//! Two backends deliver alerts to the monitoring collector:
//!
//! - [`datagram::DatagramSender`] wraps the whole batch in one `AlertUpdate`
//!   and writes it to every discovered collector over UDP.
//! - [`pubsub::PubSubSender`] publishes each alert on its own topic on the
//!   MQTT bus, where a bridge picks it up.
//!
//! Callers own the [`AlertBatch`] and hand it to whichever sender was chosen;
//! senders keep no batch state between calls.

use async_trait::async_trait;

use crate::alert::Alert;
use crate::error::RelayResult;

pub mod datagram;
pub mod pubsub;

/// Alerts collected for a single send, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertBatch {
    alerts: Vec<Alert>,
}

impl AlertBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Empty the batch, returning what it held
    pub fn take(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.alerts)
    }
}

impl FromIterator<Alert> for AlertBatch {
    fn from_iter<I: IntoIterator<Item = Alert>>(iter: I) -> Self {
        Self {
            alerts: iter.into_iter().collect(),
        }
    }
}

/// The sending contract shared by both transports
///
/// `send_batch` makes one attempt and never retries. The batch is empty when
/// the call returns, whether it succeeded or not.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send_batch(&self, batch: &mut AlertBatch, replace: bool) -> RelayResult<()>;
}
