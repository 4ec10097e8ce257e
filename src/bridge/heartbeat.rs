//! Retained liveness messages for the bridge
//!
//! While running, the bridge republishes `{"hostname": .., "now": ..}` on
//! `<base>/$heartbeat/<hostname>` at a fixed interval. The same topic carries a
//! last-will message registered at connect time, which the broker publishes if
//! the bridge disappears without disconnecting.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, LastWill, QoS};
use serde_json::json;
use tokio::time::interval;
use tracing::{debug, instrument};

use crate::error::RelayResult;
use crate::topic::heartbeat_topic;

/// Publishes retained messages on the bus
#[async_trait]
pub trait RetainedPublish: Send + Sync {
    async fn publish_retained(&self, topic: &str, payload: Vec<u8>) -> RelayResult<()>;
}

#[async_trait]
impl RetainedPublish for AsyncClient {
    async fn publish_retained(&self, topic: &str, payload: Vec<u8>) -> RelayResult<()> {
        self.publish(topic, QoS::AtLeastOnce, true, payload).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Heartbeat {
    topic: String,
    hostname: String,
    period: Duration,
}

impl Heartbeat {
    pub fn new(base_topic: &str, hostname: impl Into<String>, period: Duration) -> Self {
        let hostname = hostname.into();
        Self {
            topic: heartbeat_topic(base_topic, &hostname),
            hostname,
            period,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn status_payload(&self, now: DateTime<Utc>) -> Vec<u8> {
        json!({
            "hostname": self.hostname,
            "now": now.timestamp().to_string(),
        })
        .to_string()
        .into_bytes()
    }

    pub fn last_will_payload(&self) -> Vec<u8> {
        json!({
            "hostname": self.hostname,
            "status": "not running",
        })
        .to_string()
        .into_bytes()
    }

    /// Last-will message to register with the broker when connecting
    pub fn last_will(&self) -> LastWill {
        LastWill::new(
            self.topic.clone(),
            self.last_will_payload(),
            QoS::AtLeastOnce,
            true,
        )
    }

    /// Publish the status now and then once per period, until publishing fails
    #[instrument(skip_all, fields(topic = %self.topic))]
    pub async fn run<P>(self, publisher: P) -> RelayResult<()>
    where
        P: RetainedPublish,
    {
        let mut ticker = interval(self.period);

        loop {
            ticker.tick().await;
            debug!("publishing heartbeat");
            publisher
                .publish_retained(&self.topic, self.status_payload(Utc::now()))
                .await?;
        }
    }
}
