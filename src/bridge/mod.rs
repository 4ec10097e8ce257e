//! Bridge from the MQTT bus to the datagram collector
//!
//! ## Architecture Overview
//!
//! ```text
//!   MQTT broker ──publish──▶ Ingest (owns the event loop)
//!                               │ AlertUpdate
//!                               ▼
//!                      bounded forwarding queue
//!                               │
//!                               ▼
//!                          Forwarder ──UDP──▶ collector
//!
//!   Heartbeat timer ──retained status──▶ <base>/$heartbeat/<hostname>
//! ```
//!
//! The three tasks share nothing but the queue and the bus client handle. The
//! collector address is resolved once when the bridge starts. When the queue
//! is full, ingest stops polling the bus until the forwarder catches up.
//!
//! There is no reconnect or retry: a lost bus connection ends [`Bridge::run`]
//! with an error and the process is expected to be restarted by its supervisor.
//! Updates already queued at that point are still forwarded before it returns.

use std::time::Duration;

use rumqttc::{AsyncClient, MqttOptions, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BridgeConfig;
use crate::error::{RelayError, RelayResult};
use crate::topic::alert_filter;
use crate::transport::datagram::{DatagramSender, Endpoint};
use crate::util::parse_broker;

pub mod forward;
pub mod heartbeat;
pub mod ingest;

use forward::forward;
use heartbeat::Heartbeat;
use ingest::Ingest;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

pub struct Bridge {
    config: BridgeConfig,
    hostname: String,
}

impl Bridge {
    pub fn new(config: BridgeConfig, hostname: impl Into<String>) -> Self {
        Self {
            config,
            hostname: hostname.into(),
        }
    }

    fn mqtt_options(&self, heartbeat: &Heartbeat) -> RelayResult<MqttOptions> {
        let (host, port) = parse_broker(&self.config.broker).ok_or_else(|| {
            RelayError::InvalidAddress(format!("invalid broker address [{}]", self.config.broker))
        })?;

        if self.config.client_id.trim().is_empty() {
            return Err(RelayError::Bus("client id must not be empty".to_string()));
        }

        let mut opts = MqttOptions::new(&self.config.client_id, host, port);
        opts.set_keep_alive(KEEP_ALIVE);
        opts.set_clean_session(true);
        opts.set_last_will(heartbeat.last_will());

        Ok(opts)
    }

    /// Run the bridge until the bus connection fails
    #[instrument(skip(self), fields(broker = %self.config.broker))]
    pub async fn run(self) -> RelayResult<()> {
        let collector = Endpoint::parse(&self.config.collector)?.resolve().await?;
        info!("forwarding alerts to {collector}");

        let heartbeat = Heartbeat::new(
            &self.config.base_topic,
            &self.hostname,
            Duration::from_secs(self.config.heartbeat_interval_secs),
        );

        let (client, eventloop) = AsyncClient::new(self.mqtt_options(&heartbeat)?, 10);
        client
            .subscribe(alert_filter(&self.config.base_topic), QoS::AtLeastOnce)
            .await?;

        let (forward_tx, forward_rx) = mpsc::channel(self.config.queue_capacity.max(1));

        let forwarder = tokio::spawn(forward(
            forward_rx,
            DatagramSender::for_endpoint(self.hostname.clone(), collector),
        ));
        let heartbeat = tokio::spawn(heartbeat.run(client.clone()));

        let result = Ingest::new(&self.config.base_topic, forward_tx)
            .run(eventloop)
            .await;

        shutdown(forwarder, heartbeat).await;

        result
    }
}

/// Stop the heartbeat and let the forwarder drain what ingest already queued
///
/// The forwarding queue must already be closed, or this waits forever.
async fn shutdown(forwarder: JoinHandle<usize>, heartbeat: JoinHandle<RelayResult<()>>) {
    heartbeat.abort();
    match heartbeat.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("heartbeat stopped: {e}"),
        Err(e) if e.is_cancelled() => debug!("heartbeat cancelled"),
        Err(e) => error!("heartbeat task failed: {e}"),
    }

    match forwarder.await {
        Ok(forwarded) => info!("forwarder drained after {forwarded} updates"),
        Err(e) => error!("forwarder task failed: {e}"),
    }
}
