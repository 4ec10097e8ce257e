//! PubSubSender - publishes alerts on the MQTT bus
//!
//! There is no multi-alert envelope on the bus: every alert of a batch is
//! encoded on its own and published to `<base>/<source>/<subject>/<id>` with
//! at-least-once delivery. Each publish waits for the broker's acknowledgment
//! before the next one starts.
//!
//! The bus cannot express `replace`. A batch sent with `replace` set goes out
//! without it and a warning is logged.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tracing::{debug, info, instrument, trace, warn};

use crate::alert::Alert;
use crate::codec::encode_alert;
use crate::error::{RelayError, RelayResult};
use crate::topic;
use crate::transport::{AlertBatch, AlertSender};
use crate::util::{parse_broker, random_client_id};

const CLIENT_ID_PREFIX: &str = "govealert";

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Something that can publish a payload and wait until the broker has it
#[async_trait]
pub trait Publisher: Send {
    async fn publish_acked(&mut self, topic: String, payload: Vec<u8>) -> RelayResult<()>;
}

/// A short-lived MQTT connection that drives its own event loop
pub struct MqttPublisher {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttPublisher {
    /// Prepare a clean-session connection; it is opened on the first publish
    pub fn new(host: &str, port: u16, client_id: &str) -> Self {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(KEEP_ALIVE);
        opts.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(opts, 10);
        Self { client, eventloop }
    }

    /// Send a DISCONNECT and drive the event loop until it is out
    pub async fn disconnect(mut self) -> RelayResult<()> {
        self.client.disconnect().await?;

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
                Ok(event) => trace!("{event:?}"),
                // the broker may close first
                Err(e) => {
                    trace!("connection closed during disconnect: {e}");
                    return Ok(());
                }
            }
        }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish_acked(&mut self, topic: String, payload: Vec<u8>) -> RelayResult<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;

        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Packet::PubAck(ack)) => {
                    trace!("publish acknowledged (pkid {})", ack.pkid);
                    return Ok(());
                }
                Event::Incoming(Packet::ConnAck(_)) => debug!("connected to broker"),
                event => trace!("{event:?}"),
            }
        }
    }
}

/// Publish every alert on its own topic, in order
///
/// Stops at the first failed publish; alerts after it are not sent.
pub async fn publish_alerts<P>(
    publisher: &mut P,
    base: &str,
    source: &str,
    alerts: Vec<Alert>,
    replace: bool,
) -> RelayResult<usize>
where
    P: Publisher + ?Sized,
{
    if replace {
        warn!("replace is not possible with the MQTT transport, sending without it");
    }

    let mut sent = 0;
    for alert in alerts {
        let topic = topic::encode(base, source, alert.subject(), &alert.id);
        trace!("publishing {} to {topic}", alert.id);

        publisher.publish_acked(topic, encode_alert(&alert)).await?;
        sent += 1;
    }

    Ok(sent)
}

/// Sends batches through a fresh broker connection per call
#[derive(Debug, Clone)]
pub struct PubSubSender {
    source: String,
    host: String,
    port: u16,
    base_topic: String,
}

impl PubSubSender {
    pub fn new(
        source: impl Into<String>,
        broker: &str,
        base_topic: impl Into<String>,
    ) -> RelayResult<Self> {
        let (host, port) = parse_broker(broker).ok_or_else(|| {
            RelayError::InvalidAddress(format!("invalid broker address [{broker}]"))
        })?;

        Ok(Self {
            source: source.into(),
            host,
            port,
            base_topic: base_topic.into(),
        })
    }
}

#[async_trait]
impl AlertSender for PubSubSender {
    #[instrument(skip_all, fields(broker = %self.host, port = self.port))]
    async fn send_batch(&self, batch: &mut AlertBatch, replace: bool) -> RelayResult<()> {
        let alerts = batch.take();
        let mut publisher =
            MqttPublisher::new(&self.host, self.port, &random_client_id(CLIENT_ID_PREFIX));

        let sent =
            publish_alerts(&mut publisher, &self.base_topic, &self.source, alerts, replace).await?;
        info!("published {sent} alerts");

        publisher.disconnect().await
    }
}
