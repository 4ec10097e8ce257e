//! Ingest side of the bridge: bus messages in, alert updates out
//!
//! Every alert published under `<base>/+/+/+` becomes a single-alert
//! `AlertUpdate` with `replace` unset. The topic only contributes the source;
//! subject and id come from the payload.
//!
//! A message that cannot be decoded, or that arrived on a topic that does not
//! split into source/subject/id, is logged and dropped. The loop carries on
//! with the next message.

use rumqttc::{Event, EventLoop, Packet};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

use crate::codec::decode_alert;
use crate::error::{RelayError, RelayResult};
use crate::topic;
use crate::update::AlertUpdate;

pub struct Ingest {
    base_topic: String,
    forward_tx: mpsc::Sender<AlertUpdate>,
}

impl Ingest {
    pub fn new(base_topic: impl Into<String>, forward_tx: mpsc::Sender<AlertUpdate>) -> Self {
        Self {
            base_topic: base_topic.into(),
            forward_tx,
        }
    }

    /// Turn one bus message into an update
    pub fn convert(&self, topic: &str, payload: &[u8]) -> RelayResult<AlertUpdate> {
        let alert = decode_alert(payload)?;
        let address = topic::decode(&self.base_topic, topic)?;

        Ok(AlertUpdate::wrap(address.source, false, vec![alert]))
    }

    /// Convert a message and queue it for forwarding
    ///
    /// Returns whether the message was queued. Waits while the forwarding
    /// queue is full. The only error is a closed queue, which means the
    /// forwarder is gone.
    pub async fn accept(&self, topic: &str, payload: &[u8]) -> RelayResult<bool> {
        let update = match self.convert(topic, payload) {
            Ok(update) => update,
            Err(e) => {
                warn!("skipping packet on {topic}: {e}");
                return Ok(false);
            }
        };

        trace!("got {}", update.describe());

        self.forward_tx
            .send(update)
            .await
            .map_err(|_| RelayError::Bus("forwarding queue closed".to_string()))?;

        Ok(true)
    }

    /// Drive the bus event loop, feeding every publish through [`Ingest::accept`]
    ///
    /// Returns when the bus connection fails; the bridge has no reconnect logic.
    #[instrument(skip_all, fields(base = %self.base_topic))]
    pub async fn run(self, mut eventloop: EventLoop) -> RelayResult<()> {
        loop {
            match eventloop.poll().await? {
                Event::Incoming(Packet::Publish(publish)) => {
                    debug!("packet on {}", publish.topic);
                    self.accept(&publish.topic, &publish.payload).await?;
                }
                Event::Incoming(Packet::ConnAck(_)) => info!("connected to broker"),
                Event::Incoming(Packet::SubAck(_)) => info!("subscribed to alert topics"),
                event => trace!("{event:?}"),
            }
        }
    }
}
