//! Forward side of the bridge: drains the queue into the collector

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::transport::datagram::DatagramSender;
use crate::update::AlertUpdate;

/// Send every queued update until the queue closes
///
/// Returns the number of updates that reached the collector.
#[instrument(skip_all)]
pub async fn forward(mut queue: mpsc::Receiver<AlertUpdate>, sender: DatagramSender) -> usize {
    debug!("starting forwarder");

    let mut forwarded = 0;
    while let Some(update) = queue.recv().await {
        match sender.send_update(&update).await {
            Ok(outcome) if outcome.delivered > 0 => {
                info!("sent {} to mauve", update.describe());
                forwarded += 1;
            }
            Ok(_) => error!("failed to send {} to mauve", update.describe()),
            Err(e) => error!("cannot forward {}: {e}", update.describe()),
        }
    }

    debug!("forwarding queue closed");
    forwarded
}
