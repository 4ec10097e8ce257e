//! Both transports behind the same `AlertSender` contract

use std::sync::Arc;
use std::time::Duration;

use mauve_relay::{
    AlertBatch, AlertSender,
    codec::decode_alert,
    transport::{
        datagram::{DatagramSender, StaticEndpoints},
        pubsub::PubSubSender,
    },
};

use crate::fake_broker::{BrokerEvent, FakeBroker};
use crate::helpers::*;

fn senders(collector: &FakeCollector, broker: &FakeBroker) -> Vec<Box<dyn AlertSender>> {
    vec![
        Box::new(DatagramSender::new(
            "src",
            Arc::new(StaticEndpoints(vec![collector.endpoint()])),
        )),
        Box::new(PubSubSender::new("src", &broker.url(), "govealert").unwrap()),
    ]
}

#[tokio::test]
async fn test_both_transports_are_interchangeable() {
    let collector = FakeCollector::bind().await;
    let mut broker = FakeBroker::start().await;
    let alert = create_test_alert("disk", "web1");

    for sender in senders(&collector, &broker) {
        let mut batch = AlertBatch::new();
        batch.add(alert.clone());

        tokio::time::timeout(Duration::from_secs(5), sender.send_batch(&mut batch, false))
            .await
            .expect("send should complete")
            .unwrap();
        assert!(batch.is_empty());
    }

    let update = collector.next_update().await;
    assert_eq!(update.source, "src");
    assert_eq!(update.alerts, vec![alert.clone()]);

    match broker
        .wait_for(|event| matches!(event, BrokerEvent::Publish { .. }))
        .await
    {
        BrokerEvent::Publish { topic, payload, .. } => {
            assert_eq!(topic, "govealert/src/web1/disk");
            assert_eq!(decode_alert(&payload).unwrap(), alert);
        }
        _ => unreachable!(),
    }
}
