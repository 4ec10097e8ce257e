//! Ingest → queue → forwarder, without a broker
//!
//! Bus messages are fed straight into the ingest side; a local UDP socket plays
//! the collector.

use std::time::Duration;

use mauve_relay::{
    bridge::{forward::forward, ingest::Ingest},
    codec::encode_alert,
    transport::datagram::DatagramSender,
};
use tokio::sync::mpsc;

use crate::helpers::*;

#[tokio::test]
async fn test_bad_messages_are_dropped_and_good_ones_forwarded() {
    let collector = FakeCollector::bind().await;
    let (tx, rx) = mpsc::channel(50);
    let forwarder = tokio::spawn(forward(
        rx,
        DatagramSender::for_endpoint("relay1", collector.endpoint()),
    ));

    let ingest = Ingest::new("govealert", tx);
    let disk = create_test_alert("disk", "web1");

    // undecodable by either decoder
    assert!(!ingest.accept("govealert/src1/web1/disk", b"\xff\xff\xff\x00").await.unwrap());
    // topic missing the id segment
    assert!(!ingest.accept("govealert/src1/web1", &encode_alert(&disk)).await.unwrap());
    // binary
    assert!(ingest.accept("govealert/src1/web1/disk", &encode_alert(&disk)).await.unwrap());
    // legacy json
    let json = br#"{"id":"load","subject":"web2","raise_time":1700000000}"#;
    assert!(ingest.accept("govealert/src2/web2/load", json).await.unwrap());

    let first = collector.next_update().await;
    assert_eq!(first.source, "src1");
    assert!(!first.replace);
    assert_eq!(first.alerts, vec![disk]);

    let second = collector.next_update().await;
    assert_eq!(second.source, "src2");
    assert_eq!(second.alerts[0].id, "load");
    assert_eq!(second.alerts[0].raise_time, 1_700_000_000);

    assert!(collector.try_next_update(Duration::from_millis(200)).await.is_none());

    drop(ingest);
    assert_eq!(forwarder.await.unwrap(), 2);
}

#[tokio::test]
async fn test_payload_fields_win_over_topic() {
    let (tx, mut rx) = mpsc::channel(1);
    let ingest = Ingest::new("site/alerts", tx);

    let alert = create_test_alert("disk", "web1");
    ingest
        .accept("site/alerts/src/some-other-subject/some-other-id", &encode_alert(&alert))
        .await
        .unwrap();

    let update = rx.recv().await.unwrap();
    assert_eq!(update.source, "src");
    assert_eq!(update.alerts[0].subject(), "web1");
    assert_eq!(update.alerts[0].id, "disk");
}

#[tokio::test]
async fn test_full_queue_blocks_ingest() {
    let (tx, mut rx) = mpsc::channel(1);
    let ingest = Ingest::new("govealert", tx);
    let payload = encode_alert(&create_test_alert("disk", "web1"));

    ingest.accept("govealert/src/web1/disk", &payload).await.unwrap();

    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        ingest.accept("govealert/src/web1/disk", &payload),
    )
    .await;
    assert!(blocked.is_err(), "second accept should wait for queue space");

    rx.recv().await.unwrap();
    assert!(ingest.accept("govealert/src/web1/disk", &payload).await.unwrap());
}
