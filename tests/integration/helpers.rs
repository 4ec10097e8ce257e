//! Helper functions for integration tests

use std::time::Duration;

use chrono::Utc;
use mauve_relay::{
    Alert, AlertRequest, AlertUpdate, codec::decode_update, transport::datagram::Endpoint,
};
use tokio::net::UdpSocket;

/// A UDP socket standing in for a collector
pub struct FakeCollector {
    socket: UdpSocket,
}

impl FakeCollector {
    pub async fn bind() -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.socket.local_addr().unwrap().port())
    }

    /// Wait for the next update, panicking if none arrives in time
    pub async fn next_update(&self) -> AlertUpdate {
        self.try_next_update(Duration::from_secs(2))
            .await
            .expect("collector should receive an update")
    }

    pub async fn try_next_update(&self, wait: Duration) -> Option<AlertUpdate> {
        let mut buf = vec![0u8; 65536];
        let len = tokio::time::timeout(wait, self.socket.recv(&mut buf))
            .await
            .ok()?
            .unwrap();
        Some(decode_update(&buf[..len]).unwrap())
    }
}

/// An endpoint every write to fails: broadcast without SO_BROADCAST
pub fn unreachable_endpoint() -> Endpoint {
    Endpoint::new("255.255.255.255", 32741)
}

pub fn create_test_alert(id: &str, subject: &str) -> Alert {
    AlertRequest::new(id)
        .raise("now")
        .subject(subject)
        .summary(format!("{id} on {subject}"))
        .build(Utc::now())
        .unwrap()
}
