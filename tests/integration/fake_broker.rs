//! A minimal MQTT 3.1.1 broker for tests
//!
//! Accepts any number of connections, acknowledges CONNECT, SUBSCRIBE,
//! QoS 1 PUBLISH and PINGREQ, and reports every client packet it sees. After
//! acknowledging a SUBSCRIBE it pushes the configured messages to that client
//! at QoS 1. There is no routing between clients.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub message: Vec<u8>,
    pub retain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connect {
        client_id: String,
        clean_session: bool,
        will: Option<Will>,
    },
    Subscribe {
        filters: Vec<String>,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: u8,
        retain: bool,
    },
    Disconnect,
}

pub struct FakeBroker {
    port: u16,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
}

impl FakeBroker {
    pub async fn start() -> Self {
        Self::with_deliveries(vec![]).await
    }

    /// Broker that sends `deliveries` to every client once it has subscribed
    pub async fn with_deliveries(deliveries: Vec<(String, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, events) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, tx.clone(), deliveries.clone()));
            }
        });

        Self { port, events }
    }

    pub fn url(&self) -> String {
        format!("tcp://127.0.0.1:{}", self.port)
    }

    /// Next packet seen from any client, panicking if none arrives in time
    pub async fn next_event(&mut self) -> BrokerEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("broker should see a packet")
            .expect("broker stopped")
    }

    /// Skip events until one matches
    pub async fn wait_for(&mut self, matches: impl Fn(&BrokerEvent) -> bool) -> BrokerEvent {
        loop {
            let event = self.next_event().await;
            if matches(&event) {
                return event;
            }
        }
    }
}

async fn serve(
    mut stream: TcpStream,
    events: mpsc::UnboundedSender<BrokerEvent>,
    deliveries: Vec<(String, Vec<u8>)>,
) {
    let mut next_pkid: u16 = 1;

    while let Ok((header, body)) = read_packet(&mut stream).await {
        let reply = match header >> 4 {
            // CONNECT
            1 => {
                let _ = events.send(parse_connect(&body));
                Some(packet(0x20, &[0x00, 0x00]))
            }
            // PUBLISH
            3 => {
                let qos = (header >> 1) & 0x03;
                let mut pos = 0;
                let topic = String::from_utf8(take(&body, &mut pos)).unwrap();
                let pkid = (qos > 0).then(|| take_u16(&body, &mut pos));

                let _ = events.send(BrokerEvent::Publish {
                    topic,
                    payload: body[pos..].to_vec(),
                    qos,
                    retain: header & 0x01 != 0,
                });
                pkid.map(|pkid| packet(0x40, &pkid.to_be_bytes()))
            }
            // SUBSCRIBE
            8 => {
                let mut pos = 0;
                let pkid = take_u16(&body, &mut pos);
                let mut filters = Vec::new();
                while pos < body.len() {
                    filters.push(String::from_utf8(take(&body, &mut pos)).unwrap());
                    pos += 1;
                }

                let mut suback = pkid.to_be_bytes().to_vec();
                suback.extend(filters.iter().map(|_| 0x01));
                let _ = events.send(BrokerEvent::Subscribe { filters });

                if stream.write_all(&packet(0x90, &suback)).await.is_err() {
                    return;
                }
                for (topic, payload) in &deliveries {
                    let publish = publish_packet(topic, payload, next_pkid);
                    next_pkid += 1;
                    if stream.write_all(&publish).await.is_err() {
                        return;
                    }
                }
                None
            }
            // PINGREQ
            12 => Some(packet(0xd0, &[])),
            // DISCONNECT
            14 => {
                let _ = events.send(BrokerEvent::Disconnect);
                return;
            }
            // PUBACK from the client and anything else
            _ => None,
        };

        if let Some(reply) = reply
            && stream.write_all(&reply).await.is_err()
        {
            return;
        }
    }
}

async fn read_packet(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let header = stream.read_u8().await?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        len |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok((header, body))
}

fn packet(header: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![header];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(body);
    out
}

fn publish_packet(topic: &str, payload: &[u8], pkid: u16) -> Vec<u8> {
    let mut body = (topic.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(&pkid.to_be_bytes());
    body.extend_from_slice(payload);
    packet(0x32, &body)
}

fn parse_connect(body: &[u8]) -> BrokerEvent {
    let mut pos = 0;
    let _protocol = take(body, &mut pos);
    let _level = body[pos];
    let flags = body[pos + 1];
    pos += 4;

    let client_id = String::from_utf8(take(body, &mut pos)).unwrap();
    let will = (flags & 0x04 != 0).then(|| Will {
        topic: String::from_utf8(take(body, &mut pos)).unwrap(),
        message: take(body, &mut pos),
        retain: flags & 0x20 != 0,
    });

    BrokerEvent::Connect {
        client_id,
        clean_session: flags & 0x02 != 0,
        will,
    }
}

fn take_u16(buf: &[u8], pos: &mut usize) -> u16 {
    let value = u16::from_be_bytes([buf[*pos], buf[*pos + 1]]);
    *pos += 2;
    value
}

fn take(buf: &[u8], pos: &mut usize) -> Vec<u8> {
    let len = take_u16(buf, pos) as usize;
    let value = buf[*pos..*pos + len].to_vec();
    *pos += len;
    value
}
