//! DatagramSender - UDP fan-out to every collector
//!
//! Collectors are found through the `_mauvealert._udp` SRV records of a domain,
//! or given directly as a single `host:port`. Discovery runs again for every
//! send; nothing about the collector set is cached.
//!
//! ## Message Flow
//!
//! ```text
//! AlertBatch → AlertUpdate → encode once → ┬→ write task (collector 1) ─┐
//!                                          ├→ write task (collector 2) ─┼→ join all → FanOut
//!                                          └→ write task (collector N) ─┘
//! ```
//!
//! The join is the only synchronization barrier in the crate. A failed write is
//! logged and counted; it never cancels the other writes, and nothing is retried.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::error::ResolveErrorKind;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, instrument, trace};

use crate::codec::encode_update;
use crate::error::{RelayError, RelayResult};
use crate::transport::{AlertBatch, AlertSender};
use crate::update::AlertUpdate;

const SERVICE: &str = "_mauvealert";
const PROTOCOL: &str = "_udp";

/// A collector address, as produced by discovery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a manual `host:port` (or `[v6addr]:port`) collector address
    pub fn parse(address: &str) -> RelayResult<Self> {
        let invalid = || RelayError::InvalidAddress(format!("expected host:port, got [{address}]"));

        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(host, port))
    }

    /// Build an endpoint from an SRV record, dropping the root label dot
    pub fn from_srv(target: &str, port: u16) -> Self {
        Self::new(target.strip_suffix('.').unwrap_or(target), port)
    }

    /// Resolve the host name to a socket address
    pub async fn socket_addr(&self) -> RelayResult<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| RelayError::InvalidAddress(format!("cannot resolve {self}: {e}")))?;

        addrs
            .next()
            .ok_or_else(|| RelayError::InvalidAddress(format!("no addresses for {self}")))
    }

    /// Pin the endpoint to one resolved IP address
    pub async fn resolve(&self) -> RelayResult<Endpoint> {
        let addr = self.socket_addr().await?;
        Ok(Endpoint::new(addr.ip().to_string(), addr.port()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Where the set of collectors comes from
#[async_trait]
pub trait EndpointSource: Send + Sync {
    async fn endpoints(&self) -> RelayResult<Vec<Endpoint>>;
}

/// SRV based discovery for `_mauvealert._udp.<domain>`
pub struct SrvDiscovery {
    domain: String,
    resolver: TokioAsyncResolver,
}

impl SrvDiscovery {
    pub fn new(domain: impl Into<String>, resolver: TokioAsyncResolver) -> Self {
        Self {
            domain: domain.into(),
            resolver,
        }
    }

    /// Create a discovery using the system resolver configuration
    pub fn from_system_conf(domain: impl Into<String>) -> RelayResult<Self> {
        let domain = domain.into();
        let resolver =
            TokioAsyncResolver::tokio_from_system_conf().map_err(|e| RelayError::DiscoveryFailed {
                domain: domain.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self::new(domain, resolver))
    }

    pub fn query_name(&self) -> String {
        let domain = self.domain.trim_end_matches('.');
        format!("{SERVICE}.{PROTOCOL}.{domain}.")
    }
}

#[async_trait]
impl EndpointSource for SrvDiscovery {
    #[instrument(skip(self), fields(domain = %self.domain))]
    async fn endpoints(&self) -> RelayResult<Vec<Endpoint>> {
        let name = self.query_name();
        trace!("looking up {name}");

        let lookup = match self.resolver.srv_lookup(name.as_str()).await {
            Ok(lookup) => lookup,
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                return Err(RelayError::NoEndpointsFound {
                    domain: self.domain.clone(),
                });
            }
            Err(e) => {
                return Err(RelayError::DiscoveryFailed {
                    domain: self.domain.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let endpoints: Vec<Endpoint> = lookup
            .iter()
            .map(|srv| Endpoint::from_srv(&srv.target().to_utf8(), srv.port()))
            .collect();

        if endpoints.is_empty() {
            return Err(RelayError::NoEndpointsFound {
                domain: self.domain.clone(),
            });
        }

        debug!("discovered {} collectors", endpoints.len());
        Ok(endpoints)
    }
}

/// A fixed set of collectors, used for a manually given address
#[derive(Debug, Clone)]
pub struct StaticEndpoints(pub Vec<Endpoint>);

#[async_trait]
impl EndpointSource for StaticEndpoints {
    async fn endpoints(&self) -> RelayResult<Vec<Endpoint>> {
        if self.0.is_empty() {
            return Err(RelayError::NoEndpointsFound {
                domain: "<static>".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}

/// Outcome of one fan-out: how many collectors got the datagram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: usize,
}

/// Write `payload` to every endpoint concurrently and wait for all writes
pub async fn fan_out(payload: &[u8], endpoints: &[Endpoint]) -> FanOut {
    let payload: Arc<[u8]> = Arc::from(payload);

    let handles = endpoints.iter().cloned().map(|endpoint| {
        let payload = payload.clone();
        tokio::spawn(async move {
            let result = write_datagram(&endpoint, &payload).await;
            (endpoint, result)
        })
    });

    let mut outcome = FanOut::default();
    for joined in join_all(handles).await {
        match joined {
            Ok((endpoint, Ok(bytes))) => {
                debug!("sent {bytes} bytes to {endpoint}");
                outcome.delivered += 1;
            }
            Ok((_, Err(e))) => {
                error!("{e}");
                outcome.failed += 1;
            }
            Err(e) => {
                error!("datagram write task failed: {e}");
                outcome.failed += 1;
            }
        }
    }

    outcome
}

async fn write_datagram(endpoint: &Endpoint, payload: &[u8]) -> RelayResult<usize> {
    let failed = |source: std::io::Error| RelayError::TransportWriteFailed {
        endpoint: endpoint.to_string(),
        source,
    };

    let addr = match endpoint.socket_addr().await {
        Ok(addr) => addr,
        Err(e) => return Err(failed(std::io::Error::other(e.to_string()))),
    };

    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local).await.map_err(failed)?;
    socket.connect(addr).await.map_err(failed)?;
    socket.send(payload).await.map_err(failed)
}

/// Sends alert updates to the collectors named by an [`EndpointSource`]
pub struct DatagramSender {
    source: String,
    collectors: Arc<dyn EndpointSource>,
}

impl DatagramSender {
    pub fn new(source: impl Into<String>, collectors: Arc<dyn EndpointSource>) -> Self {
        Self {
            source: source.into(),
            collectors,
        }
    }

    /// Sender discovering collectors through SRV records of `domain`
    pub fn for_domain(source: impl Into<String>, domain: &str) -> RelayResult<Self> {
        Ok(Self::new(
            source,
            Arc::new(SrvDiscovery::from_system_conf(domain)?),
        ))
    }

    /// Sender targeting one fixed collector
    pub fn for_endpoint(source: impl Into<String>, endpoint: Endpoint) -> Self {
        Self::new(source, Arc::new(StaticEndpoints(vec![endpoint])))
    }

    /// Discover the collectors and write `update` to all of them
    ///
    /// Fails only if no collector could be found; individual write failures
    /// are reported in the returned [`FanOut`].
    #[instrument(skip_all, fields(update = %update.describe()))]
    pub async fn send_update(&self, update: &AlertUpdate) -> RelayResult<FanOut> {
        let endpoints = self.collectors.endpoints().await?;
        let payload = encode_update(update);

        let outcome = fan_out(&payload, &endpoints).await;
        if outcome.failed > 0 {
            error!(
                "delivered to {} of {} collectors",
                outcome.delivered,
                endpoints.len()
            );
        }
        Ok(outcome)
    }
}

#[async_trait]
impl AlertSender for DatagramSender {
    async fn send_batch(&self, batch: &mut AlertBatch, replace: bool) -> RelayResult<()> {
        let update = AlertUpdate::wrap(self.source.clone(), replace, batch.take());
        let outcome = self.send_update(&update).await?;

        info!(
            "sent {} to {} collectors",
            update.describe(),
            outcome.delivered
        );
        Ok(())
    }
}
