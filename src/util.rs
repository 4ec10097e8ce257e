use rand::Rng;
use sysinfo::System;

const MAUVE_DOMAIN: &str = "MAUVE_DOMAIN";

const DEFAULT_HOSTNAME: &str = "localhost";

const DEFAULT_BROKER_PORT: u16 = 1883;

/// Local hostname, or `localhost` if it cannot be determined
pub fn hostname() -> String {
    System::host_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string())
}

/// Domain used for collector discovery when none is given
///
/// `MAUVE_DOMAIN` wins if set; otherwise the hostname minus its first label,
/// or the hostname itself if it has only one label.
pub fn get_default_domain() -> String {
    std::env::var(MAUVE_DOMAIN).unwrap_or_else(|_| domain_of(&hostname()))
}

pub fn domain_of(host: &str) -> String {
    match host.split_once('.') {
        Some((_, domain)) if !domain.is_empty() => domain.to_string(),
        _ => host.to_string(),
    }
}

/// Split a broker address into host and port
///
/// Accepts `tcp://host:port`, `mqtt://host:port` or a bare `host[:port]`.
pub fn parse_broker(address: &str) -> Option<(String, u16)> {
    let rest = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest)
        .trim_end_matches('/');

    if rest.is_empty() {
        return None;
    }

    match rest.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            port.parse().ok().map(|port| (host.to_string(), port))
        }
        Some(_) => None,
        None => Some((rest.to_string(), DEFAULT_BROKER_PORT)),
    }
}

/// Random identifier for short-lived bus connections
pub fn random_client_id(prefix: &str) -> String {
    let suffix: u64 = rand::rng().random();
    format!("{prefix}-{suffix:016x}")
}
