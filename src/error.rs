//! Error types for alert transport and bridging

use std::fmt;

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur while building, routing, or sending alerts
#[derive(Debug)]
pub enum RelayError {
    /// A relative time specifier could not be parsed
    ///
    /// `field` names the alert field the specifier was meant for, if known.
    InvalidTimeSpec {
        field: Option<&'static str>,
        spec: String,
    },

    /// A pub/sub topic did not split into exactly three trailing segments
    MalformedTopic { topic: String },

    /// Neither the binary nor the JSON decoder accepted a payload
    UndecodablePayload { binary: String, json: String },

    /// The service discovery lookup itself failed
    DiscoveryFailed { domain: String, reason: String },

    /// The service discovery lookup succeeded but returned no collectors
    NoEndpointsFound { domain: String },

    /// Writing a datagram to a single collector failed
    TransportWriteFailed {
        endpoint: String,
        source: std::io::Error,
    },

    /// A collector or broker address could not be parsed or resolved
    InvalidAddress(String),

    /// The pub/sub client reported an error
    Bus(String),

    /// I/O error (socket setup, config file access, etc.)
    Io(std::io::Error),
}

impl RelayError {
    /// Attach the alert field name to an `InvalidTimeSpec` error
    pub fn for_field(self, name: &'static str) -> Self {
        match self {
            RelayError::InvalidTimeSpec { spec, .. } => RelayError::InvalidTimeSpec {
                field: Some(name),
                spec,
            },
            other => other,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::InvalidTimeSpec {
                field: Some(field),
                spec,
            } => write!(f, "invalid time for {field}: [{spec}]"),
            RelayError::InvalidTimeSpec { field: None, spec } => {
                write!(f, "invalid time: [{spec}]")
            }
            RelayError::MalformedTopic { topic } => write!(f, "malformed alert topic: {topic}"),
            RelayError::UndecodablePayload { binary, json } => write!(
                f,
                "undecodable payload (binary: {binary}; json: {json})"
            ),
            RelayError::DiscoveryFailed { domain, reason } => {
                write!(f, "resolution error for {domain}: {reason}")
            }
            RelayError::NoEndpointsFound { domain } => {
                write!(f, "failed to find any mauvealert records at {domain}")
            }
            RelayError::TransportWriteFailed { endpoint, source } => {
                write!(f, "failed to send to {endpoint}: {source}")
            }
            RelayError::InvalidAddress(msg) => write!(f, "invalid address: {msg}"),
            RelayError::Bus(msg) => write!(f, "pub/sub bus error: {msg}"),
            RelayError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::TransportWriteFailed { source, .. } => Some(source),
            RelayError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Io(err)
    }
}

impl From<rumqttc::ClientError> for RelayError {
    fn from(err: rumqttc::ClientError) -> Self {
        RelayError::Bus(err.to_string())
    }
}

impl From<rumqttc::ConnectionError> for RelayError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        RelayError::Bus(err.to_string())
    }
}
