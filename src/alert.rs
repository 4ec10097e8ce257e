//! Alert records and the builder that turns raw field strings into them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::time::{resolve, unix_seconds};
use crate::util::hostname;

/// One reported state change about a subject
///
/// Time fields are absolute Unix timestamps; zero means "not requested" and
/// is left off the wire, so the collector treats it as no change.
#[derive(Clone, PartialEq, Eq, Hash, prost::Message, Serialize, Deserialize)]
pub struct Alert {
    #[prost(string, required, tag = "1")]
    pub id: String,

    #[prost(string, optional, tag = "2")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[prost(string, optional, tag = "3")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[prost(string, optional, tag = "4")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[prost(uint64, tag = "5")]
    #[serde(default, skip_serializing_if = "is_unset")]
    pub raise_time: u64,

    #[prost(uint64, tag = "6")]
    #[serde(default, skip_serializing_if = "is_unset")]
    pub clear_time: u64,

    #[prost(uint64, tag = "8")]
    #[serde(default, skip_serializing_if = "is_unset")]
    pub suppress_until: u64,
}

fn is_unset(time: &u64) -> bool {
    *time == 0
}

/// Raw, unparsed alert fields as they arrive from a command line or caller
///
/// Empty strings mean "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertRequest {
    pub id: String,
    pub raise: String,
    pub clear: String,
    pub suppress: String,
    pub subject: String,
    pub summary: String,
    pub detail: String,
}

impl AlertRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn raise(mut self, spec: impl Into<String>) -> Self {
        self.raise = spec.into();
        self
    }

    pub fn clear(mut self, spec: impl Into<String>) -> Self {
        self.clear = spec.into();
        self
    }

    pub fn suppress(mut self, spec: impl Into<String>) -> Self {
        self.suppress = spec.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Resolve the time specifiers against `now` and build the alert
    ///
    /// Any specifier that fails to parse aborts the build, and the error names
    /// the field it belonged to. Empty specifiers leave their field unset. An
    /// empty subject falls back to the local hostname.
    pub fn build(&self, now: DateTime<Utc>) -> RelayResult<Alert> {
        let raise_time = resolve_field("raise", &self.raise, now)?;
        let clear_time = resolve_field("clear", &self.clear, now)?;
        let suppress_until = resolve_field("suppress", &self.suppress, now)?;

        let subject = if self.subject.is_empty() {
            hostname()
        } else {
            self.subject.clone()
        };

        Ok(Alert {
            id: self.id.clone(),
            subject: Some(subject),
            summary: non_empty(&self.summary),
            detail: non_empty(&self.detail),
            raise_time,
            clear_time,
            suppress_until,
        })
    }
}

fn resolve_field(name: &'static str, spec: &str, now: DateTime<Utc>) -> RelayResult<u64> {
    if spec.is_empty() {
        return Ok(0);
    }

    let time = resolve(spec, now).map_err(|e| e.for_field(name))?;

    // zero on the wire means "no change", so the epoch and earlier cannot be sent
    if time.timestamp() <= 0 {
        return Err(RelayError::InvalidTimeSpec {
            field: Some(name),
            spec: spec.to_string(),
        });
    }

    Ok(unix_seconds(time))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

const HEARTBEAT_ID: &str = "heartbeat";

/// Alerts implementing the dead-man's heartbeat for `host`
///
/// A normal heartbeat clears the alert now and schedules a raise in ten
/// minutes, so the collector raises it unless another heartbeat arrives first.
/// Cancelling sends a suppressed raise followed by a clear; the two must be
/// sent one after the other.
pub fn heartbeat_requests(host: &str, cancel: bool) -> Vec<AlertRequest> {
    let base = AlertRequest::new(HEARTBEAT_ID)
        .subject(host)
        .summary(format!("heartbeat failed for {host}"))
        .detail(format!(
            "The govealert heartbeat wasn't sent for the host {host}."
        ));

    if cancel {
        vec![
            base.clone().raise("now").suppress("+5m"),
            base.clear("now"),
        ]
    } else {
        vec![base.raise("+10m").clear("now")]
    }
}
