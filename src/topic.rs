//! Pub/sub topic addressing
//!
//! Alerts travel on `<base>/<source>/<subject>/<id>`. Each of the three
//! components has its slashes replaced by `_` before joining, which keeps the
//! topic depth fixed but means an embedded slash cannot be recovered.
//!
//! Liveness messages use `<base>/$heartbeat/<hostname>`, which the alert
//! wildcard `<base>/+/+/+` never matches.

use crate::error::{RelayError, RelayResult};

const SEPARATOR: char = '/';
const ESCAPE: &str = "_";

/// The (source, subject, id) triple an alert topic addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicAddress {
    pub source: String,
    pub subject: String,
    pub id: String,
}

fn escape(component: &str) -> String {
    component.replace(SEPARATOR, ESCAPE)
}

fn segments(base: &str) -> usize {
    base.split(SEPARATOR).count()
}

/// Build the topic for an alert from `source` about `subject`
pub fn encode(base: &str, source: &str, subject: &str, id: &str) -> String {
    format!(
        "{base}/{}/{}/{}",
        escape(source),
        escape(subject),
        escape(id)
    )
}

/// Recover the (source, subject, id) triple from a received topic
///
/// The topic is split into at most `segments(base) + 3` parts; anything past
/// the third trailing separator stays in the id. Fewer parts, or a prefix that
/// is not `base`, is a [`RelayError::MalformedTopic`].
pub fn decode(base: &str, topic: &str) -> RelayResult<TopicAddress> {
    let depth = segments(base);
    let parts: Vec<&str> = topic.splitn(depth + 3, SEPARATOR).collect();

    if parts.len() != depth + 3 || !base.split(SEPARATOR).eq(parts[..depth].iter().copied()) {
        return Err(RelayError::MalformedTopic {
            topic: topic.to_string(),
        });
    }

    Ok(TopicAddress {
        source: parts[depth].to_string(),
        subject: parts[depth + 1].to_string(),
        id: parts[depth + 2].to_string(),
    })
}

/// Subscription filter matching every alert topic under `base`
pub fn alert_filter(base: &str) -> String {
    format!("{base}/+/+/+")
}

/// Retained liveness topic for the process running on `hostname`
pub fn heartbeat_topic(base: &str, hostname: &str) -> String {
    format!("{base}/$heartbeat/{}", escape(hostname))
}
