use tracing::trace;

/// Configuration of the bridge process
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct BridgeConfig {
    /// Collector to forward updates to (`host:port`), resolved once at startup
    #[serde(default = "default_collector")]
    pub collector: String,

    /// MQTT broker, `tcp://host:port`
    #[serde(default = "default_broker")]
    pub broker: String,

    /// Base topic that alert and heartbeat topics are rooted under
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Seconds between retained heartbeat publishes
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Capacity of the queue between ingest and forwarding
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            collector: default_collector(),
            broker: default_broker(),
            base_topic: default_base_topic(),
            client_id: default_client_id(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_collector() -> String {
    String::from("alert.bytemark.co.uk:32741")
}

pub fn default_broker() -> String {
    String::from("tcp://localhost:1883")
}

pub fn default_base_topic() -> String {
    String::from("govealert")
}

fn default_client_id() -> String {
    String::from("govealert-mqtt-receiver")
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    50
}

pub fn read_config_file(path: &str) -> anyhow::Result<BridgeConfig> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
