use anyhow::Context;
use clap::Parser;
use mauve_relay::{
    bridge::Bridge,
    config::{BridgeConfig, read_config_file},
    util::hostname,
};
use tracing::{level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Listen for alerts on the MQTT bus and forward them to a Mauve collector
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Collector to forward to (host:port)
    #[arg(long)]
    mauve: Option<String>,

    /// The MQTT broker to connect to
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// Base topic for MQTT transport packets
    #[arg(long)]
    mqtt_base: Option<String>,
}

impl Args {
    fn config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.file {
            Some(path) => read_config_file(path)?,
            None => BridgeConfig::default(),
        };

        if let Some(collector) = &self.mauve {
            config.collector = collector.clone();
        }
        if let Some(broker) = &self.mqtt_broker {
            config.broker = broker.clone();
        }
        if let Some(base) = &self.mqtt_base {
            config.base_topic = base.clone();
        }

        Ok(config)
    }
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("mauve_relay", LevelFilter::TRACE),
        ("mqtt_receiver", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = args.config()?;

    Bridge::new(config, hostname())
        .run()
        .await
        .context("bridge stopped")
}
