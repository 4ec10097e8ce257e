use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use mauve_relay::{
    AlertBatch, AlertRequest, AlertSender,
    alert::heartbeat_requests,
    config::{default_base_topic, default_broker},
    transport::{datagram::DatagramSender, pubsub::PubSubSender},
    util::{get_default_domain, hostname},
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// UDP datagrams straight to the collectors
    Protobuf,
    /// Publish to the MQTT bus
    Mqtt,
}

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Alert ID to send
    #[arg(long, default_value = "govealert")]
    id: String,

    /// What the alert is about (defaults to this host)
    #[arg(long)]
    subject: Option<String>,

    /// Short text description of the alert
    #[arg(long, default_value = "")]
    summary: String,

    /// Longer textual description of the alert
    #[arg(long, default_value = "")]
    detail: String,

    /// The thing that generated the alert (defaults to this host)
    #[arg(long)]
    source: Option<String>,

    /// Time to raise the alert
    #[arg(long, default_value = "now")]
    raise: String,

    /// Time to clear the alert
    #[arg(long, default_value = "")]
    clear: String,

    /// Suppress alert for the specified time
    #[arg(long, default_value = "")]
    suppress: String,

    /// Replace all alerts for this source
    #[arg(long)]
    replace: bool,

    /// Domain whose _mauvealert._udp SRV records name the collectors
    #[arg(long)]
    mauve: Option<String>,

    /// Don't do normal operation, just send a 10 minute heartbeat
    #[arg(long)]
    heartbeat: bool,

    /// With --heartbeat, cancel the heartbeat (suppressed raise, then clear)
    #[arg(long, requires = "heartbeat")]
    cancel: bool,

    /// Which transport to use
    #[arg(long, value_enum, default_value_t = Transport::Protobuf)]
    transport: Transport,

    /// The MQTT broker to connect to
    #[arg(long, default_value_t = default_broker())]
    mqtt_broker: String,

    /// Base topic for MQTT transport packets
    #[arg(long, default_value_t = default_base_topic())]
    mqtt_base: String,
}

impl Args {
    fn request(&self, host: &str) -> AlertRequest {
        // a clear on its own should not carry the implicit "raise now"
        let raise = if !self.clear.is_empty() && self.raise == "now" {
            ""
        } else {
            self.raise.as_str()
        };

        AlertRequest::new(&self.id)
            .raise(raise)
            .clear(&self.clear)
            .suppress(&self.suppress)
            .subject(self.subject.as_deref().unwrap_or(host))
            .summary(&self.summary)
            .detail(&self.detail)
    }
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("mauve_relay", LevelFilter::DEBUG),
        ("govealert", LevelFilter::DEBUG),
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

    let host = hostname();
    let source = args.source.clone().unwrap_or_else(|| host.clone());

    let sender: Box<dyn AlertSender> = match args.transport {
        Transport::Mqtt => Box::new(PubSubSender::new(
            source,
            &args.mqtt_broker,
            &args.mqtt_base,
        )?),
        Transport::Protobuf => {
            let domain = args.mauve.clone().unwrap_or_else(get_default_domain);
            Box::new(
                DatagramSender::for_domain(source, &domain)
                    .with_context(|| format!("Mauve problem for {domain}"))?,
            )
        }
    };

    let requests = if args.heartbeat {
        heartbeat_requests(&host, args.cancel)
    } else {
        vec![args.request(&host)]
    };

    // one send per alert, in order
    for request in requests {
        let alert = request.build(Utc::now()).context("invalid alert")?;

        let mut batch = AlertBatch::new();
        batch.add(alert);
        sender
            .send_batch(&mut batch, args.replace)
            .await
            .with_context(|| format!("failed to send alert {}", request.id))?;
    }

    info!("done");
    Ok(())
}
