//! Demonstration/integration binary (spec.md §7): wires the scheduler to a
//! real price/order API pair for smoke-testing. Catalog discovery, a
//! persistence layer, and chat-bot command parsing are genuinely out of
//! scope (spec.md §1); subscriptions here are seeded once from CLI args and
//! availability comes from a JSON fixture re-read every tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sniper_core::{SubscriptionSpec, SubscriptionStore, TokenCache};
use sniper_monitor::{
    EngineConfig, FileFetchAvailability, ReqwestOrderDispatcher, ReqwestPriceVerifier, Scheduler,
    TracingLogSink,
};

#[derive(Debug, Parser)]
#[command(about = "Availability-monitoring and auto-ordering engine")]
struct Args {
    /// Plan code to watch.
    #[arg(long, env)]
    plan_code: String,

    /// Datacenters to restrict watching to; empty watches everything seen.
    #[arg(long, env, value_delimiter = ',')]
    datacenters: Vec<String>,

    /// Path to a JSON fixture describing current availability, re-read
    /// every tick.
    #[arg(long, env)]
    availability_fixture: PathBuf,

    /// Base URL of the internal price/order API gateway.
    #[arg(long, env, default_value = "http://127.0.0.1:8080")]
    api_base_url: String,

    /// `X-API-Key` header value for order dispatch.
    #[arg(long, env, default_value = "")]
    api_key: String,

    /// Seconds between scheduler ticks.
    #[arg(long, env, default_value = "5")]
    check_interval_secs: u64,

    /// Notify when the watched configuration becomes available.
    #[arg(long, env, default_value = "true")]
    notify_available: bool,

    /// Notify when the watched configuration becomes unavailable.
    #[arg(long, env, default_value = "false")]
    notify_unavailable: bool,

    /// Automatically place an order the first time a transition qualifies.
    #[arg(long, env, default_value = "false")]
    auto_order: bool,

    /// Quantity to order per datacenter when `auto_order` is set.
    #[arg(long, env, default_value = "1")]
    quantity: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!(plan_code = %args.plan_code, "starting server-sniper monitor");

    let config = EngineConfig {
        check_interval_secs: args.check_interval_secs,
        api_base_url: args.api_base_url.clone(),
        api_key: args.api_key.clone(),
        ..EngineConfig::default()
    };

    let store = Arc::new(SubscriptionStore::new());
    let mut spec = SubscriptionSpec::new(args.plan_code);
    spec.datacenters = args.datacenters;
    spec.notify_available = args.notify_available;
    spec.notify_unavailable = args.notify_unavailable;
    spec.auto_order = args.auto_order;
    spec.quantity = args.quantity;
    store.add(spec);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(35))
        .build()?;

    let scheduler = Arc::new(Scheduler::new(
        config.clone(),
        store,
        Arc::new(TokenCache::new(config.token_ttl)),
        Arc::new(FileFetchAvailability::new(args.availability_fixture)),
        Arc::new(ReqwestPriceVerifier::new(
            client.clone(),
            config.api_base_url.clone(),
            config.price_deadline,
        )),
        Arc::new(ReqwestOrderDispatcher::new(
            client,
            config.api_base_url,
            config.api_key,
            config.order_deadline,
        )),
        Arc::new(LoggingSender),
        Arc::new(TracingLogSink),
    ));

    let handle = Arc::clone(&scheduler).start().expect("fresh scheduler always starts");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    scheduler.stop();
    let _ = tokio::time::timeout(Duration::from_secs(3), handle).await;

    Ok(())
}

/// Logs notifications instead of delivering them anywhere; a real deployment
/// supplies its own `SendNotification` (chat bot, webhook, ...).
struct LoggingSender;

#[async_trait::async_trait]
impl sniper_core::SendNotification for LoggingSender {
    async fn send(&self, text: &str, markup: Option<&sniper_core::ButtonGrid>) -> bool {
        let buttons: usize = markup.map_or(0, |grid| grid.rows.iter().map(Vec::len).sum());
        tracing::info!(buttons, "{text}");
        true
    }
}
