mod config;

use clap::{Args, Parser};
use config::{CommonConfig, Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use webhook::errors::WebhookError;

#[derive(Parser)]
#[command(name = "bridge", about = "Reconciles CMS webhooks with the page store and catalog")]
enum CliCommand {
    /// Serve webhooks and the admin endpoints
    Run(RunArgs),
    /// Run a single webhook payload through the dispatcher and print the outcome
    Replay(ReplayArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: PathBuf,
}

#[derive(Args)]
struct ReplayArgs {
    #[arg(long)]
    config: PathBuf,
    /// Store the payload is delivered for
    #[arg(long)]
    store: String,
    /// Value of the topic header, e.g. ContentManagement.Entry.publish
    #[arg(long, default_value = "")]
    topic: String,
    /// File holding the webhook body
    payload: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error("could not read payload: {0}")]
    Payload(std::io::Error),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not print outcome: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    match CliCommand::parse() {
        CliCommand::Run(args) => {
            let config = Config::from_file(&args.config)?;
            let _sentry = init_logging(&config.common.logging);
            init_metrics(&config.common)?;

            tracing::info!("starting webhook service");
            webhook::run(config.webhook).await?;
        }
        CliCommand::Replay(args) => {
            let config = Config::from_file(&args.config)?;
            let _sentry = init_logging(&config.common.logging);

            let payload = tokio::fs::read(&args.payload)
                .await
                .map_err(CliError::Payload)?;
            let dispatcher = webhook::build_dispatcher(&config.webhook)?;
            let outcome = dispatcher
                .handle(&payload, &args.topic, &args.store)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

/// Installs the fmt subscriber and, with a DSN configured, the Sentry layer.
/// The returned guard flushes Sentry events when dropped.
fn init_logging(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &CommonConfig) -> Result<(), CliError> {
    let Some(MetricsConfig {
        statsd_host,
        statsd_port,
        prefix,
    }) = &config.metrics
    else {
        tracing::info!("no metrics backend configured");
        return Ok(());
    };

    let recorder = StatsdBuilder::from(statsd_host.as_str(), *statsd_port)
        .build(prefix.as_deref())
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    for defs in [
        webhook::metrics_defs::ALL_METRICS,
        stores::metrics_defs::ALL_METRICS,
    ] {
        shared::metrics_defs::describe_all(defs);
    }
    tracing::info!(statsd_host, statsd_port, "statsd metrics enabled");
    Ok(())
}
