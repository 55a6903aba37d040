use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::num::NonZeroU32;
use std::sync::Arc;

use marketflow_analytics::{compute_all, AnomalyDetector, DetectorConfig, MarketSummary, MetricsConfig};
use marketflow_coingecko::{CoinGeckoClient, CoinGeckoClientConfig};
use marketflow_core::{ApiConfig, AppConfig, ConfigLoader};
use marketflow_data::{Database, Repositories};
use marketflow_ingest::{backfill_all, standardize_all, EtlPipeline};
use marketflow_llm::{LlmClient, LlmClientConfig};
use marketflow_web_api::{ApiServer, AppState};

#[derive(Parser)]
#[command(name = "marketflow")]
#[command(about = "Crypto market-data ETL pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline once over the configured coins
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Rebuild stored history at the standard candle width
    Standardize {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Purge and reload OHLC candles from the upstream OHLC endpoint
    LoadOhlc {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Days of history to load
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Start the dashboard API server
    Server {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Override the listen address (host:port)
        #[arg(short, long)]
        addr: Option<String>,
    },
    /// Print store statistics
    Stats {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Ask the LLM about one coin's recent data
    Analyze {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Coin identifier (e.g., "bitcoin")
        #[arg(long)]
        coin: String,
        /// Free-text question; omitted -> market summary
        #[arg(long)]
        question: Option<String>,
    },
    /// Export a coin's stored candles to CSV
    Export {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Coin identifier (e.g., "bitcoin")
        #[arg(long)]
        coin: String,
        /// Output CSV file path
        #[arg(short, long)]
        output: String,
        /// Maximum candles to export
        #[arg(long, default_value_t = 1000)]
        limit: i64,
    },
}

struct AppContext {
    config: AppConfig,
    db: Arc<Database>,
    repos: Arc<Repositories>,
    client: Arc<CoinGeckoClient>,
}

fn client_config(api: &ApiConfig) -> Result<CoinGeckoClientConfig> {
    let rate_limit = NonZeroU32::new(api.rate_limit_per_minute)
        .context("api.rate_limit_per_minute must be > 0")?;

    let mut config = CoinGeckoClientConfig::default()
        .with_base_url(api.base_url.clone())
        .with_rate_limit(rate_limit)
        .with_timeout_secs(api.request_timeout_secs)
        .with_retries(api.max_retries, api.retry_delay_secs);
    if let Some(key) = &api.api_key {
        config = config.with_api_key(key.clone());
    }
    Ok(config)
}

fn metrics_config(config: &AppConfig) -> MetricsConfig {
    MetricsConfig {
        volatility_window: config.anomaly.volatility_window,
        ..MetricsConfig::default()
    }
}

fn detector(config: &AppConfig, repos: &Repositories) -> AnomalyDetector {
    AnomalyDetector::new(
        repos.anomalies.clone(),
        DetectorConfig {
            volume_threshold: config.anomaly.volume_zscore_threshold,
            price_threshold: config.anomaly.price_zscore_threshold,
            volatility_window: config.anomaly.volatility_window,
        },
    )
}

fn pipeline(ctx: &AppContext) -> EtlPipeline {
    EtlPipeline::new(
        ctx.client.clone(),
        ctx.repos.clone(),
        detector(&ctx.config, &ctx.repos),
        metrics_config(&ctx.config),
        ctx.config.etl.coins.clone(),
        ctx.config.etl.lookback_days,
    )
}

fn llm_client(config: &AppConfig) -> Result<LlmClient> {
    Ok(LlmClient::new(LlmClientConfig {
        api_key: config.llm.api_key.clone(),
        base_url: config.llm.base_url.clone(),
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        timeout_secs: 60,
    })?)
}

async fn bootstrap(config_path: &str) -> Result<AppContext> {
    let config = ConfigLoader::load_from(config_path)?;
    config.validate()?;
    tracing::info!("Configuration validated successfully");

    let db = Arc::new(
        Database::connect(&config.database.path, config.database.max_connections).await?,
    );
    let repos = Arc::new(Repositories::new(db.pool()));
    let client = Arc::new(CoinGeckoClient::new(client_config(&config.api)?)
        .map_err(|e| anyhow::anyhow!("Failed to build API client: {e}"))?);

    Ok(AppContext {
        config,
        db,
        repos,
        client,
    })
}

async fn run_etl(config_path: &str) -> Result<()> {
    let ctx = bootstrap(config_path).await?;
    let report = pipeline(&ctx).run().await?;

    for outcome in &report.outcomes {
        tracing::info!(
            "{}: {} ({} records, {} anomalies)",
            outcome.coin,
            outcome.status.as_str(),
            outcome.records_processed,
            outcome.anomalies_flagged
        );
    }

    let stats = ctx.db.stats().await?;
    tracing::info!(
        "Database statistics: {} candles, {} coins, {} anomalies, {} log entries",
        stats.ohlcv_count,
        stats.unique_coins,
        stats.anomaly_count,
        stats.etl_log_count
    );
    Ok(())
}

async fn run_standardize(config_path: &str) -> Result<()> {
    let ctx = bootstrap(config_path).await?;
    if !ctx.client.health_check().await {
        bail!("Upstream API is not accessible");
    }
    standardize_all(
        &ctx.client,
        &ctx.repos,
        &ctx.config.etl.coins,
        ctx.config.etl.standard_interval_minutes,
        ctx.config.etl.lookback_days,
    )
    .await
}

async fn run_load_ohlc(config_path: &str, days: u32) -> Result<()> {
    let ctx = bootstrap(config_path).await?;
    if !ctx.client.health_check().await {
        bail!("Upstream API is not accessible");
    }
    backfill_all(&ctx.client, &ctx.repos, &ctx.config.etl.coins, days).await
}

async fn run_server(config_path: &str, addr_override: Option<String>) -> Result<()> {
    let ctx = bootstrap(config_path).await?;
    let addr = addr_override
        .unwrap_or_else(|| format!("{}:{}", ctx.config.server.host, ctx.config.server.port));

    let state = AppState {
        db: ctx.db.clone(),
        repos: ctx.repos.clone(),
        client: ctx.client.clone(),
        pipeline: Arc::new(pipeline(&ctx)),
        detector: Arc::new(detector(&ctx.config, &ctx.repos)),
        llm: Arc::new(llm_client(&ctx.config)?),
        metrics_config: metrics_config(&ctx.config),
    };

    ApiServer::new(state).serve(&addr).await
}

async fn run_stats(config_path: &str) -> Result<()> {
    let ctx = bootstrap(config_path).await?;
    let stats = ctx.db.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_analyze(config_path: &str, coin: &str, question: Option<String>) -> Result<()> {
    let ctx = bootstrap(config_path).await?;
    let candles = ctx.repos.candles.query_latest(coin, 500).await?;
    if candles.is_empty() {
        bail!("No stored data for {coin}; run `marketflow run` first");
    }

    let metrics = compute_all(&candles, &metrics_config(&ctx.config));
    let summary = MarketSummary::build(coin, &candles, &metrics, 10);
    let llm = llm_client(&ctx.config)?;

    let analysis = match question {
        Some(question) => llm.analyze_market_data(&summary, &question).await,
        None => llm.generate_market_summary(&summary).await,
    };
    println!("{analysis}");
    Ok(())
}

async fn run_export(config_path: &str, coin: &str, output: &str, limit: i64) -> Result<()> {
    let ctx = bootstrap(config_path).await?;
    let candles = ctx.repos.candles.query_latest(coin, limit).await?;
    if candles.is_empty() {
        bail!("No stored data for {coin}");
    }

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to open {output} for writing"))?;
    for candle in &candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;

    tracing::info!("Exported {} candles for {} to {}", candles.len(), coin, output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { config } => {
            run_etl(&config).await?;
        }
        Commands::Standardize { config } => {
            run_standardize(&config).await?;
        }
        Commands::LoadOhlc { config, days } => {
            run_load_ohlc(&config, days).await?;
        }
        Commands::Server { config, addr } => {
            run_server(&config, addr).await?;
        }
        Commands::Stats { config } => {
            run_stats(&config).await?;
        }
        Commands::Analyze {
            config,
            coin,
            question,
        } => {
            run_analyze(&config, &coin, question).await?;
        }
        Commands::Export {
            config,
            coin,
            output,
            limit,
        } => {
            run_export(&config, &coin, &output, limit).await?;
        }
    }

    Ok(())
}
