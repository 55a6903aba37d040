//! Shared application state for the dashboard API.

use marketflow_analytics::{AnomalyDetector, MetricsConfig};
use marketflow_coingecko::CoinGeckoClient;
use marketflow_data::{Database, Repositories};
use marketflow_ingest::EtlPipeline;
use marketflow_llm::LlmClient;
use std::sync::Arc;

/// Everything the handlers need, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub repos: Arc<Repositories>,
    pub client: Arc<CoinGeckoClient>,
    pub pipeline: Arc<EtlPipeline>,
    pub detector: Arc<AnomalyDetector>,
    pub llm: Arc<LlmClient>,
    pub metrics_config: MetricsConfig,
}
