//! Request handlers for the dashboard API.
//!
//! Handlers return `Result<Json<_>, StatusCode>`; store and upstream
//! failures map to 500 and are logged, missing resources map to 404.

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use marketflow_analytics::{compute_all, AnomalySummary, AnomalyTrends, MarketSummary, MetricRow};
use marketflow_data::{AnomalyRecord, CandleRecord, DatabaseStats, EtlLogRecord};
use marketflow_ingest::CoinRunOutcome;
use serde::{Deserialize, Serialize};

/// Number of trailing candles embedded in market summaries.
const SUMMARY_RECENT_CANDLES: usize = 10;

fn internal<E: std::fmt::Display>(err: E) -> StatusCode {
    tracing::error!("Handler error: {}", err);
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

#[derive(Deserialize)]
pub struct LogQuery {
    pub coin: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub question: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub api: bool,
    pub database: bool,
}

#[derive(Serialize)]
pub struct CoinListResponse {
    pub coins: Vec<String>,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub coin: String,
    pub analysis: String,
}

/// Reports upstream API and store reachability.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let api = state.client.health_check().await;
    let database = state.db.stats().await.is_ok();
    Json(HealthResponse { api, database })
}

/// Lists coins present in the store.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn list_coins(
    State(state): State<AppState>,
) -> Result<Json<CoinListResponse>, StatusCode> {
    let coins = state.repos.candles.list_coins().await.map_err(internal)?;
    Ok(Json(CoinListResponse { coins }))
}

/// Returns the most recent candles for a coin, ascending.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn get_candles(
    State(state): State<AppState>,
    Path(coin): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<CandleRecord>>, StatusCode> {
    let candles = state
        .repos
        .candles
        .query_latest(&coin, query.limit.unwrap_or(100))
        .await
        .map_err(internal)?;
    Ok(Json(candles))
}

/// Returns fully-derived metric rows for a coin.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` when the coin has no candles, or
/// `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn get_metrics(
    State(state): State<AppState>,
    Path(coin): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<MetricRow>>, StatusCode> {
    let candles = state
        .repos
        .candles
        .query_latest(&coin, query.limit.unwrap_or(500))
        .await
        .map_err(internal)?;
    if candles.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    let metrics = compute_all(&candles, &state.metrics_config);
    Ok(Json(metrics.to_rows()))
}

/// Returns the compact market summary for a coin.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` when the coin has no candles, or
/// `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn get_summary(
    State(state): State<AppState>,
    Path(coin): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<MarketSummary>, StatusCode> {
    let candles = state
        .repos
        .candles
        .query_latest(&coin, query.limit.unwrap_or(500))
        .await
        .map_err(internal)?;
    if candles.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    let metrics = compute_all(&candles, &state.metrics_config);
    let summary = MarketSummary::build(&coin, &candles, &metrics, SUMMARY_RECENT_CANDLES);
    Ok(Json(summary))
}

/// Returns the most recent anomaly events for a coin.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn get_anomalies(
    State(state): State<AppState>,
    Path(coin): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AnomalyRecord>>, StatusCode> {
    let events = state
        .repos
        .anomalies
        .query_latest(Some(&coin), query.limit.unwrap_or(100))
        .await
        .map_err(internal)?;
    Ok(Json(events))
}

/// Returns counts of persisted anomaly events by type and coin.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn anomaly_summary(
    State(state): State<AppState>,
) -> Result<Json<AnomalySummary>, StatusCode> {
    let summary = state.detector.summary(None, 100).await.map_err(internal)?;
    Ok(Json(summary))
}

/// Returns daily anomaly counts for a coin over a trailing window.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn anomaly_trends(
    State(state): State<AppState>,
    Path(coin): Path<String>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<AnomalyTrends>, StatusCode> {
    let trends = state
        .detector
        .trends(&coin, query.days.unwrap_or(7))
        .await
        .map_err(internal)?;
    Ok(Json(trends))
}

/// Returns recent ETL log entries, optionally for one coin.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn etl_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<EtlLogRecord>>, StatusCode> {
    let logs = state
        .repos
        .etl_logs
        .query_latest(query.coin.as_deref(), query.limit.unwrap_or(100))
        .await
        .map_err(internal)?;
    Ok(Json(logs))
}

/// Returns store-wide statistics.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails.
pub async fn stats(State(state): State<AppState>) -> Result<Json<DatabaseStats>, StatusCode> {
    let stats = state.db.stats().await.map_err(internal)?;
    Ok(Json(stats))
}

/// Re-runs ingestion for one coin (the dashboard's refresh action).
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the run could not even be
/// recorded; per-coin ingestion failures come back as an `error` outcome.
pub async fn refresh_coin(
    State(state): State<AppState>,
    Path(coin): Path<String>,
) -> Result<Json<CoinRunOutcome>, StatusCode> {
    let outcome = state
        .pipeline
        .run_coin_logged(&coin)
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

/// Runs LLM analysis over a coin's summary, with an optional question.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` when the coin has no candles, or
/// `StatusCode::INTERNAL_SERVER_ERROR` if the store query fails. LLM
/// failures are embedded in the response text, never an error status.
pub async fn analyze_coin(
    State(state): State<AppState>,
    Path(coin): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, StatusCode> {
    let candles = state
        .repos
        .candles
        .query_latest(&coin, 500)
        .await
        .map_err(internal)?;
    if candles.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    let metrics = compute_all(&candles, &state.metrics_config);
    let summary = MarketSummary::build(&coin, &candles, &metrics, SUMMARY_RECENT_CANDLES);

    let analysis = match request.question {
        Some(question) if !question.trim().is_empty() => {
            state.llm.analyze_market_data(&summary, &question).await
        }
        _ => state.llm.generate_market_summary(&summary).await,
    };

    Ok(Json(AnalyzeResponse { coin, analysis }))
}
