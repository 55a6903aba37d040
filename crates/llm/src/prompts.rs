//! Prompt construction over the serialized market summary.

use marketflow_analytics::MarketSummary;

fn summary_json(summary: &MarketSummary) -> String {
    serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
}

/// Prompt for answering a user's question about one coin.
#[must_use]
pub fn analysis_prompt(summary: &MarketSummary, question: &str) -> String {
    format!(
        "Here is a summary of recent market data for {}:\n\n{}\n\n\
         Question: {}\n\n\
         Answer using only the data above. Be concise and concrete.",
        summary.coin,
        summary_json(summary),
        question
    )
}

/// Prompt for a standalone market summary narrative.
#[must_use]
pub fn summary_prompt(summary: &MarketSummary) -> String {
    format!(
        "Here is a summary of recent market data for {}:\n\n{}\n\n\
         Write a short market summary covering price action, volume, and momentum.",
        summary.coin,
        summary_json(summary)
    )
}

/// Prompt for pattern detection.
#[must_use]
pub fn pattern_prompt(summary: &MarketSummary) -> String {
    format!(
        "Here is a summary of recent market data for {}:\n\n{}\n\n\
         Identify any notable patterns (trends, reversals, volume spikes) in the data.",
        summary.coin,
        summary_json(summary)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use marketflow_analytics::{compute_all, MetricsConfig};
    use marketflow_data::CandleRecord;

    fn sample_summary() -> MarketSummary {
        let base = chrono::Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<CandleRecord> = (0..5)
            .map(|i| {
                CandleRecord::new(
                    "ethereum",
                    base + chrono::Duration::hours(i),
                    4000.0,
                    4100.0,
                    3900.0,
                    4050.0,
                    500.0,
                )
            })
            .collect();
        let metrics = compute_all(&candles, &MetricsConfig::default());
        MarketSummary::build("ethereum", &candles, &metrics, 2)
    }

    #[test]
    fn test_analysis_prompt_embeds_question_and_data() {
        let prompt = analysis_prompt(&sample_summary(), "Is this a breakout?");
        assert!(prompt.contains("ethereum"));
        assert!(prompt.contains("Is this a breakout?"));
        assert!(prompt.contains("record_count"));
    }

    #[test]
    fn test_summary_prompt_embeds_coin() {
        let prompt = summary_prompt(&sample_summary());
        assert!(prompt.contains("ethereum"));
        assert!(prompt.contains("market summary"));
    }
}
