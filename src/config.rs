// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "ECO_PIPELINE_CONFIG_PATH";

/// Tunables for the ingestion pipeline. The trend window and retention
/// horizons are configuration, not constants; defaults mirror the values
/// the production deployment runs with.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sliding recency window for trend classification, in days.
    pub trend_window_days: i64,
    /// A record becomes trending when its text matches one of these.
    pub trend_keywords: Vec<String>,
    /// At most this many recent candidates are evaluated per pass.
    pub trend_candidate_limit: usize,
    /// Articles older than this are eligible for deletion (days).
    pub content_retention_days: i64,
    /// Horizon for high-cardinality metrics and stale catalog items (days).
    pub short_retention_days: i64,
    /// Metric types pruned on the short horizon; everything else is kept.
    pub high_cardinality_metrics: Vec<String>,
    /// Mandatory delay between sources of the same family, milliseconds.
    pub source_delay_ms: u64,
    /// Timeout for any single outbound fetch, seconds.
    pub http_timeout_secs: u64,
    /// Only the newest N entries of a feed are considered per fetch.
    pub feed_entry_limit: usize,
    /// Cadences for the named jobs.
    pub feed_interval_hours: u64,
    pub metric_interval_hours: u64,
    /// Daily jobs fire at these UTC hours.
    pub catalog_hour_utc: u8,
    pub cleanup_hour_utc: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trend_window_days: 7,
            trend_keywords: [
                "climate change",
                "renewable energy",
                "sustainability",
                "carbon",
                "solar",
                "wind energy",
                "electric vehicle",
                "green technology",
                "biodiversity",
                "conservation",
                "pollution",
                "recycling",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            trend_candidate_limit: 10,
            content_retention_days: 90,
            short_retention_days: 30,
            high_cardinality_metrics: vec!["city_temperature".to_string()],
            source_delay_ms: 2_000,
            http_timeout_secs: 10,
            feed_entry_limit: 20,
            feed_interval_hours: 4,
            metric_interval_hours: 6,
            catalog_hour_utc: 2,
            cleanup_hour_utc: 3,
        }
    }
}

impl PipelineConfig {
    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Rejects values no schedule can represent. A typo in a daily hour
    /// must surface as a load error, not a crash later.
    fn validate(&self) -> Result<()> {
        for (field, hour) in [
            ("catalog_hour_utc", self.catalog_hour_utc),
            ("cleanup_hour_utc", self.cleanup_hour_utc),
        ] {
            if hour > 23 {
                return Err(anyhow!("{field} must be between 0 and 23, got {hour}"));
            }
        }
        Ok(())
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON.
pub fn load_config_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pipeline config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load configuration using env var + fallbacks:
/// 1) $ECO_PIPELINE_CONFIG_PATH
/// 2) config/pipeline.toml
/// 3) config/pipeline.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("ECO_PIPELINE_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/pipeline.toml");
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/pipeline.json");
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(PipelineConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    let cfg: PipelineConfig = if hint_ext == "json" || s.trim_start().starts_with('{') {
        serde_json::from_str(s).context("parsing pipeline config json")?
    } else {
        toml::from_str(s).context("parsing pipeline config toml")?
    };
    cfg.validate()?;
    Ok(cfg)
}
