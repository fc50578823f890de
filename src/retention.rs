// src/retention.rs
//! Retention pruning. Deletion is unconditional once a predicate matches;
//! there is no soft-delete. Trending and featured records outlive the
//! content horizon, and only high-cardinality metric series are pruned on
//! the short horizon.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PruneReport {
    pub articles_deleted: usize,
    pub metrics_deleted: usize,
    pub catalog_deleted: usize,
}

impl PruneReport {
    pub fn total(&self) -> usize {
        self.articles_deleted + self.metrics_deleted + self.catalog_deleted
    }
}

pub struct RetentionManager {
    store: Arc<Store>,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn prune(&self, cfg: &PipelineConfig, now: DateTime<Utc>) -> PruneReport {
        let content_cutoff = now - Duration::days(cfg.content_retention_days);
        let short_cutoff = now - Duration::days(cfg.short_retention_days);

        let articles_deleted = self.store.delete_articles_where(|a| {
            a.published_at < content_cutoff && !a.trending && !a.featured
        });

        let high_cardinality = cfg.high_cardinality_metrics.clone();
        let metrics_deleted = self.store.delete_metrics_where(|m| {
            m.recorded_at < short_cutoff && high_cardinality.contains(&m.metric_type)
        });

        let catalog_deleted = self.store.delete_catalog_where(|c| {
            c.updated_at < short_cutoff && !c.in_stock && !c.featured
        });

        let report = PruneReport {
            articles_deleted,
            metrics_deleted,
            catalog_deleted,
        };
        counter!("pipeline_pruned_total").increment(report.total() as u64);
        info!(
            articles = articles_deleted,
            metrics = metrics_deleted,
            catalog = catalog_deleted,
            "retention pass finished"
        );
        report
    }
}
