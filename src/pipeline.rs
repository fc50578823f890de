// src/pipeline.rs
//! Wires the registry, collectors, upsert engine, trend classifier, and
//! retention manager into the four named jobs the scheduler runs.

use std::sync::Arc;

use chrono::Utc;

use crate::collect::catalog::CatalogCollector;
use crate::collect::collect_family;
use crate::collect::feed::FeedCollector;
use crate::collect::metric::MetricCollector;
use crate::config::PipelineConfig;
use crate::notify::WebhookNotifier;
use crate::registry::SourceRegistry;
use crate::retention::RetentionManager;
use crate::scheduler::{JobResult, RunSummary, Schedule, Scheduler};
use crate::store::Store;
use crate::trending::TrendClassifier;
use crate::upsert::UpsertEngine;

pub const JOB_FEED: &str = "feed-ingestion";
pub const JOB_METRIC: &str = "metric-ingestion";
pub const JOB_CATALOG: &str = "catalog-scrape";
pub const JOB_CLEANUP: &str = "cleanup";

pub struct Pipeline {
    config: PipelineConfig,
    registry: SourceRegistry,
    engine: UpsertEngine,
    trending: TrendClassifier,
    retention: RetentionManager,
    feed: FeedCollector,
    metric: MetricCollector,
    catalog: CatalogCollector,
    notifier: Arc<WebhookNotifier>,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        config: PipelineConfig,
        feed: FeedCollector,
        metric: MetricCollector,
        catalog: CatalogCollector,
        notifier: Arc<WebhookNotifier>,
    ) -> Self {
        Self {
            registry: SourceRegistry::new(store.clone()),
            engine: UpsertEngine::new(store.clone()),
            trending: TrendClassifier::new(store.clone()),
            retention: RetentionManager::new(store),
            config,
            feed,
            metric,
            catalog,
            notifier,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Feed ingestion: every active registry source, sequential with the
    /// configured delay, then upsert, then a trend pass over the result.
    pub async fn run_feed_ingestion(&self) -> JobResult {
        let sources = self.registry.active_sources();
        let run = collect_family(&self.feed, &sources, self.config.source_delay()).await;

        let now = Utc::now();
        for id in &run.fetched_source_ids {
            self.registry.mark_fetched(*id, now);
        }

        let (counts, new_articles) = self.engine.upsert_batch(run.items);
        self.trending.reclassify(&self.config, now);
        self.notifier.notify_detached(new_articles);

        Ok(RunSummary {
            inserted: counts.inserted,
            updated: counts.updated,
            skipped: counts.skipped,
            failed_sources: run.failed_sources,
            deleted: 0,
        })
    }

    pub async fn run_metric_ingestion(&self) -> JobResult {
        let sources = MetricCollector::sources();
        let run = collect_family(&self.metric, &sources, self.config.source_delay()).await;
        let (counts, _) = self.engine.upsert_batch(run.items);
        Ok(RunSummary {
            inserted: counts.inserted,
            updated: counts.updated,
            skipped: counts.skipped,
            failed_sources: run.failed_sources,
            deleted: 0,
        })
    }

    pub async fn run_catalog_scrape(&self) -> JobResult {
        let sources = CatalogCollector::sources();
        let run = collect_family(&self.catalog, &sources, self.config.source_delay()).await;
        let (counts, _) = self.engine.upsert_batch(run.items);
        Ok(RunSummary {
            inserted: counts.inserted,
            updated: counts.updated,
            skipped: counts.skipped,
            failed_sources: run.failed_sources,
            deleted: 0,
        })
    }

    pub async fn run_cleanup(&self) -> JobResult {
        let report = self.retention.prune(&self.config, Utc::now());
        Ok(RunSummary {
            deleted: report.total(),
            ..Default::default()
        })
    }

    /// Register the four named jobs with their independent cadences.
    pub fn register_jobs(self: Arc<Self>, scheduler: &Scheduler) {
        let cfg = &self.config;

        let p = self.clone();
        scheduler.register(
            JOB_FEED,
            "Collect articles from environmental feeds",
            Schedule::Every { hours: cfg.feed_interval_hours },
            move || {
                let p = p.clone();
                async move { p.run_feed_ingestion().await }
            },
        );

        let p = self.clone();
        scheduler.register(
            JOB_METRIC,
            "Collect environmental metrics and statistics",
            Schedule::Every { hours: cfg.metric_interval_hours },
            move || {
                let p = p.clone();
                async move { p.run_metric_ingestion().await }
            },
        );

        let p = self.clone();
        scheduler.register(
            JOB_CATALOG,
            "Scrape eco product catalog observations",
            Schedule::DailyAt { hour: cfg.catalog_hour_utc },
            move || {
                let p = p.clone();
                async move { p.run_catalog_scrape().await }
            },
        );

        let p = self.clone();
        scheduler.register(
            JOB_CLEANUP,
            "Prune aged records under the retention policy",
            Schedule::DailyAt { hour: cfg.cleanup_hour_utc },
            move || {
                let p = p.clone();
                async move { p.run_cleanup().await }
            },
        );
    }
}
