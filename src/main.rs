//! Eco Content Pipeline — Binary Entrypoint
//! Boots the scheduler and the Axum operator API, wiring the store,
//! source registry, collectors, and background jobs.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eco_content_pipeline::api::{create_router, AppState};
use eco_content_pipeline::collect::catalog::CatalogCollector;
use eco_content_pipeline::collect::feed::FeedCollector;
use eco_content_pipeline::collect::metric::MetricCollector;
use eco_content_pipeline::config;
use eco_content_pipeline::metrics::Metrics;
use eco_content_pipeline::notify::WebhookNotifier;
use eco_content_pipeline::pipeline::{Pipeline, JOB_FEED, JOB_METRIC};
use eco_content_pipeline::scheduler::Scheduler;
use eco_content_pipeline::store::Store;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("eco_content_pipeline=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init();
    let cfg = config::load_config_default()?;
    let store = Arc::new(Store::new());

    let feed = FeedCollector::over_http(cfg.http_timeout(), cfg.feed_entry_limit)?;
    let metric = MetricCollector::from_env(cfg.http_timeout())?;
    let catalog = CatalogCollector::curated();
    let notifier = Arc::new(WebhookNotifier::from_env());

    let pipeline = Arc::new(Pipeline::new(store, cfg, feed, metric, catalog, notifier));
    pipeline.registry().seed_defaults();

    let scheduler = Arc::new(Scheduler::new());
    pipeline.clone().register_jobs(&scheduler);
    scheduler.clone().spawn_all();

    // One initial collection after seeding, through the guarded path so it
    // cannot overlap an early scheduled tick.
    {
        let s = scheduler.clone();
        tokio::spawn(async move {
            s.run_manually(JOB_FEED).await;
            s.run_manually(JOB_METRIC).await;
        });
    }

    let state = AppState {
        scheduler,
        pipeline,
    };
    let app = create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "eco content pipeline listening");
    axum::serve(listener, app).await.context("serving api")?;
    Ok(())
}
