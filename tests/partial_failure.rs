// tests/partial_failure.rs
// A failing source must not prevent collection from its siblings: one
// ingestion pass still persists items from the healthy sources and
// reports exactly one source-level failure.

use std::sync::Arc;

use eco_content_pipeline::collect::catalog::CatalogCollector;
use eco_content_pipeline::collect::feed::FeedCollector;
use eco_content_pipeline::collect::metric::MetricCollector;
use eco_content_pipeline::config::PipelineConfig;
use eco_content_pipeline::notify::WebhookNotifier;
use eco_content_pipeline::pipeline::Pipeline;
use eco_content_pipeline::store::Store;

#[tokio::test]
async fn one_broken_source_out_of_three_is_isolated() {
    let cfg = PipelineConfig {
        source_delay_ms: 0,
        ..Default::default()
    };
    // Fixtures exist for A and C only; B's fetch fails.
    let feed = FeedCollector::from_fixtures(
        vec![
            (
                "https://a.example/rss".to_string(),
                include_str!("fixtures/eco_feed_a.xml").to_string(),
            ),
            (
                "https://c.example/rss".to_string(),
                include_str!("fixtures/eco_feed_b.xml").to_string(),
            ),
        ],
        cfg.feed_entry_limit,
    );

    let store = Arc::new(Store::new());
    let pipeline = Pipeline::new(
        store.clone(),
        cfg.clone(),
        feed,
        MetricCollector::new(None, cfg.http_timeout()).unwrap(),
        CatalogCollector::curated(),
        Arc::new(WebhookNotifier::disabled()),
    );
    pipeline.registry().add_source("Source A", "https://a.example/rss", "Research");
    pipeline.registry().add_source("Source B", "https://b.example/rss", "Policy");
    pipeline.registry().add_source("Source C", "https://c.example/rss", "Conservation");

    let summary = pipeline.run_feed_ingestion().await.unwrap();

    assert_eq!(summary.failed_sources, 1);
    assert_eq!(summary.inserted, 4); // 2 from A, 2 from C
    assert!(store.article_by_source_key("https://green-research.example/articles/solar-record").is_some());
    assert!(store.article_by_source_key("https://conservation-watch.example/news/recycling-rates").is_some());

    // The broken source keeps last_fetched unset; the healthy ones are stamped.
    let sources = pipeline.registry().active_sources();
    let b = sources.iter().find(|s| s.name == "Source B").unwrap();
    assert!(b.last_fetched.is_none());
    let a = sources.iter().find(|s| s.name == "Source A").unwrap();
    assert!(a.last_fetched.is_some());
}
