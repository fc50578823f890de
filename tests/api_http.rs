// tests/api_http.rs
// Operator API surface: status query and the manual trigger boundary.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use eco_content_pipeline::api::{create_router, AppState};
use eco_content_pipeline::collect::catalog::CatalogCollector;
use eco_content_pipeline::collect::feed::FeedCollector;
use eco_content_pipeline::collect::metric::MetricCollector;
use eco_content_pipeline::config::PipelineConfig;
use eco_content_pipeline::notify::WebhookNotifier;
use eco_content_pipeline::pipeline::Pipeline;
use eco_content_pipeline::scheduler::Scheduler;
use eco_content_pipeline::store::Store;

fn test_state() -> AppState {
    let cfg = PipelineConfig {
        source_delay_ms: 0,
        ..Default::default()
    };
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(Store::new()),
        cfg.clone(),
        FeedCollector::from_fixtures(Vec::new(), cfg.feed_entry_limit),
        MetricCollector::new(None, cfg.http_timeout()).unwrap(),
        CatalogCollector::curated(),
        Arc::new(WebhookNotifier::disabled()),
    ));
    let scheduler = Arc::new(Scheduler::new());
    pipeline.clone().register_jobs(&scheduler);
    AppState {
        scheduler,
        pipeline,
    }
}

#[tokio::test]
async fn health_answers_ok() {
    let app = create_router(test_state());
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_lists_every_registered_job() {
    let app = create_router(test_state());
    let resp = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let jobs: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(jobs.len(), 4);
    for job in &jobs {
        assert_eq!(job["is_running"], false);
        assert!(job["schedule"].as_str().is_some());
        assert!(job["next_run_at"].as_str().is_some());
    }
}

#[tokio::test]
async fn manual_trigger_for_unknown_job_is_404() {
    let app = create_router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/collect?task=definitely-not-a-job")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_cleanup_returns_a_run_summary() {
    let app = create_router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/collect?task=cleanup")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let results: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["job_id"], "cleanup");
    assert_eq!(results[0]["outcome"], "completed");
    assert_eq!(results[0]["summary"]["deleted"], 0);
}
