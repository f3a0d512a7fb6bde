// tests/metrics.rs
//
// One recorder per process, so this file holds a single test.
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use tube_curator::config::PipelineConfig;
use tube_curator::llm::MockClient;
use tube_curator::metrics::Metrics;
use tube_curator::recommend::{extract_recommendation, RetryMachine};

#[tokio::test]
async fn metrics_endpoint_exposes_pool_and_llm_series() {
    let cfg = PipelineConfig {
        concurrency_limit: 7,
        ..PipelineConfig::default()
    };
    let metrics = Metrics::init(&cfg).expect("recorder installs once");

    let llm = MockClient::new("'video_id': 'v1', 'explanation': 'ok'");
    let report = RetryMachine::new(&llm)
        .run("prompt", extract_recommendation)
        .await;
    assert!(report.succeeded());

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("pipeline_concurrency_limit"), "{text}");
    assert!(text.contains("llm_attempts_total"), "{text}");
}
