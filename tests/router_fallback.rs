//! End-to-end routing tests against a mocked provider endpoint.
//!
//! Call counts are asserted through wiremock expectations, which are
//! verified when each `MockServer` drops. This pins the one-shot fallback
//! contract: remote is attempted at most once per call and never retried.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use axiomhive::router::ModelSelection;
use axiomhive::{AxiomRouter, RouterConfig, RouterError, SourceBackend};

const PRO_PATH: &str = "/v1beta/models/gemini-3-pro-preview:generateContent";
const FLASH_PATH: &str = "/v1beta/models/gemini-3-flash-preview:generateContent";

fn router_for(server: &MockServer) -> AxiomRouter {
    AxiomRouter::from_config(RouterConfig {
        api_key: Some("test-key".into()),
        base_url: Some(server.uri()),
        fixed_relevance: Some(0.5),
        ..RouterConfig::default()
    })
}

/// Provider payload carrying a single text part.
fn text_payload(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}]}
        }]
    })
}

#[tokio::test]
async fn remote_success_is_tagged_remote_primary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("substrate nominal")))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let result = router.process_command("status").await.unwrap();

    assert_eq!(result.text, "substrate nominal");
    assert_eq!(result.source, SourceBackend::RemotePrimary);
    assert!(result.token_estimate > 0);
}

#[tokio::test]
async fn server_error_falls_back_to_local_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let result = router.process_command("status").await.unwrap();

    assert_eq!(result.source, SourceBackend::Local);
    assert!(result.text.starts_with("DSI_OPERATIONAL"));
}

#[tokio::test]
async fn empty_candidate_list_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let result = router.process_command("status").await.unwrap();
    assert_eq!(result.source, SourceBackend::Local);
}

#[tokio::test]
async fn secondary_selection_routes_to_flash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("fast answer")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("wrong model")))
        .expect(0)
        .mount(&server)
        .await;

    let router = router_for(&server);
    router.switch_model(ModelSelection::Secondary);
    let result = router.process_command("status").await.unwrap();

    assert_eq!(result.text, "fast answer");
    assert_eq!(result.source, SourceBackend::RemoteSecondary);
}

#[tokio::test]
async fn empty_input_makes_no_remote_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("unreachable")))
        .expect(0)
        .mount(&server)
        .await;

    let router = router_for(&server);
    assert!(matches!(
        router.process_command("  ").await,
        Err(RouterError::EmptyInput)
    ));
}

#[tokio::test]
async fn blocked_input_makes_no_remote_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("unreachable")))
        .expect(0)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let result = router.process_command("plan some violence").await.unwrap();
    assert_eq!(result.source, SourceBackend::Local);
    assert_eq!(result.text, "Sorry, I can't assist with that.");
}

#[tokio::test]
async fn search_intel_extracts_grounding_sources() {
    let server = MockServer::start().await;
    let payload = json!({
        "candidates": [{
            "content": {"parts": [{"text": "grounded intel"}]},
            "groundingMetadata": {
                "groundingChunks": [
                    {"web": {"title": "Field Report", "uri": "https://example.com/r"}}
                ]
            }
        }]
    });
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let report = router.search_intel("recent events").await.unwrap();

    assert_eq!(report.text, "grounded intel");
    assert_eq!(report.backend, SourceBackend::RemotePrimary);
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].title.as_deref(), Some("Field Report"));
}

#[tokio::test]
async fn search_failure_falls_back_to_local_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let report = router.search_intel("recent events").await.unwrap();

    assert_eq!(report.backend, SourceBackend::Local);
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].title.as_deref(), Some("Local Model (cpu)"));
}

#[tokio::test]
async fn recursive_depth_two_makes_exactly_three_calls() {
    let server = MockServer::start().await;
    // Two analysis passes on the secondary model.
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("refined query")))
        .expect(2)
        .mount(&server)
        .await;
    // One base-case call on the primary model.
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("final answer")))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let text = router.recursive_query("origin of axioms", 2).await.unwrap();
    assert_eq!(text, "final answer");
}

#[tokio::test]
async fn recursive_depth_zero_is_a_single_base_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("unused")))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("direct answer")))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let text = router.recursive_query("origin of axioms", 0).await.unwrap();
    assert_eq!(text, "direct answer");
}

#[tokio::test]
async fn recursive_analysis_failure_halts_with_diagnostic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("unreached")))
        .expect(0)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let text = router.recursive_query("origin of axioms", 3).await.unwrap();
    assert!(
        text.starts_with("MOR_HALT: Recursive processing failed."),
        "got: {text}"
    );
}

#[tokio::test]
async fn grounded_query_validates_against_constraints() {
    let server = MockServer::start().await;
    let grounded = json!({
        "candidates": [{
            "content": {"parts": [{"text": "grounded response"}]},
            "groundingMetadata": {
                "groundingChunks": [
                    {"web": {"uri": "https://example.com/a"}},
                    {"web": {}}
                ]
            }
        }]
    });
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(grounded))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("VALID")))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let report = router
        .grounded_query("field audit", &["must cite sources".to_string()])
        .await
        .unwrap();

    assert_eq!(report.response, "grounded response");
    assert!(report.ontology_valid);
    assert_eq!(report.grounding.len(), 2);
    assert_eq!(report.grounding[0].source, "https://example.com/a");
    assert_eq!(report.grounding[1].source, "Unknown source");
    assert!(report.grounding.iter().all(|g| g.relevance == 0.5));
}

#[tokio::test]
async fn grounded_query_reports_invalid_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("claim")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("INVALID")))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let report = router
        .grounded_query("field audit", &["must cite sources".to_string()])
        .await
        .unwrap();
    assert!(!report.ontology_valid);
}

#[tokio::test]
async fn grounded_query_skips_validation_without_constraints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("claim")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("VALID")))
        .expect(0)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let report = router.grounded_query("field audit", &[]).await.unwrap();
    assert!(report.ontology_valid);
}

#[tokio::test]
async fn grounded_validation_failure_collapses_to_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("claim")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let report = router
        .grounded_query("field audit", &["must cite sources".to_string()])
        .await
        .unwrap();
    assert!(!report.ontology_valid);
}

#[tokio::test]
async fn grounded_main_call_failure_falls_back_to_local() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_PATH))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("VALID")))
        .expect(0)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let report = router
        .grounded_query("field audit", &["must cite sources".to_string()])
        .await
        .unwrap();

    assert_eq!(report.backend, SourceBackend::Local);
    assert!(report.ontology_valid);
}

#[tokio::test]
async fn telemetry_parses_provider_payload() {
    let server = MockServer::start().await;
    let logs = r#"[{"timestamp":"2026-08-26T00:00:00Z","level":"WARN","subsystem":"GRID","message":"flux"}]"#;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload(logs)))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let entries = router.system_telemetry().await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].subsystem, "GRID");
}

#[tokio::test]
async fn malformed_telemetry_payload_collapses_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_payload("not json at all")))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    assert!(router.system_telemetry().await.is_empty());
}

#[tokio::test]
async fn telemetry_remote_failure_yields_local_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&server);
    let entries = router.system_telemetry().await;
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().any(|e| e.subsystem == "ROUTER"));
}
