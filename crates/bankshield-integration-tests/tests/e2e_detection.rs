//! End-to-end detection tests
//!
//! Router → DetectionContext → HttpTokenClassifier (wiremock) → schema validation

use axum::http::StatusCode;
use bankshield_integration_tests::{
    config_with_classifiers, get_json, get_text, post_json, router_for, shipped_schema,
};
use bankshield_observability::Metrics;
use bankshield_server::app::AppState;
use bankshield_server::build_router;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

async fn classifier_returning(predictions: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(predictions))
        .mount(&server)
        .await;
    server
}

fn ml_only(text: &str) -> Value {
    json!({
        "text": text,
        "use_regex": false,
        "use_contextual": false,
        "use_names": false
    })
}

fn assert_spans_valid(text: &str, body: &Value) {
    for list in ["entities", "filtered_entities"] {
        for entity in body[list].as_array().unwrap() {
            let start = entity["start"].as_u64().unwrap() as usize;
            let end = entity["end"].as_u64().unwrap() as usize;
            assert!(start < end);
            assert_eq!(&text[start..end], entity["text"].as_str().unwrap());
        }
    }
}

#[tokio::test]
async fn test_pattern_detection_with_shipped_schema() {
    let (app, _) = router_for(&config_with_classifiers(&[]));
    let text = "Customer PAN ABCPD1234E, phone 9876543210, email arun.kumar@example.com";

    let (status, body) = post_json(app, "/api/validated/detect", json!({ "text": text })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "validated_enhanced_multi_method");

    let categories: Vec<&str> = body["summary"]["categories_found"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    for expected in ["EMAIL", "PAN", "TELEPHONENUM"] {
        assert!(categories.contains(&expected), "missing {}", expected);
    }
    assert_spans_valid(text, &body);
}

#[tokio::test]
async fn test_trunk_prefixed_phone_keeps_its_category() {
    let (app, _) = router_for(&config_with_classifiers(&[]));
    let text = "phone: 09876543210";

    let (status, body) = post_json(app, "/api/validated/detect", json!({ "text": text })).await;

    assert_eq!(status, StatusCode::OK);
    let entities = body["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["category"], "TELEPHONENUM");
    assert_eq!(entities[0]["text"], "09876543210");
    assert_eq!(entities[0]["method"], "regex+contextual");
    assert!(entities[0]["original_category"].is_null());
    assert_spans_valid(text, &body);
}

#[tokio::test]
async fn test_ml_mislabel_is_cross_validated() {
    let server = classifier_returning(json!([
        {"entity_group": "AADHAAR", "score": 0.97, "word": "9876543210", "start": 5, "end": 15}
    ]))
    .await;
    let config = config_with_classifiers(&[("bert", format!("{}/classify", server.uri()))]);
    let (app, metrics) = router_for(&config);

    let (status, body) = post_json(
        app.clone(),
        "/api/validated/detect",
        ml_only("Ping 9876543210"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let entities = body["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["category"], "TELEPHONENUM");
    assert_eq!(entities[0]["original_category"], "AADHAAR");
    assert_eq!(entities[0]["method"], "ml");
    assert_eq!(
        entities[0]["validation"]["reason"],
        "Cross-validated: matches TELEPHONENUM pattern instead of AADHAAR"
    );
    assert_eq!(body["summary"]["methods_used"], json!(["ml"]));

    assert_eq!(
        metrics
            .cross_validation_corrections_total
            .with_label_values(&["AADHAAR", "TELEPHONENUM"])
            .get(),
        1
    );

    let (_, exposition) = get_text(app, "/metrics").await;
    assert!(exposition.contains("bankshield_cross_validation_corrections_total"));
}

#[tokio::test]
async fn test_fragment_is_filtered() {
    let server = classifier_returning(json!([
        {"entity_group": "AADHAAR", "score": 0.70, "start": 4, "end": 8}
    ]))
    .await;
    let config = config_with_classifiers(&[("bert", format!("{}/classify", server.uri()))]);
    let (app, _) = router_for(&config);

    let (status, body) = post_json(app, "/api/validated/detect", ml_only("ref 9012")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["entities"].as_array().unwrap().is_empty());
    let filtered = &body["filtered_entities"][0];
    assert_eq!(filtered["category"], "AADHAAR");
    assert_eq!(filtered["text"], "9012");
    assert_eq!(filtered["status"], "FILTERED");
    assert!(
        filtered["filter_reason"]
            .as_str()
            .unwrap()
            .starts_with("Does not match AADHAAR schema pattern")
    );
    assert_eq!(body["summary"]["validation_rate"], 0.0);
}

#[tokio::test]
async fn test_character_offsets_are_mapped_to_bytes() {
    // "Zoë" takes 4 bytes but 3 characters
    let text = "Zoë 9876543210";
    let server = classifier_returning(json!([
        {"entity_group": "TELEPHONENUM", "score": "0.91", "start": 4, "end": 14}
    ]))
    .await;
    let config = config_with_classifiers(&[("bert", format!("{}/classify", server.uri()))]);
    let (app, _) = router_for(&config);

    let (status, body) = post_json(app, "/api/validated/detect", ml_only(text)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entities"][0]["text"], "9876543210");
    assert_eq!(body["entities"][0]["start"], 5);
    assert_spans_valid(text, &body);
}

#[tokio::test]
async fn test_regex_and_ml_agreement_is_fused() {
    let text = "Send to arun.kumar@example.com";
    let server = classifier_returning(json!([
        {"entity_group": "EMAIL", "score": 0.88, "start": 8, "end": 30}
    ]))
    .await;
    let config = config_with_classifiers(&[("bert", format!("{}/classify", server.uri()))]);
    let (app, _) = router_for(&config);

    let (_, body) = post_json(app, "/api/validated/detect", json!({ "text": text })).await;

    let emails: Vec<&Value> = body["entities"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["category"] == "EMAIL")
        .collect();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0]["method"], "regex+ml");
    assert_eq!(emails[0]["text"], "arun.kumar@example.com");
}

#[tokio::test]
async fn test_two_classifiers_run_together() {
    let bert = classifier_returning(json!([
        {"entity_group": "PAN", "score": 0.9, "start": 4, "end": 14}
    ]))
    .await;
    let llama = classifier_returning(json!([
        {"entity": "B-PAN", "score": 0.8, "start": 4, "end": 14}
    ]))
    .await;
    let config = config_with_classifiers(&[
        ("bert", format!("{}/classify", bert.uri())),
        ("llama", format!("{}/classify", llama.uri())),
    ]);
    let (app, _) = router_for(&config);

    let (_, body) = post_json(app, "/api/validated/detect", ml_only("PAN ABCPD1234E")).await;

    let entities = body["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["method"], "ml+ml");
    assert_eq!(entities[0]["score"], 0.9);
}

#[tokio::test]
async fn test_classifier_failure_degrades_to_patterns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&server)
        .await;
    let config = config_with_classifiers(&[("bert", format!("{}/classify", server.uri()))]);
    let (app, metrics) = router_for(&config);

    let (status, body) = post_json(
        app,
        "/api/validated/detect",
        json!({"text": "Call 9876543210"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entities"][0]["category"], "TELEPHONENUM");
    assert!(
        !body["summary"]["methods_used"]
            .as_array()
            .unwrap()
            .contains(&json!("ml"))
    );
    assert_eq!(
        metrics.ml_failures_total.with_label_values(&["bert"]).get(),
        1
    );
}

#[tokio::test]
async fn test_anonymize_end_to_end() {
    let text = "PAN ABCPD1234E, phone 9876543210";
    let (app, _) = router_for(&config_with_classifiers(&[]));

    let (status, body) = post_json(
        app,
        "/api/validated/anonymize",
        json!({"text": text, "replacement": "***"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redacted"], "PAN ***, phone ***");
    assert_eq!(body["entities"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_schema_answers_503() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let mut config = config_with_classifiers(&[]);
    config.schema_path = shipped_schema().with_file_name("missing_schema.json");
    let app = build_router(AppState::from_config(&config, metrics));

    let (status, _) = post_json(
        app.clone(),
        "/api/validated/detect",
        json!({"text": "Call 9876543210"}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");

    let (status, _) = get_json(app.clone(), "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_json(app, "/api/data_schema").await;
    assert!(body["schema"].is_null());
}

#[tokio::test]
async fn test_health_and_schema_endpoints() {
    let config = config_with_classifiers(&[("bert", "http://127.0.0.1:1/classify".to_string())]);
    let (app, _) = router_for(&config);

    let (status, body) = get_json(app.clone(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"]["bert"], true);
    assert_eq!(body["models"]["validated_enhanced"], true);
    assert_eq!(body["schema"]["unusable"], 0);

    let (status, body) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"][1]["name"], "bert");

    let (_, body) = get_json(app, "/api/data_schema").await;
    assert_eq!(body["schema"]["STREET"]["regex"], ".*");
}

#[test]
fn test_example_config_loads() {
    let path = shipped_schema().with_file_name("bankshield.example.yaml");
    let config = bankshield_server::config::ServerConfig::from_file(path).unwrap();

    assert_eq!(config.port, 8000);
    assert_eq!(config.validation.priority.len(), 16);
    assert_eq!(config.classifiers.len(), 2);
    assert_eq!(config.enabled_classifiers().count(), 1);
    assert!(config.detection.regex.extra_patterns.is_empty());
}
