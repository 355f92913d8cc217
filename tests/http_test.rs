use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use biograph::api::ids::encode_id;
use biograph::api::BiographApi;
use biograph::cache::{CacheConfig, MokaResponseCache};
use biograph::http::create_server;
use biograph::parsing::schema_config::SchemaRegistry;
use biograph::parsing::sparql_results::RawRow;
use biograph::querying::{OxigraphExecutor, QueryExecutor};
use biograph::registry::TemplateRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn shipped(executor: Arc<dyn QueryExecutor>) -> BiographApi {
    let templates =
        TemplateRegistry::from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/queries")).unwrap();
    let schemas =
        SchemaRegistry::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/schemas.json")).unwrap();
    BiographApi::new(executor, Arc::new(templates), Arc::new(schemas))
}

/// Router over the fixture graph with a response cache in front.
fn app() -> Router {
    let executor = OxigraphExecutor::new().unwrap();
    executor.load_file(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/people.ttl")).unwrap();
    let api = shipped(Arc::new(executor))
        .with_cache(Arc::new(MokaResponseCache::new(&CacheConfig::default())));
    create_server(Arc::new(api))
}

/// Executor standing in for an unreachable endpoint.
struct FailingExecutor;

impl QueryExecutor for FailingExecutor {
    fn execute(&self, _sparql: &str) -> biograph::Result<Vec<RawRow>> {
        Err(biograph::Error::Query("endpoint returned 503".to_string()))
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn test_search_entities_page() {
    let (status, body) = get(app(), "/api/entities/search?limit=1&page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 2);
    assert_eq!(body["count"], 2);
    assert_eq!(body["pages"], 2);
    assert_eq!(body["results"][0]["id"], "http://example.org/karl");
    assert!(body["results"][0].get("_additional_values").is_none());
}

#[tokio::test]
async fn test_search_text_is_wildcarded() {
    let (status, body) = get(app(), "/api/entities/search?q=muster").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["label"], "Anna Muster");

    let (_, body) = get(app(), "/api/entities/search?q=%22muster%22").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_invalid_pagination_is_a_bad_request() {
    for uri in [
        "/api/entities/search?page=0",
        "/api/entities/search?limit=5000",
        "/api/events/search?page=first",
        "/api/statistics/birth_dates/search?bins=0",
        "/api/statistics/birth_dates/search?bins=2000000000",
        "/api/statistics/death_dates/search?bins=1001",
        "/api/entities/search?born_after=yesterday",
    ] {
        let (status, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_retrieve_entity_by_encoded_id() {
    let uri = format!("/api/entities/{}", encode_id("http://example.org/anna"));
    let (status, body) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "Anna Muster");
    assert_eq!(body["gender"]["label"], "female");
}

#[tokio::test]
async fn test_retrieve_unknown_entity() {
    let uri = format!("/api/entities/{}", encode_id("http://example.org/nobody"));
    let (status, _) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(app(), "/api/entities/%25%25%25").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_statistics_endpoints() {
    let (status, bins) = get(app(), "/api/statistics/birth_dates/search?bins=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bins.as_array().unwrap().len(), 2);
    assert_eq!(bins[0]["label"], "1844 - 1847");

    let (_, tree) = get(app(), "/api/statistics/occupations/search").await;
    assert_eq!(tree["root"]["id"], "root");
    assert_eq!(tree["root"]["children"][0]["label"], "Doctor");
    assert_eq!(tree["root"]["children"][0]["children"][0]["label"], "Surgeon");
    assert_eq!(tree["unresolved"], json!([]));

    let (_, types) = get(app(), "/api/statistics/entity_types/search").await;
    assert_eq!(types["Person"], 2);
}

#[tokio::test]
async fn test_endpoint_failure_is_a_bad_gateway() {
    let app = create_server(Arc::new(shipped(Arc::new(FailingExecutor))));
    let (status, body) = get(app, "/api/events/search").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_retrieve_event_by_encoded_id() {
    let uri = format!("/api/events/{}", encode_id("http://example.org/wedding"));
    let (status, body) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "Wedding");
    assert_eq!(body["place"]["label"], "Vienna");

    let uri = format!("/api/events/{}", encode_id("http://example.org/anna"));
    let (status, body) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().starts_with("Event"));
}

#[tokio::test]
async fn test_search_filters_from_query_string() {
    let doctor = encode_id("http://example.org/doctor");
    let surgeon = encode_id("http://example.org/surgeon");
    let uri = format!("/api/entities/search?occupations_id={}&occupations_id={}", doctor, surgeon);
    let (status, body) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, body) = get(app(), "/api/entities/search?gender=female&born_after=1848-01-01").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["label"], "Anna Muster");
}

#[tokio::test]
async fn test_bulk_retrieve_entities() {
    let ids = json!({"id": [encode_id("http://example.org/karl"), "http://example.org/anna"]});
    let (status, body) = post(app(), "/api/entities/retrieve?limit=1", ids).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["pages"], 2);
    assert_eq!(body["results"][0]["id"], "http://example.org/anna");

    let (status, _) = post(app(), "/api/events/retrieve", json!({"id": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_statistics() {
    let karl = json!({"id": [encode_id("http://example.org/karl")]});

    let (status, tree) = post(app(), "/api/statistics/occupations/bulk", karl.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree["root"]["children"][0]["label"], "Doctor");
    assert_eq!(tree["root"]["children"][0]["count"], 1);

    let (_, types) = post(app(), "/api/statistics/entity_types/bulk", karl.clone()).await;
    assert_eq!(types, json!({"Person": 1}));

    let (status, bins) = post(app(), "/api/statistics/birth_dates/bulk?bins=1", karl).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bins[0]["count"], 1);
}

#[tokio::test]
async fn test_vocabulary_routes() {
    let (status, body) = get(app(), "/api/vocabularies/occupations/search?q=surg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["broader"]["label"], "Doctor");

    let (_, body) = get(app(), "/api/vocabularies/event_roles/search").await;
    assert_eq!(body["count"], 2);

    let uri = format!("/api/vocabularies/event_kinds/{}", encode_id("http://example.org/marriage_kind"));
    let (status, body) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "Marriage");

    let uri = format!("/api/vocabularies/occupations/{}", encode_id("http://example.org/vienna"));
    let (status, _) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
