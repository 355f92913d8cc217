//! HTTP API server for Biograph
//!
//! Read-only REST endpoints: entity and event search and retrieval, vocabulary
//! lookups and the statistics views. The bulk routes take a JSON body
//! `{"id": [...]}` and restrict the same queries to those ids.
//! Every handler moves its work onto a blocking thread: executors talk to the
//! triple store synchronously and regrouping is CPU bound.

use crate::{
    api::{
        biograph_api::BiographApi,
        ids::toggle_url_encoding,
        params::{
            self, Pagination, RequestIds, SearchFilters, DEFAULT_LIMIT, DEFAULT_PAGE, FILTER_KEYS,
            IDS_PARAM,
        },
    },
    error::Error,
    registry::QueryParams,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub const SEARCH_ENTITIES: &str = "search_entities";
pub const RETRIEVE_ENTITY: &str = "retrieve_entity";
pub const BULK_ENTITIES: &str = "bulk_retrieve_entities";
pub const SEARCH_EVENTS: &str = "search_events";
pub const RETRIEVE_EVENT: &str = "retrieve_event";
pub const BULK_EVENTS: &str = "bulk_retrieve_events";
pub const SEARCH_OCCUPATIONS: &str = "search_occupations";
pub const RETRIEVE_OCCUPATION: &str = "retrieve_occupation";
pub const SEARCH_EVENT_ROLES: &str = "search_event_roles";
pub const RETRIEVE_EVENT_ROLE: &str = "retrieve_event_role";
pub const SEARCH_EVENT_KINDS: &str = "search_event_kinds";
pub const RETRIEVE_EVENT_KIND: &str = "retrieve_event_kind";
pub const BIRTH_DATES: &str = "statistics_birth_dates";
pub const DEATH_DATES: &str = "statistics_death_dates";
pub const OCCUPATIONS: &str = "statistics_occupations";
pub const ENTITY_TYPES: &str = "statistics_entity_types";

/// Query-string keys consumed by the server itself rather than passed to templates.
const RESERVED_KEYS: [&str; 5] = ["page", "limit", "bins", "q", IDS_PARAM];

/// Query-string pairs in request order; repeated keys are kept.
type QueryPairs = Vec<(String, String)>;

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Shared application state
pub struct AppState {
    pub api: Arc<BiographApi>,
}

/// Custom error type for API errors
#[derive(Debug)]
pub enum ApiError {
    Biograph(Error),
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

/// Status code for an engine error.
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidArgument(_) | Error::InvalidId(_) => StatusCode::BAD_REQUEST,
        Error::Decode { .. }
        | Error::RowDecode { .. }
        | Error::MissingColumn { .. }
        | Error::Query(_)
        | Error::Http(_)
        | Error::Store(_) => StatusCode::BAD_GATEWAY,
        Error::SchemaConfig(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Biograph(e) => (status_for(&e), e.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Biograph(err)
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// Create the HTTP server with all routes
pub fn create_server(api: Arc<BiographApi>) -> Router {
    let state = Arc::new(AppState { api });

    // Configure CORS
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/entities/search", get(search_entities))
        .route("/api/entities/retrieve", post(bulk_entities))
        .route("/api/entities/:id", get(retrieve_entity))
        .route("/api/events/search", get(search_events))
        .route("/api/events/retrieve", post(bulk_events))
        .route("/api/events/:id", get(retrieve_event))
        .route("/api/vocabularies/occupations/search", get(search_occupations))
        .route("/api/vocabularies/occupations/:id", get(retrieve_occupation))
        .route("/api/vocabularies/event_roles/search", get(search_event_roles))
        .route("/api/vocabularies/event_roles/:id", get(retrieve_event_role))
        .route("/api/vocabularies/event_kinds/search", get(search_event_kinds))
        .route("/api/vocabularies/event_kinds/:id", get(retrieve_event_kind))
        .route("/api/statistics/birth_dates/search", get(birth_dates))
        .route("/api/statistics/birth_dates/bulk", post(birth_dates_bulk))
        .route("/api/statistics/death_dates/search", get(death_dates))
        .route("/api/statistics/death_dates/bulk", post(death_dates_bulk))
        .route("/api/statistics/occupations/search", get(occupations))
        .route("/api/statistics/occupations/bulk", post(occupations_bulk))
        .route("/api/statistics/entity_types/search", get(entity_types))
        .route("/api/statistics/entity_types/bulk", post(entity_types_bulk))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(SuccessResponse { message: "Biograph HTTP API is running".to_string() })
}

/// GET /api/entities/search
async fn search_entities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    search(state, SEARCH_ENTITIES, query).await
}

/// POST /api/entities/retrieve
async fn bulk_entities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
    Json(body): Json<RequestIds>,
) -> ApiResult {
    bulk_retrieve(state, BULK_ENTITIES, query, body).await
}

/// GET /api/entities/:id - the id is the URL-safe base64 form of the entity IRI
async fn retrieve_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    retrieve(state, RETRIEVE_ENTITY, "Entity", id, query).await
}

/// GET /api/events/search
async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    search(state, SEARCH_EVENTS, query).await
}

/// POST /api/events/retrieve
async fn bulk_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
    Json(body): Json<RequestIds>,
) -> ApiResult {
    bulk_retrieve(state, BULK_EVENTS, query, body).await
}

/// GET /api/events/:id
async fn retrieve_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    retrieve(state, RETRIEVE_EVENT, "Event", id, query).await
}

/// GET /api/vocabularies/occupations/search
async fn search_occupations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    search(state, SEARCH_OCCUPATIONS, query).await
}

async fn retrieve_occupation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    retrieve(state, RETRIEVE_OCCUPATION, "Occupation", id, query).await
}

/// GET /api/vocabularies/event_roles/search
async fn search_event_roles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    search(state, SEARCH_EVENT_ROLES, query).await
}

async fn retrieve_event_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    retrieve(state, RETRIEVE_EVENT_ROLE, "Event role", id, query).await
}

/// GET /api/vocabularies/event_kinds/search
async fn search_event_kinds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    search(state, SEARCH_EVENT_KINDS, query).await
}

async fn retrieve_event_kind(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    retrieve(state, RETRIEVE_EVENT_KIND, "Event kind", id, query).await
}

/// GET /api/statistics/birth_dates/search
async fn birth_dates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    histogram(state, BIRTH_DATES, query, None).await
}

/// POST /api/statistics/birth_dates/bulk
async fn birth_dates_bulk(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
    Json(body): Json<RequestIds>,
) -> ApiResult {
    histogram(state, BIRTH_DATES, query, Some(body)).await
}

/// GET /api/statistics/death_dates/search
async fn death_dates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    histogram(state, DEATH_DATES, query, None).await
}

/// POST /api/statistics/death_dates/bulk
async fn death_dates_bulk(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
    Json(body): Json<RequestIds>,
) -> ApiResult {
    histogram(state, DEATH_DATES, query, Some(body)).await
}

/// GET /api/statistics/occupations/search
async fn occupations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    occupation_tree(state, query, None).await
}

/// POST /api/statistics/occupations/bulk
async fn occupations_bulk(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
    Json(body): Json<RequestIds>,
) -> ApiResult {
    occupation_tree(state, query, Some(body)).await
}

/// GET /api/statistics/entity_types/search
async fn entity_types(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
) -> ApiResult {
    entity_type_counts(state, query, None).await
}

/// POST /api/statistics/entity_types/bulk
async fn entity_types_bulk(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryPairs>,
    Json(body): Json<RequestIds>,
) -> ApiResult {
    entity_type_counts(state, query, Some(body)).await
}

async fn search(state: Arc<AppState>, template: &'static str, query: QueryPairs) -> ApiResult {
    let pagination = pagination(&query)?;
    let mut template_params = with_search_text(passthrough(&query), &query)?;
    SearchFilters::from_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))?
        .apply(&mut template_params);
    paged(state, "search", template, template_params, pagination).await
}

/// Paginated retrieval of known ids: the `ids` parameter restricts the match.
async fn bulk_retrieve(
    state: Arc<AppState>,
    template: &'static str,
    query: QueryPairs,
    body: RequestIds,
) -> ApiResult {
    let pagination = pagination(&query)?;
    let mut template_params = passthrough(&query);
    template_params.insert(IDS_PARAM, params::id_list(&body.id)?);
    paged(state, "bulk", template, template_params, pagination).await
}

async fn paged(
    state: Arc<AppState>,
    kind: &'static str,
    template: &'static str,
    template_params: QueryParams,
    pagination: Pagination,
) -> ApiResult {
    let mut key_params = template_params.clone();
    pagination.apply(&mut key_params);

    let value = run_blocking(state, move |api| {
        api.cached(kind, template, &key_params, || {
            api.search(template, template_params.clone(), pagination)
        })
    })
    .await?;
    Ok(Json(value))
}

/// Fetch one object by its encoded id; 404 when the query matches nothing.
async fn retrieve(
    state: Arc<AppState>,
    template: &'static str,
    what: &'static str,
    id: String,
    query: QueryPairs,
) -> ApiResult {
    let iri = toggle_url_encoding(&id)?;
    let mut template_params = passthrough(&query);
    template_params.insert("id", &iri);

    let value = run_blocking(state, move |api| {
        api.cached("retrieve", template, &template_params, || {
            api.retrieve(template, template_params.clone())
        })
    })
    .await?;

    if value.is_null() {
        return Err(ApiError::NotFound(format!("{} '{}' not found", what, iri)));
    }
    Ok(Json(value))
}

async fn histogram(
    state: Arc<AppState>,
    template: &'static str,
    query: QueryPairs,
    ids: Option<RequestIds>,
) -> ApiResult {
    let bins = params::bins(parse_number(&query, "bins")?)?;
    let template_params = statistics_params(&query, ids)?;

    let mut key_params = template_params.clone();
    key_params.insert("bins", bins);

    let value = run_blocking(state, move |api| {
        api.cached("histogram", template, &key_params, || {
            api.date_histogram(template, template_params.clone(), bins)
        })
    })
    .await?;
    Ok(Json(value))
}

async fn occupation_tree(
    state: Arc<AppState>,
    query: QueryPairs,
    ids: Option<RequestIds>,
) -> ApiResult {
    let template_params = statistics_params(&query, ids)?;
    let value = run_blocking(state, move |api| {
        api.cached("occupations", OCCUPATIONS, &template_params, || {
            api.occupation_tree(OCCUPATIONS, template_params.clone())
        })
    })
    .await?;
    Ok(Json(value))
}

async fn entity_type_counts(
    state: Arc<AppState>,
    query: QueryPairs,
    ids: Option<RequestIds>,
) -> ApiResult {
    let template_params = statistics_params(&query, ids)?;
    let value = run_blocking(state, move |api| {
        api.cached("entity_types", ENTITY_TYPES, &template_params, || {
            api.entity_types(ENTITY_TYPES, template_params.clone())
        })
    })
    .await?;
    Ok(Json(value))
}

/// Run `f` against the API on a blocking thread.
async fn run_blocking<F>(state: Arc<AppState>, f: F) -> Result<serde_json::Value, ApiError>
where
    F: FnOnce(&BiographApi) -> crate::Result<serde_json::Value> + Send + 'static,
{
    let api = Arc::clone(&state.api);
    let result = tokio::task::spawn_blocking(move || f(&api))
        .await
        .map_err(|e| ApiError::InternalError(format!("worker failed: {}", e)))?;
    Ok(result?)
}

/// Last value given for `key`.
fn last<'a>(query: &'a QueryPairs, key: &str) -> Option<&'a str> {
    query.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Every pair that is neither reserved nor a filter, sorted by key so cache
/// keys are stable. A repeated key keeps its last value.
fn passthrough(query: &QueryPairs) -> QueryParams {
    let mut pairs: Vec<(&String, &String)> = query
        .iter()
        .filter(|(key, _)| {
            !RESERVED_KEYS.contains(&key.as_str()) && !FILTER_KEYS.contains(&key.as_str())
        })
        .map(|(key, value)| (key, value))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs.into_iter().map(|(key, value)| (key.clone(), value.clone())).collect()
}

/// Add the `q` template parameter: the search pattern, or empty when absent.
fn with_search_text(mut template_params: QueryParams, query: &QueryPairs) -> Result<QueryParams, ApiError> {
    let q = match last(query, "q").filter(|q| !q.trim().is_empty()) {
        Some(q) => params::search_pattern(q)?,
        None => String::new(),
    };
    template_params.insert("q", q);
    Ok(template_params)
}

/// Statistics parameters: search text plus the id restriction, empty for the
/// search variants.
fn statistics_params(query: &QueryPairs, ids: Option<RequestIds>) -> Result<QueryParams, ApiError> {
    let mut template_params = with_search_text(passthrough(query), query)?;
    let ids = match ids {
        Some(body) => params::id_list(&body.id)?,
        None => String::new(),
    };
    template_params.insert(IDS_PARAM, ids);
    Ok(template_params)
}

fn pagination(query: &QueryPairs) -> Result<Pagination, ApiError> {
    Ok(Pagination::new(
        parse_number(query, "page")?.unwrap_or(DEFAULT_PAGE),
        parse_number(query, "limit")?.unwrap_or(DEFAULT_LIMIT),
    )?)
}

fn parse_number(query: &QueryPairs, key: &str) -> Result<Option<u32>, ApiError> {
    last(query, key)
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .map_err(|e| ApiError::BadRequest(format!("invalid {} {:?}: {}", key, raw, e)))
        })
        .transpose()
}

/// Start the HTTP server on the specified address
pub async fn start_server(addr: &str, api: Arc<BiographApi>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(api);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Biograph HTTP API server listening on http://{}", addr);
    tracing::info!("  GET  /api/entities/search                 - Search entities");
    tracing::info!("  POST /api/entities/retrieve               - Retrieve entities by id list");
    tracing::info!("  GET  /api/entities/:id                    - Retrieve an entity by encoded id");
    tracing::info!("  GET  /api/events/search                   - Search events");
    tracing::info!("  POST /api/events/retrieve                 - Retrieve events by id list");
    tracing::info!("  GET  /api/events/:id                      - Retrieve an event by encoded id");
    tracing::info!("  GET  /api/vocabularies/<vocabulary>/search - Search occupations, event_roles or event_kinds");
    tracing::info!("  GET  /api/vocabularies/<vocabulary>/:id   - Retrieve a vocabulary entry");
    tracing::info!("  GET  /api/statistics/<view>/search        - birth_dates, death_dates, occupations, entity_types");
    tracing::info!("  POST /api/statistics/<view>/bulk          - The same views for an id list");
    tracing::info!("  GET  /health                              - Health check");

    axum::serve(listener, app).await?;

    Ok(())
}
