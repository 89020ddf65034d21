//! REST binding for the patient-visit workflow engine.
//!
//! The engine itself is transport-agnostic; this binary wires it to the HTTP surface
//! the excluded UI/CRUD layer calls. Caller identity arrives as the trusted
//! `x-actor-id` / `x-actor-role` header pair — token issuance and verification live in
//! the surrounding platform, not here.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use vwe_core::{
    Actor, EngineConfig, NonEmptyText, Role, Stage, TransitionRecord, UpdatePayload, Visit,
    VisitId, VisitService, WorkflowError,
};

/// Application state shared across REST handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<VisitService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_visit,
        list_visits,
        get_visit,
        update_visit,
        visit_history
    ),
    components(schemas(
        HealthRes,
        CreateVisitReq,
        UpdateVisitReq,
        VisitRes,
        WorklistRes,
        TransitionRes,
        HistoryRes,
        ErrorRes
    ))
)]
struct ApiDoc;

/// Main entry point for the workflow engine service.
///
/// # Environment Variables
/// - `VWE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `VISIT_DATA_DIR`: Directory for visit storage and the audit log (default: "/visit_data")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("vwe=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr: SocketAddr = std::env::var("VWE_REST_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()?;
    let data_dir = std::env::var("VISIT_DATA_DIR").unwrap_or_else(|_| "/visit_data".into());

    tracing::info!("++ Starting VWE REST on {}", rest_addr);
    tracing::info!("++ Visit data dir: {}", data_dir);

    let cfg = Arc::new(EngineConfig::new(data_dir.into())?);
    let service = Arc::new(VisitService::open(cfg)?);

    // Audit writes are best-effort; this loop retries anything that failed to reach
    // the log without ever blocking a request.
    let audit_service = Arc::clone(&service);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(30));
        loop {
            tick.tick().await;
            let flushed = audit_service.flush_audit();
            if flushed > 0 {
                tracing::info!("flushed {flushed} queued audit records");
            }
        }
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/visits", post(create_visit))
        .route("/visits", get(list_visits))
        .route("/visits/:visit_id", get(get_visit))
        .route("/visits/:visit_id", put(update_visit))
        .route("/visits/:visit_id/history", get(visit_history))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(AppState { service });

    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

#[derive(Deserialize, ToSchema)]
struct CreateVisitReq {
    /// Reference to the patient record held by the surrounding system.
    patient_id: String,
}

#[derive(Deserialize, ToSchema)]
struct UpdateVisitReq {
    /// The visit version this request was built against.
    expected_version: u64,
    /// Partial field map. JSON `null` clears a field; an absent key preserves it.
    #[serde(default)]
    #[schema(value_type = Object)]
    fields: serde_json::Map<String, serde_json::Value>,
    /// Optional explicit destination stage; when absent the graph decides.
    #[serde(default)]
    target_stage: Option<String>,
}

/// Wire form of a visit, flat like the record the surrounding system already consumes.
#[derive(Serialize, ToSchema)]
struct VisitRes {
    visit_id: String,
    patient_id: String,
    current_stage: String,
    version: u64,
    triage_notes: Option<String>,
    diagnosis: Option<String>,
    prescription: Option<String>,
    request_lab: Option<bool>,
    lab_results: Option<String>,
    dispensed: Option<bool>,
    billing_status: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Visit> for VisitRes {
    fn from(visit: Visit) -> Self {
        Self {
            visit_id: visit.visit_id.to_string(),
            patient_id: visit.patient_id.to_string(),
            current_stage: visit.current_stage.to_string(),
            version: visit.version,
            triage_notes: visit.fields.triage_notes,
            diagnosis: visit.fields.diagnosis,
            prescription: visit.fields.prescription,
            request_lab: visit.fields.request_lab,
            lab_results: visit.fields.lab_results,
            dispensed: visit.fields.dispensed,
            billing_status: visit.fields.billing_status.map(|s| s.to_string()),
            created_at: visit.created_at.to_rfc3339(),
            updated_at: visit.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct WorklistRes {
    visits: Vec<VisitRes>,
}

#[derive(Serialize, ToSchema)]
struct TransitionRes {
    from_stage: String,
    to_stage: String,
    actor_role: String,
    actor_id: String,
    timestamp: String,
    fields_changed: Vec<String>,
    fields_rejected: Vec<String>,
}

impl From<TransitionRecord> for TransitionRes {
    fn from(record: TransitionRecord) -> Self {
        Self {
            from_stage: record.from_stage.to_string(),
            to_stage: record.to_stage.to_string(),
            actor_role: record.actor_role.to_string(),
            actor_id: record.actor_id,
            timestamp: record.timestamp.to_rfc3339(),
            fields_changed: record
                .fields_changed
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            fields_rejected: record
                .fields_rejected
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct HistoryRes {
    transitions: Vec<TransitionRes>,
}

#[derive(Serialize, ToSchema)]
struct ErrorRes {
    message: String,
}

type ApiError = (StatusCode, Json<ErrorRes>);

fn reject(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorRes {
            message: message.into(),
        }),
    )
}

/// Map engine rejections onto the status codes the UI layer already expects.
fn engine_error(err: WorkflowError) -> ApiError {
    let status = match &err {
        WorkflowError::UnauthorizedTransition { .. }
        | WorkflowError::RoleStageMismatch { .. }
        | WorkflowError::UnauthorizedWorklist { .. } => StatusCode::FORBIDDEN,
        WorkflowError::UnknownVisit { .. } => StatusCode::NOT_FOUND,
        WorkflowError::VersionConflict { .. } | WorkflowError::TerminalState { .. } => {
            StatusCode::CONFLICT
        }
        WorkflowError::GuardNotSatisfied { .. }
        | WorkflowError::UnknownEdge { .. }
        | WorkflowError::InvalidFieldValue { .. }
        | WorkflowError::InvalidInput(_)
        | WorkflowError::VisitId(_)
        | WorkflowError::Text(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::DuplicateVisit { .. }
        | WorkflowError::StoreDirCreation(_)
        | WorkflowError::FileWrite(_)
        | WorkflowError::FileRead(_)
        | WorkflowError::Serialization(_)
        | WorkflowError::Deserialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {err:?}");
        reject(status, "Internal error")
    } else {
        reject(status, err.to_string())
    }
}

/// Resolve the trusted caller identity from the request headers.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Missing x-actor-id header"))?;
    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Missing x-actor-role header"))?;

    let role: Role = role
        .parse()
        .map_err(|e: WorkflowError| reject(StatusCode::FORBIDDEN, e.to_string()))?;
    Actor::new(id, role)
        .map_err(|e| reject(StatusCode::UNAUTHORIZED, format!("invalid x-actor-id: {e}")))
}

fn parse_visit_id(raw: &str) -> Result<VisitId, ApiError> {
    VisitId::parse(raw).map_err(|e| reject(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint used by monitoring and load balancers.
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "VWE is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/visits",
    request_body = CreateVisitReq,
    responses(
        (status = 201, description = "Visit created and checked in", body = VisitRes),
        (status = 401, description = "Missing actor identity", body = ErrorRes),
        (status = 403, description = "Caller is not reception", body = ErrorRes),
        (status = 422, description = "Invalid patient reference", body = ErrorRes)
    )
)]
/// Create a visit at check-in.
///
/// Reception only. The visit enters at `registration` and auto-advances to `triage`,
/// so the response is already the triage-stage record at version 1.
async fn create_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateVisitReq>,
) -> Result<(StatusCode, Json<VisitRes>), ApiError> {
    let actor = actor_from_headers(&headers)?;
    let patient_id = NonEmptyText::new(&req.patient_id)
        .map_err(|e| reject(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let visit = state
        .service
        .create_visit(patient_id, &actor)
        .map_err(engine_error)?;
    Ok((StatusCode::CREATED, Json(visit.into())))
}

#[derive(Deserialize)]
struct WorklistQuery {
    stage: Option<String>,
}

#[utoipa::path(
    get,
    path = "/visits",
    params(
        ("stage" = Option<String>, Query, description = "Stage queue to list; omit for the reception overview")
    ),
    responses(
        (status = 200, description = "Worklist for the calling role", body = WorklistRes),
        (status = 401, description = "Missing actor identity", body = ErrorRes),
        (status = 403, description = "Role does not own the requested queue", body = ErrorRes)
    )
)]
/// List the calling role's worklist.
///
/// With `stage`, returns that queue oldest-first, provided the calling role owns the
/// stage. Without `stage`, reception gets every visit, newest first. Each call
/// re-evaluates current data; no cursor is held between polls.
async fn list_visits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WorklistQuery>,
) -> Result<Json<WorklistRes>, ApiError> {
    let actor = actor_from_headers(&headers)?;

    let visits = match query.stage.as_deref() {
        Some(raw) => {
            let stage: Stage = raw
                .parse()
                .map_err(|e: WorkflowError| {
                    reject(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
                })?;
            state
                .service
                .list_worklist(stage, actor.role)
                .map_err(engine_error)?
        }
        None => state
            .service
            .list_all_visits(actor.role)
            .map_err(engine_error)?,
    };

    Ok(Json(WorklistRes {
        visits: visits.into_iter().map(VisitRes::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/visits/{visit_id}",
    params(("visit_id" = String, Path, description = "Canonical visit id")),
    responses(
        (status = 200, description = "The visit", body = VisitRes),
        (status = 404, description = "No such visit", body = ErrorRes)
    )
)]
/// Fetch a single visit.
async fn get_visit(
    State(state): State<AppState>,
    Path(visit_id): Path<String>,
) -> Result<Json<VisitRes>, ApiError> {
    let visit_id = parse_visit_id(&visit_id)?;
    let visit = state.service.get_visit(visit_id).map_err(engine_error)?;
    Ok(Json(visit.into()))
}

#[utoipa::path(
    put,
    path = "/visits/{visit_id}",
    params(("visit_id" = String, Path, description = "Canonical visit id")),
    request_body = UpdateVisitReq,
    responses(
        (status = 200, description = "Visit advanced to the next stage", body = VisitRes),
        (status = 401, description = "Missing actor identity", body = ErrorRes),
        (status = 403, description = "Role does not own the current stage", body = ErrorRes),
        (status = 404, description = "No such visit", body = ErrorRes),
        (status = 409, description = "Version conflict or completed visit", body = ErrorRes),
        (status = 422, description = "Guard not satisfied or invalid payload", body = ErrorRes)
    )
)]
/// The single mutating entry point.
///
/// Internally runs merge → validate → conditional commit → audit. A `409` with a
/// version conflict is the only rejection worth retrying, and only after refetching
/// the visit.
async fn update_visit(
    State(state): State<AppState>,
    Path(visit_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateVisitReq>,
) -> Result<Json<VisitRes>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let visit_id = parse_visit_id(&visit_id)?;

    let payload = UpdatePayload::from_json_map(&req.fields).map_err(engine_error)?;
    let target = match req.target_stage.as_deref() {
        Some(raw) => Some(raw.parse::<Stage>().map_err(engine_error)?),
        None => None,
    };

    let visit = state
        .service
        .update_visit(visit_id, req.expected_version, &payload, target, &actor)
        .map_err(engine_error)?;
    Ok(Json(visit.into()))
}

#[utoipa::path(
    get,
    path = "/visits/{visit_id}/history",
    params(("visit_id" = String, Path, description = "Canonical visit id")),
    responses(
        (status = 200, description = "Transition history, oldest first", body = HistoryRes),
        (status = 404, description = "No such visit", body = ErrorRes)
    )
)]
/// The visit's audit trail.
///
/// Eventually consistent: records that failed their first write appear after the next
/// background flush.
async fn visit_history(
    State(state): State<AppState>,
    Path(visit_id): Path<String>,
) -> Result<Json<HistoryRes>, ApiError> {
    let visit_id = parse_visit_id(&visit_id)?;

    // Distinguish an unknown visit from one with no flushed history yet.
    state.service.get_visit(visit_id).map_err(engine_error)?;

    let transitions = state.service.history(visit_id).map_err(engine_error)?;
    Ok(Json(HistoryRes {
        transitions: transitions.into_iter().map(TransitionRes::from).collect(),
    }))
}
