use crate::config::ApiConfig;
use crate::db::DatabaseService;
use crate::db::models::alert_models::{Alert, AlertQuery};
use crate::db::models::geofence_models::{GeofenceEvent, PositionFix};
use crate::db::models::panic_models::{PanicAlert, PanicTrigger};
use crate::db::models::scan_models::{PatrolScanEvent, ScanRequest};
use crate::db::models::shift_models::Shift;
use crate::engine::{DueStatus, ShiftCompliance, TrackingStatus};
use crate::error::Error;
use crate::security::{Actor, SecurityService};
use crate::services::PatrolServices;
use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<DatabaseService>,
    pub services: Arc<PatrolServices>,
    pub security: Arc<SecurityService>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::Authorization(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::InvalidTransition(_) => StatusCode::CONFLICT,
            Error::NotificationDelivery(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Broker(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        ApiError {
            message: err.to_string(),
            status: status.as_u16(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return (*err).clone().into();
        }

        error!("Unhandled error: {:#}", err);
        ApiError {
            message: err.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Bearer token authentication for every handler taking an [`Actor`]
#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Authentication("Missing bearer token".to_string()))?;

        Ok(state.security.authenticate(token)?)
    }
}

pub struct RestApi {
    config: ApiConfig,
    state: AppState,
}

impl RestApi {
    pub fn new(config: &ApiConfig, state: AppState) -> Self {
        Self {
            config: config.clone(),
            state,
        }
    }

    /// Build the API router with routes
    pub fn router(&self) -> Router {
        use std::time::Duration;
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(false)
            .max_age(Duration::from_secs(3600));

        Router::new()
            .route("/api/health", get(health))
            // Patrol intake
            .route("/api/scans", post(record_scan))
            .route("/api/positions", post(record_position))
            .route("/api/guards/:id/next-checkpoint", get(next_checkpoint))
            .route("/api/guards/:id/tracking", get(tracking))
            .route("/api/shifts/:id/start", post(start_shift))
            .route("/api/shifts/:id/end", post(end_shift))
            // Supervision
            .route("/api/compliance", get(compliance))
            .route("/api/alerts", get(list_alerts))
            .route("/api/alerts/:id/acknowledge", post(acknowledge_alert))
            // Panic
            .route("/api/panic", post(trigger_panic))
            .route("/api/panic/active", get(open_panics))
            .route("/api/panic/:id/acknowledge", post(acknowledge_panic))
            .route("/api/panic/:id/resolve", post(resolve_panic))
            .route("/api/ws/panic", get(super::websocket::panic_feed))
            .with_state(self.state.clone())
            .layer(cors)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        info!("API server listening on {}", addr);

        axum::Server::bind(&addr)
            .serve(self.router().into_make_service())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    database: bool,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = state.database.health_check().await;
    Json(Health {
        status: if database { "ok" } else { "degraded" },
        database,
    })
}

async fn record_scan(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<ScanRequest>,
) -> ApiResult<(StatusCode, Json<PatrolScanEvent>)> {
    let scan = state.services.scans.record_scan(&request, &actor).await?;
    Ok((StatusCode::CREATED, Json(scan)))
}

async fn record_position(
    State(state): State<AppState>,
    actor: Actor,
    Json(fix): Json<PositionFix>,
) -> ApiResult<Json<Option<GeofenceEvent>>> {
    let event = state.services.geofence.record_position(&fix, &actor).await?;
    Ok(Json(event))
}

async fn next_checkpoint(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Option<DueStatus>>> {
    let status = state.services.due_time.next_checkpoint(id, &actor).await?;
    Ok(Json(status))
}

async fn tracking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TrackingStatus>> {
    let status = state.services.geofence.tracking(id, &actor).await?;
    Ok(Json(status))
}

async fn start_shift(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Shift>> {
    Ok(Json(state.services.shifts.start(id, &actor).await?))
}

async fn end_shift(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Shift>> {
    Ok(Json(state.services.shifts.end(id, &actor).await?))
}

async fn compliance(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<ShiftCompliance>>> {
    Ok(Json(state.services.compliance.snapshot(&actor).await?))
}

async fn list_alerts(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AlertQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    Ok(Json(state.services.alerts.list(&query, &actor).await?))
}

async fn acknowledge_alert(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.services.alerts.acknowledge(id, &actor).await?))
}

async fn trigger_panic(
    State(state): State<AppState>,
    actor: Actor,
    Json(trigger): Json<PanicTrigger>,
) -> ApiResult<(StatusCode, Json<PanicAlert>)> {
    let panic = state.services.panic.trigger(&trigger, &actor).await?;
    Ok((StatusCode::CREATED, Json(panic)))
}

async fn open_panics(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<PanicAlert>>> {
    Ok(Json(state.services.panic.open(&actor).await?))
}

async fn acknowledge_panic(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PanicAlert>> {
    Ok(Json(state.services.panic.acknowledge(id, &actor).await?))
}

async fn resolve_panic(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PanicAlert>> {
    Ok(Json(state.services.panic.resolve(id, &actor).await?))
}
