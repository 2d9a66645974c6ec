//! HTTP route definitions

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::session::{SessionError, SessionHandle};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::zone::projector::WallTransform;
use crate::zone::{
    phase_preview, LineStyle, Phase, PhaseTable, PreviewRing, RingProjector, WallProjector,
    ZoneSettings, ZoneSnapshot, ZoneView,
};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - `*` or a comma-separated list in CLIENT_ORIGIN
    let allow_origin = if state.config.client_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<header::HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/:id",
            get(session_status_handler).delete(stop_session_handler),
        )
        .route("/sessions/:id/ring", get(ring_handler))
        .route("/sessions/:id/preview", get(preview_handler))
        .route("/sessions/:id/distance", get(distance_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
    active_observers: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_sessions: state.session_registry.active_sessions(),
        active_observers: state.session_registry.total_subscribers(),
    })
}

// ============================================================================
// Session endpoints
// ============================================================================

/// Overrides for the configured zone defaults
#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    initial_radius: Option<f32>,
    randomize_center: Option<bool>,
    center: Option<[f32; 2]>,
    ground_height: Option<f32>,
    phases: Option<Vec<Phase>>,
    seed: Option<u64>,
}

impl CreateSessionRequest {
    fn into_settings(self, defaults: &ZoneSettings) -> (ZoneSettings, Option<u64>) {
        let phases = self
            .phases
            .map(PhaseTable::new)
            .unwrap_or_else(|| defaults.phases.clone());

        let settings = ZoneSettings::new(
            self.initial_radius.unwrap_or(defaults.initial_radius),
            self.randomize_center.unwrap_or(defaults.randomize_center),
            phases,
        )
        .with_center(self.center.map(Vec2::from).unwrap_or(defaults.initial_center))
        .with_ground_height(self.ground_height.unwrap_or(defaults.ground_height));

        (settings, self.seed)
    }
}

#[derive(Serialize, Deserialize)]
struct CreateSessionResponse {
    session_id: Uuid,
    seed: u64,
    ws_url: String,
}

async fn create_session_handler(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    if state.create_limiter.check().is_err() {
        return Err(AppError::RateLimited);
    }

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let (settings, seed) = request.into_settings(&state.config.zone);
    let handle = state.sessions.create_session(settings, seed)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: handle.id,
            seed: handle.seed,
            ws_url: format!("{}?session_id={}", state.config.ws_url(), handle.id),
        }),
    ))
}

#[derive(Serialize, Deserialize)]
struct SessionStatusResponse {
    session_id: Uuid,
    seed: u64,
    tick_rate: u32,
    observers: usize,
    /// None until the first snapshot has been taken
    zone: Option<ZoneSnapshot>,
}

async fn session_status_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let handle = find_session(&state, id)?;

    Ok(Json(SessionStatusResponse {
        session_id: handle.id,
        seed: handle.seed,
        tick_rate: handle.tick_rate,
        observers: handle.subscriber_count(),
        zone: handle.mirror().latest().copied(),
    }))
}

async fn stop_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.stop_session(id).await?;
    info!(session_id = %id, "Session stop requested");
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct RingQuery {
    segments: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct RingResponse {
    tick: Option<u64>,
    style: LineStyle,
    /// Closed polyline, empty when the zone has collapsed
    points: Vec<[f32; 3]>,
    wall: Option<WallTransform>,
}

async fn ring_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RingQuery>,
) -> Result<Json<RingResponse>, AppError> {
    let handle = find_session(&state, id)?;
    let mirror = handle.mirror();

    let projector = RingProjector::new(
        query.segments.unwrap_or(state.config.ring_segments),
        LineStyle::default(),
    );

    let view = mirror.latest().map(|zone| ZoneView {
        center: zone.center(),
        radius: zone.radius,
        ground_height: handle.settings.ground_height,
    });

    let points = view
        .map(|v| projector.project(&v))
        .unwrap_or_default()
        .into_iter()
        .map(|p| p.to_array())
        .collect();

    Ok(Json(RingResponse {
        tick: mirror.latest().map(|zone| zone.tick),
        style: *projector.style(),
        points,
        wall: view.map(|v| WallProjector::default().transform(&v)),
    }))
}

async fn preview_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PreviewRing>>, AppError> {
    let handle = find_session(&state, id)?;
    Ok(Json(phase_preview(&handle.settings)))
}

#[derive(Deserialize)]
struct PointQuery {
    x: f32,
    y: f32,
}

#[derive(Serialize, Deserialize)]
struct DistanceResponse {
    tick: u64,
    inside: bool,
    /// Negative inside the zone, positive outside
    edge_distance: f32,
}

/// Where a point sits relative to the zone, for outside-zone damage checks
async fn distance_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(point): Query<PointQuery>,
) -> Result<Json<DistanceResponse>, AppError> {
    let handle = find_session(&state, id)?;
    let zone = handle
        .mirror()
        .latest()
        .copied()
        .ok_or_else(|| AppError::NotFound("Zone not simulated yet".to_string()))?;
    let point = Vec2::new(point.x, point.y);

    Ok(Json(DistanceResponse {
        tick: zone.tick,
        inside: zone.contains(point),
        edge_distance: zone.edge_distance(point),
    }))
}

fn find_session(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .session_registry
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) | SessionError::Closed(_) => AppError::NotFound(err.to_string()),
            SessionError::NotAuthority => AppError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
