//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Extension, Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::game::setup::random_placement;
use crate::game::{
    Actor, Command, CommandError, Coord, MatchSummary, Placement, PlayerView, SessionError,
    SessionHandle, TimeControl,
};
use crate::http::middleware::{require_auth, AuthenticatedUser};
use crate::store::StoreError;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_MATCH_NAME: usize = 64;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/matches", get(list_matches_handler).post(create_match_handler))
        .route("/matches/:id", get(view_handler))
        .route("/matches/:id/join", post(join_handler))
        .route("/matches/:id/placement", post(placement_handler))
        .route("/matches/:id/placement/random", post(random_placement_handler))
        .route("/matches/:id/move", post(move_handler))
        .route("/matches/:id/attack", post(attack_handler))
        .route("/matches/:id/heal", post(heal_handler))
        .route("/matches/:id/surrender", post(surrender_handler))
        .route("/matches/:id/timeout", post(timeout_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
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
    active_matches: usize,
    playing_matches: usize,
    store: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.sessions.active_sessions(),
        playing_matches: state.sessions.playing_sessions(),
        store: state.store.backend_name(),
    })
}

// ============================================================================
// Lobby endpoints
// ============================================================================

async fn list_matches_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<MatchSummary>>, AppError> {
    let waiting = state.store.list_waiting().await?;
    Ok(Json(waiting.iter().map(MatchSummary::from).collect()))
}

#[derive(Deserialize)]
struct CreateMatchRequest {
    name: String,
    #[serde(default)]
    mode: TimeControl,
}

async fn create_match_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<PlayerView>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Match name is required".to_string()));
    }
    let name: String = name.chars().take(MAX_MATCH_NAME).collect();

    let handle = state
        .sessions
        .create(&auth.player_id, &name, req.mode)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PlayerView::for_player(&handle.snapshot(), &auth.player_id)),
    ))
}

async fn view_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerView>, AppError> {
    let handle = state.sessions.get_or_resume(id).await?;
    Ok(Json(PlayerView::for_player(&handle.snapshot(), &auth.player_id)))
}

// ============================================================================
// Command endpoints
// ============================================================================

/// Submit a command as the caller and answer with their updated view
async fn submit(
    state: &AppState,
    auth: &AuthenticatedUser,
    id: Uuid,
    command: Command,
) -> Result<Json<PlayerView>, AppError> {
    let handle: SessionHandle = state.sessions.get_or_resume(id).await?;
    let snapshot = handle
        .submit(Actor::player(auth.player_id.as_str()), command)
        .await?;
    Ok(Json(PlayerView::for_player(&snapshot, &auth.player_id)))
}

async fn join_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerView>, AppError> {
    let view = submit(&state, &auth, id, Command::Join).await?;
    info!(match_id = %id, player_id = %auth.player_id, "Player joined match");
    Ok(view)
}

#[derive(Deserialize)]
struct PlacementRequest {
    placements: Vec<Placement>,
}

async fn placement_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<PlacementRequest>,
) -> Result<Json<PlayerView>, AppError> {
    submit(
        &state,
        &auth,
        id,
        Command::SubmitPlacement {
            placements: req.placements,
        },
    )
    .await
}

#[derive(Deserialize, Default)]
struct RandomPlacementRequest {
    seed: Option<u64>,
}

#[derive(Serialize)]
struct RandomPlacementResponse {
    placements: Vec<Placement>,
}

/// Suggest a legal deployment for the caller's side; nothing is submitted
async fn random_placement_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<RandomPlacementRequest>>,
) -> Result<Json<RandomPlacementResponse>, AppError> {
    let handle = state.sessions.get_or_resume(id).await?;
    let side = handle
        .snapshot()
        .side_of_player(&auth.player_id)
        .ok_or(AppError::Rejected(CommandError::NotParticipant))?;

    let req = body.map(|Json(req)| req).unwrap_or_default();
    let mut rng = match req.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    Ok(Json(RandomPlacementResponse {
        placements: random_placement(side, &mut rng),
    }))
}

/// Cell reference as sent by clients; may point off the board
#[derive(Debug, Clone, Copy, Deserialize)]
struct CellRef {
    x: i32,
    y: i32,
}

impl CellRef {
    fn coord(self) -> Result<Coord, AppError> {
        Coord::new(self.x, self.y).ok_or(AppError::Rejected(CommandError::OffBoard))
    }
}

#[derive(Deserialize)]
struct UnitActionRequest {
    source: CellRef,
    target: CellRef,
}

async fn move_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UnitActionRequest>,
) -> Result<Json<PlayerView>, AppError> {
    let command = Command::Move {
        source: req.source.coord()?,
        target: req.target.coord()?,
    };
    submit(&state, &auth, id, command).await
}

async fn attack_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UnitActionRequest>,
) -> Result<Json<PlayerView>, AppError> {
    let command = Command::Attack {
        source: req.source.coord()?,
        target: req.target.coord()?,
    };
    submit(&state, &auth, id, command).await
}

async fn heal_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UnitActionRequest>,
) -> Result<Json<PlayerView>, AppError> {
    let command = Command::Heal {
        source: req.source.coord()?,
        target: req.target.coord()?,
    };
    submit(&state, &auth, id, command).await
}

async fn surrender_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerView>, AppError> {
    submit(&state, &auth, id, Command::Surrender).await
}

async fn timeout_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerView>, AppError> {
    submit(&state, &auth, id, Command::ClaimTimeout).await
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Rejected(CommandError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rejected(reason) => AppError::Rejected(reason),
            SessionError::NotFound(id) => AppError::NotFound(format!("match {}", id)),
            SessionError::Unavailable => AppError::Unavailable(err.to_string()),
            SessionError::Store(e) => e.into(),
            SessionError::Resume(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt(_) | StoreError::Duplicate(_) => AppError::Internal(err.to_string()),
            StoreError::Supabase(_) => AppError::Unavailable(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Rejected(reason) => (StatusCode::BAD_REQUEST, reason.code(), reason.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg.clone())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::middleware::tests::sign_token;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn app() -> Router {
        let config = Config::from_lookup(|key| match key {
            "AUTH_JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        build_router(AppState::new(config))
    }

    async fn call(app: &Router, method: &str, uri: &str, player: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(player) = player {
            builder = builder.header("Authorization", format!("Bearer {}", sign_token(player, SECRET)));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app();
        let (status, body) = call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn matches_require_auth() {
        let app = app();
        let (status, _) = call(&app, "GET", "/matches", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn lobby_to_battle_over_http() {
        let app = app();
        let (status, created) = call(
            &app,
            "POST",
            "/matches",
            Some("alice"),
            Some(json!({ "name": "Canyon", "mode": "BULLET" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["phase"], "waiting");
        assert_eq!(created["side"], "host");
        let id = created["id"].as_str().unwrap().to_string();

        let (_, lobby) = call(&app, "GET", "/matches", Some("bob"), None).await;
        assert_eq!(lobby.as_array().unwrap().len(), 1);

        let (status, joined) =
            call(&app, "POST", &format!("/matches/{}/join", id), Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(joined["side"], "guest");
        assert_eq!(joined["phase"], "setup");

        for player in ["alice", "bob"] {
            let (status, suggestion) = call(
                &app,
                "POST",
                &format!("/matches/{}/placement/random", id),
                Some(player),
                Some(json!({ "seed": 7 })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let (status, _) = call(
                &app,
                "POST",
                &format!("/matches/{}/placement", id),
                Some(player),
                Some(suggestion),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, view) = call(&app, "GET", &format!("/matches/{}", id), Some("alice"), None).await;
        assert_eq!(view["phase"], "playing");
        assert_eq!(view["turn"], "host");
        assert_eq!(view["hostTime"], 180.0);
        assert_eq!(view["ownBoard"].as_array().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn rejections_carry_codes() {
        let app = app();
        let (_, created) = call(
            &app,
            "POST",
            "/matches",
            Some("alice"),
            Some(json!({ "name": "Gorge" })),
        )
        .await;
        assert_eq!(created["mode"], "BLITZ");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) =
            call(&app, "POST", &format!("/matches/{}/join", id), Some("alice"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_command");

        call(&app, "POST", &format!("/matches/{}/join", id), Some("bob"), None).await;
        let (status, body) = call(
            &app,
            "POST",
            &format!("/matches/{}/placement", id),
            Some("bob"),
            Some(json!({ "placements": [{ "x": 0, "y": 0, "kind": "commander" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "placement_invalid");

        let (status, body) = call(
            &app,
            "POST",
            &format!("/matches/{}/attack", id),
            Some("alice"),
            Some(json!({ "source": { "x": -1, "y": 0 }, "target": { "x": 0, "y": 0 } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_command");
        assert_eq!(body["error"], "cell is off the board");

        for action in ["move", "heal"] {
            let (status, body) = call(
                &app,
                "POST",
                &format!("/matches/{}/{}", id, action),
                Some("bob"),
                Some(json!({ "source": { "x": 0, "y": 7 }, "target": { "x": 8, "y": 7 } })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "cell is off the board");
        }

        let (status, _) = call(
            &app,
            "GET",
            &format!("/matches/{}", Uuid::new_v4()),
            Some("alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let app = app();
        let (status, _) = call(
            &app,
            "POST",
            "/matches",
            Some("alice"),
            Some(json!({ "name": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
