use crate::adapters::{AdapterConfig, AdapterRegistry};
use crate::auth::{AuthFlow, LoginOutcome, LoginStrategy, SessionStatus};
use crate::scrape::{ScrapeRequest, ScrapeResult, Scraper};
use crate::session::SessionStore;
use crate::{Result, ScraperError};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
struct AppState {
    scraper: Arc<Scraper>,
    auth: Arc<AuthFlow>,
    adapters: Arc<AdapterRegistry>,
    sessions: Arc<SessionStore>,
}

#[derive(Serialize)]
struct ApiResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct SessionListResponse {
    ok: bool,
    sessions: Vec<String>,
}

#[derive(Serialize)]
struct AdapterListResponse {
    ok: bool,
    adapters: Vec<AdapterConfig>,
}

#[derive(Serialize)]
struct AuthSessionsResponse {
    ok: bool,
    platforms: Vec<SessionStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutResponse {
    ok: bool,
    logged_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct StartLoginRequest {
    #[serde(default)]
    strategy: LoginStrategy,
}

/// Local HTTP surface for the desktop UI. Binds loopback only.
pub struct HttpServer {
    host: String,
    port: u16,
    state: AppState,
}

impl HttpServer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        scraper: Arc<Scraper>,
        auth: Arc<AuthFlow>,
        adapters: Arc<AdapterRegistry>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            state: AppState {
                scraper,
                auth,
                adapters,
                sessions,
            },
        }
    }

    pub async fn run(&self) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/api/health", get(health))
            .route("/api/scrape", post(scrape))
            .route("/api/sessions", get(list_sessions))
            .route("/api/sessions/{name}", delete(delete_session))
            .route("/api/adapters", get(list_adapters).post(save_adapter))
            .route("/auth/sessions", get(auth_sessions))
            .route("/auth/{platform}/start", post(start_login))
            .route("/auth/{platform}/logout", post(logout))
            .layer(cors)
            .with_state(self.state.clone());

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("HTTP server listening on {}", addr);

        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn scrape(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> (StatusCode, Json<ScrapeResult>) {
    match state.scraper.scrape(&request).await {
        Ok(result) => (StatusCode::OK, Json(result)),
        // Only launch/connection trouble gets here; request-level failures
        // come back as a result with ok=false.
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ScrapeResult::failure(e.to_string())),
        ),
    }
}

async fn list_sessions(State(state): State<AppState>) -> (StatusCode, Json<SessionListResponse>) {
    match state.sessions.list() {
        Ok(sessions) => (StatusCode::OK, Json(SessionListResponse { ok: true, sessions })),
        Err(e) => {
            tracing::error!("listing sessions failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SessionListResponse {
                    ok: false,
                    sessions: Vec::new(),
                }),
            )
        }
    }
}

async fn delete_session(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.sessions.delete(&name) {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success())),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("session not found")),
        ),
        Err(e @ ScraperError::InvalidSessionName(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn list_adapters(State(state): State<AppState>) -> (StatusCode, Json<AdapterListResponse>) {
    match state.adapters.list() {
        Ok(adapters) => (StatusCode::OK, Json(AdapterListResponse { ok: true, adapters })),
        Err(e) => {
            tracing::error!("listing adapters failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AdapterListResponse {
                    ok: false,
                    adapters: Vec::new(),
                }),
            )
        }
    }
}

async fn save_adapter(
    State(state): State<AppState>,
    Json(adapter): Json<AdapterConfig>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.adapters.save(&adapter) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success())),
        Err(e @ ScraperError::InvalidAdapter(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn auth_sessions(State(state): State<AppState>) -> Json<AuthSessionsResponse> {
    Json(AuthSessionsResponse {
        ok: true,
        platforms: state.auth.sessions_status(),
    })
}

async fn start_login(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    body: Option<Json<StartLoginRequest>>,
) -> (StatusCode, Json<LoginOutcome>) {
    let strategy = body.map(|Json(b)| b.strategy).unwrap_or_default();

    match state.auth.start_login(&platform, strategy).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(e @ ScraperError::UnknownPlatform(_)) => (
            StatusCode::NOT_FOUND,
            Json(LoginOutcome {
                ok: false,
                message: e.to_string(),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LoginOutcome {
                ok: false,
                message: e.to_string(),
            }),
        ),
    }
}

async fn logout(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> (StatusCode, Json<LogoutResponse>) {
    match state.auth.logout(&platform) {
        // Deleting an absent session is still a successful logout.
        Ok(logged_out) => (
            StatusCode::OK,
            Json(LogoutResponse {
                ok: true,
                logged_out,
                error: None,
            }),
        ),
        Err(e @ ScraperError::UnknownPlatform(_)) => (
            StatusCode::NOT_FOUND,
            Json(LogoutResponse {
                ok: false,
                logged_out: false,
                error: Some(e.to_string()),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LogoutResponse {
                ok: false,
                logged_out: false,
                error: Some(e.to_string()),
            }),
        ),
    }
}
