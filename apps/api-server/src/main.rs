//! api-server — HTTP API for the Member Vault workspace.
//!
//! Exposes CRUD endpoints for members under `/api/v1/member` and supports:
//! - Storage: SQLite (default, `sqlite` feature) or in-memory.
//! - Errors: every failure is rendered by the error translator (see `error.rs`)
//!   as a JSON body with a stable `statusCode`.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # throwaway in-memory store with development error detail
//! STORAGE_PROVIDER=memory APP_ENV=development cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use axum::http::HeaderValue;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use domain::adapters::memory_repo::InMemoryMemberRepo;
use domain::dto::{CreateMemberDto, MemberDto, UpdateMemberDto};
use domain::service::MemberService;
use domain::validate::{validate_create, validate_update};
use domain::{Clock, CoreError, Member, MemberChanges, MemberId, MemberRepository, NewMember};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppEnvironment;
use crate::error::{
    catch_panics, method_not_allowed, translate_errors, unknown_route, AppError, ErrorTranslator,
};

// Store selected at startup; sqlite is feature-gated.
enum AnyRepo {
    Memory(InMemoryMemberRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteMemberRepo),
}

impl MemberRepository for AnyRepo {
    fn list_all(&self) -> Result<Vec<Member>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.list_all(),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.list_all(),
        }
    }

    fn get(&self, id: MemberId) -> Result<Member, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.get(id),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.get(id),
        }
    }

    fn create(&self, input: NewMember, now: SystemTime) -> Result<Member, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.create(input, now),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.create(input, now),
        }
    }

    fn update(&self, changes: MemberChanges, now: SystemTime) -> Result<Member, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.update(changes, now),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.update(changes, now),
        }
    }

    fn delete(&self, id: MemberId) -> Result<bool, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.delete(id),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.delete(id),
        }
    }
}

#[derive(Clone)]
struct StdClock;
impl Clock for StdClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

type Service = MemberService<AnyRepo, StdClock>;

#[derive(Clone)]
struct AppState {
    service: Arc<Service>,
}

impl AppState {
    fn new(repo: AnyRepo) -> Self {
        Self {
            service: Arc::new(MemberService::new(repo, StdClock)),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_insecure();

    let repo = match build_repo(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!(err = %e, "failed to open member store");
            std::process::exit(1);
        }
    };

    let mut app = app(AppState::new(repo), cfg.environment);

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, environment = ?cfg.environment, "api-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind port");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

/// Member routes wrapped in the panic catcher, error translator, request-id
/// and trace layers. Unknown paths and methods also answer with JSON errors.
fn app(state: AppState, environment: AppEnvironment) -> Router {
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    Router::new()
        .route(
            http_common::MEMBER_ROUTE,
            get(list_members)
                .post(create_member)
                .fallback(method_not_allowed),
        )
        .route(
            &format!("{}/:id", http_common::MEMBER_ROUTE),
            get(get_member)
                .put(update_member)
                .delete(delete_member)
                .fallback(method_not_allowed),
        )
        .fallback(unknown_route)
        .layer(catch_panics(environment))
        .layer(middleware::from_fn_with_state(
            ErrorTranslator::new(environment),
            translate_errors,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct the member store based on config and feature flags.
fn build_repo(cfg: &config::Config) -> Result<AnyRepo, CoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            let repo = sqlite_adapter::SqliteMemberRepo::new(&cfg.db_path)?;
            info!(path = %cfg.db_path.display(), "using sqlite member store");
            Ok(AnyRepo::Sqlite(repo))
        }
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => {
            tracing::warn!("sqlite feature disabled; falling back to in-memory store");
            Ok(AnyRepo::Memory(InMemoryMemberRepo::new()))
        }
        config::StorageProvider::Memory => Ok(AnyRepo::Memory(InMemoryMemberRepo::new())),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(err = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(err = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

async fn list_members(State(state): State<AppState>) -> Result<Json<Vec<MemberDto>>, AppError> {
    let members = state.service.get_all_members()?;
    Ok(Json(members))
}

async fn get_member(
    State(state): State<AppState>,
    path: Result<Path<MemberId>, PathRejection>,
) -> Result<Json<MemberDto>, AppError> {
    let Path(id) = path?;
    let member = state.service.get_member_by_id(id)?;
    Ok(Json(member))
}

async fn create_member(
    State(state): State<AppState>,
    body: Result<Json<CreateMemberDto>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(dto) = body?;
    validate_create(&dto)?;
    let created = state.service.add_member(dto)?;
    info!(id = created.id, "member created");
    let location = http_common::member_location(created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(created),
    ))
}

async fn update_member(
    State(state): State<AppState>,
    path: Result<Path<MemberId>, PathRejection>,
    body: Result<Json<UpdateMemberDto>, JsonRejection>,
) -> Result<Json<MemberDto>, AppError> {
    let Path(id) = path?;
    let Json(dto) = body?;
    if id != dto.id {
        return Err(AppError::BadRequest(
            "ID in URL does not match ID in payload.".into(),
        ));
    }
    validate_update(&dto)?;
    let updated = state.service.update_member(dto)?;
    info!(id, "member updated");
    Ok(Json(updated))
}

async fn delete_member(
    State(state): State<AppState>,
    path: Result<Path<MemberId>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    if !state.service.delete_member(id)? {
        return Err(CoreError::member_not_found(id).into());
    }
    info!(id, "member deleted");
    Ok(StatusCode::NO_CONTENT)
}
