// Budget Flow - Web Server
// JSON API over the budget core with Axum

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use budget_flow::{BudgetError, BudgetLoader, DataSource, FlowConfig, FsDataSource, SqliteDataSource};
#[cfg(feature = "claims")]
use budget_flow::ClaimsClient;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Shared application state
#[derive(Clone)]
struct AppState {
    loader: Arc<BudgetLoader>,
    #[cfg(feature = "claims")]
    claims: Option<Arc<ClaimsClient>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        let body = Self {
            success: true,
            data: Some(data),
            error: None,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

/// NotFound → 404, everything else → 500
fn api_error(e: BudgetError) -> Response {
    match &e {
        BudgetError::NotFound(_) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        BudgetError::Validation { context, issues } => {
            for issue in issues {
                tracing::error!("Invalid data in {}: {}", context, issue);
            }
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        _ => {
            tracing::error!("Request failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Run a blocking loader call off the async workers
async fn with_loader<T, F>(state: &AppState, f: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&BudgetLoader) -> budget_flow::Result<T> + Send + 'static,
{
    let loader = Arc::clone(&state.loader);
    match tokio::task::spawn_blocking(move || f(&loader)).await {
        Ok(Ok(data)) => ApiResponse::ok(data),
        Ok(Err(e)) => api_error(e),
        Err(e) => {
            tracing::error!("Loader task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

/// `Path` has already percent-decoded the wildcard; only stray slashes remain
fn normalize_slug(slug: &str) -> String {
    slug.trim_matches('/').to_string()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/provinces
async fn get_provinces(State(state): State<AppState>) -> Response {
    with_loader(&state, |loader| loader.list_provinces()).await
}

/// GET /api/municipalities
async fn get_municipalities(State(state): State<AppState>) -> Response {
    with_loader(&state, |loader| loader.list_municipalities_by_province()).await
}

/// GET /api/years/*slug - Empty list for unknown jurisdictions
async fn get_years(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let slug = normalize_slug(&slug);
    with_loader(&state, move |loader| {
        Ok(loader.get_available_years_for_jurisdiction(&slug))
    })
    .await
}

/// GET /api/jurisdictions/:year/*slug
async fn get_jurisdiction(
    State(state): State<AppState>,
    Path((year, slug)): Path<(String, String)>,
) -> Response {
    let slug = normalize_slug(&slug);
    with_loader(&state, move |loader| loader.get_jurisdiction_data(&slug, &year)).await
}

/// GET /api/departments/:year/*slug
async fn get_departments(
    State(state): State<AppState>,
    Path((year, slug)): Path<(String, String)>,
) -> Response {
    let slug = normalize_slug(&slug);
    with_loader(&state, move |loader| loader.get_expanded_departments(&slug, &year)).await
}

/// GET /api/audit/:year/*slug
async fn get_audit(
    State(state): State<AppState>,
    Path((year, slug)): Path<(String, String)>,
) -> Response {
    let slug = normalize_slug(&slug);
    with_loader(&state, move |loader| loader.audit(&slug, &year)).await
}

/// GET /api/claims/:band - Empty list when no claims service is configured
#[cfg(feature = "claims")]
async fn get_claims(State(state): State<AppState>, Path(band): Path<String>) -> Response {
    match &state.claims {
        Some(client) => ApiResponse::ok(client.lookup(&band).await),
        None => ApiResponse::ok(Vec::<budget_flow::ClaimRecord>::new()),
    }
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/provinces", get(get_provinces))
        .route("/municipalities", get(get_municipalities))
        .route("/years/*slug", get(get_years))
        .route("/jurisdictions/:year/*slug", get(get_jurisdiction))
        .route("/departments/:year/*slug", get(get_departments))
        .route("/audit/:year/*slug", get(get_audit));

    #[cfg(feature = "claims")]
    let api_routes = api_routes.route("/claims/:band", get(get_claims));

    Router::new()
        .nest("/api", api_routes.with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

fn open_source() -> Result<Arc<dyn DataSource>> {
    match std::env::var("BUDGET_DB") {
        Ok(db) => {
            let snapshot = SqliteDataSource::open(&db)
                .with_context(|| format!("Failed to open snapshot {}", db))?;
            tracing::info!("✓ Snapshot opened: {}", db);
            Ok(Arc::new(snapshot))
        }
        Err(_) => {
            let data_dir = std::env::var("BUDGET_DATA_DIR").unwrap_or_else(|_| "data".to_string());
            tracing::info!("✓ Dataset directory: {}", data_dir);
            Ok(Arc::new(FsDataSource::new(data_dir)))
        }
    }
}

fn load_config() -> Result<FlowConfig> {
    let config = match std::env::var("BUDGET_CONFIG") {
        Ok(path) => FlowConfig::from_file(&path)?,
        Err(_) => FlowConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🌐 Budget Flow - Web Server");

    let loader = BudgetLoader::new(open_source()?, load_config()?);

    let state = AppState {
        loader: Arc::new(loader),
        #[cfg(feature = "claims")]
        claims: match std::env::var("BUDGET_CLAIMS_URL") {
            Ok(endpoint) => Some(Arc::new(ClaimsClient::new(endpoint)?)),
            Err(_) => None,
        },
    };

    let app = build_router(state);

    let addr = std::env::var("BUDGET_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("🚀 Server running on http://{}", addr);
    tracing::info!("   API: http://{}/api/provinces", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
