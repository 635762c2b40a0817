// Mosque Dues - Web Server
// Read-only REST API over the dues database

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use log::{error, info};
use mosque_dues::{
    load_all_donors, Donor, DonorStatus, DuesConfig, DuesError, DuesService, SkippedDonor,
    SqliteRepository, SystemClock,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<DuesConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<Option<()>> {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Donor response (simplified for API)
#[derive(Serialize)]
struct DonorResponse {
    id: String,
    name: String,
    phone: String,
    monthly_amount: f64,
    status: DonorStatus,
    start_date: String,
}

impl From<Donor> for DonorResponse {
    fn from(donor: Donor) -> Self {
        Self {
            id: donor.id,
            name: donor.name,
            phone: donor.phone,
            monthly_amount: donor.monthly_amount,
            status: donor.status,
            start_date: donor.start_date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Serialize)]
struct DonorListResponse {
    donors: Vec<DonorResponse>,
    skipped: Vec<SkippedDonor>,
}

#[derive(Serialize)]
struct MonthsResponse {
    donor_id: String,
    months: Vec<String>,
    count: usize,
}

fn months_response(donor_id: String, months: Vec<mosque_dues::MonthLabel>) -> MonthsResponse {
    let months: Vec<String> = months.iter().map(|m| m.label()).collect();
    MonthsResponse {
        donor_id,
        count: months.len(),
        months,
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(err: DuesError) -> Response {
    let status = match &err {
        DuesError::DonorNotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_data_error() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    }
    (status, Json(ApiResponse::failed(err.to_string()))).into_response()
}

/// Run `f` against a service bound to the shared connection.
fn with_service<T, F>(state: &AppState, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(&DuesService<SqliteRepository<'_>, SystemClock>) -> mosque_dues::Result<T>,
{
    let conn = state.db.lock().unwrap_or_else(PoisonError::into_inner);
    let repo = SqliteRepository::new(&conn);
    let service = DuesService::from_config(repo, SystemClock, &state.config);

    match f(&service) {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => error_response(e),
    }
}

fn decode_id(raw: String) -> String {
    urlencoding::decode(&raw)
        .map(|id| id.into_owned())
        .unwrap_or(raw)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/donors - All donors, plus stored rows that could not be loaded
async fn list_donors(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap_or_else(PoisonError::into_inner);

    match load_all_donors(&conn) {
        Ok(batch) => {
            let response = DonorListResponse {
                donors: batch.donors.into_iter().map(DonorResponse::from).collect(),
                skipped: batch.skipped,
            };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/donors/:id/missing - Unpaid months for one donor
async fn donor_missing(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = decode_id(id);
    with_service(&state, |service| {
        Ok(months_response(id.clone(), service.get_missing_months(&id)?))
    })
}

/// GET /api/donors/:id/paid - Paid months for one donor
async fn donor_paid(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = decode_id(id);
    with_service(&state, |service| {
        Ok(months_response(id.clone(), service.get_donor_paid_months(&id)?))
    })
}

/// GET /api/donors/:id/reconciliation - Full breakdown for one donor
async fn donor_reconciliation(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = decode_id(id);
    with_service(&state, |service| service.reconcile_donor(&id))
}

/// GET /api/dues - Dues report for all donors
async fn dues_report(State(state): State<AppState>) -> Response {
    with_service(&state, |service| service.dues_report())
}

/// GET /api/status-audit - Stored vs suggested donor status
async fn status_audit(State(state): State<AppState>) -> Response {
    with_service(&state, |service| service.status_audit())
}

/// GET /api/notices - Dues notices
async fn notices(State(state): State<AppState>) -> Response {
    with_service(&state, |service| service.notices())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌐 Mosque Dues - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = DuesConfig::load()?;

    if !config.database_path.exists() {
        eprintln!("❌ Database not found at {:?}", config.database_path);
        eprintln!("   Run: mosque-dues init");
        eprintln!("   then import donors and income first.");
        std::process::exit(1);
    }

    let conn = Connection::open(&config.database_path)?;
    println!("✓ Database opened: {:?}", config.database_path);

    let bind_addr = config.bind_addr.clone();

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/donors", get(list_donors))
        .route("/donors/:id/missing", get(donor_missing))
        .route("/donors/:id/paid", get(donor_paid))
        .route("/donors/:id/reconciliation", get(donor_reconciliation))
        .route("/dues", get(dues_report))
        .route("/status-audit", get(status_audit))
        .route("/notices", get(notices))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on {}", bind_addr);
    println!("\n🚀 Server running on http://{}", bind_addr);
    println!("   API: http://{}/api/dues", bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
