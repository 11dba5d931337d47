// Expense Ledger - Web Server
// REST API with Axum, same routes and payloads as the browser client expects

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use expense_ledger::{
    categories, category_breakdown, query, AppConfig, CategoryTotal, Clock, Expense,
    ExpenseError, ExpenseFilter, ExpensePatch, ExpenseStore, NewExpense, Page, ReconcileReport,
    RecurringEngine, SortDir, SortKey, SortOrder, SqliteStore, Summary, SystemClock, YearMonth,
    DEFAULT_PAGE_SIZE,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl AppState {
    fn new(store: SqliteStore, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            clock,
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, SqliteStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::internal("store lock poisoned"))
    }

    fn reconcile(&self) -> Result<ReconcileReport, ApiError> {
        let mut store = self.store()?;
        let engine = RecurringEngine::new(self.clock.as_ref());
        Ok(engine.reconcile_store(&mut *store)?)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Rendered as `{"error": "..."}` with a matching status
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ExpenseError> for ApiError {
    fn from(err: ExpenseError) -> Self {
        match err {
            ExpenseError::Validation(_) | ExpenseError::InvalidMonth(_) | ExpenseError::Import(_) => {
                Self::bad_request(err.to_string())
            }
            ExpenseError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            other => {
                error!("Store failure: {}", other);
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    user_id: Option<String>,
    month: Option<String>,
    category: Option<String>,
    search: Option<String>,
    sort: Option<String>,
    dir: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

impl ListParams {
    fn filter(&self) -> Result<ExpenseFilter, ApiError> {
        let month = match self.month.as_deref().filter(|m| !m.is_empty()) {
            Some(m) => Some(m.parse::<YearMonth>()?),
            None => None,
        };
        Ok(ExpenseFilter {
            month,
            category: self.category.clone(),
            search: self.search.clone(),
            user_id: self.user_id.clone(),
        })
    }

    fn order(&self) -> Result<SortOrder, ApiError> {
        let key = match self.sort.as_deref() {
            Some(s) => s.parse::<SortKey>().map_err(ApiError::bad_request)?,
            None => SortKey::Date,
        };
        let dir = match self.dir.as_deref() {
            Some(d) => d.parse::<SortDir>().map_err(ApiError::bad_request)?,
            None => key.default_dir(),
        };
        Ok(SortOrder { key, dir })
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/expenses - Filtered expenses, newest first
async fn list_expenses(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let filter = params.filter()?;
    let store = state.store()?;
    let all = match params.user_id.as_deref() {
        Some(user_id) => store.list_for_user(user_id)?,
        None => store.list()?,
    };
    Ok(Json(all.into_iter().filter(|e| filter.matches(e)).collect()))
}

/// GET /api/expenses/query - Filtered, sorted, paginated table
async fn query_expenses(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Expense>>, ApiError> {
    let filter = params.filter()?;
    let order = params.order()?;
    let all = state.store()?.list()?;
    let page = query(
        &all,
        &filter,
        order,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    Ok(Json(page.cloned()))
}

/// POST /api/expenses - Create an expense; a missing date means today
async fn create_expense(
    State(state): State<AppState>,
    payload: Result<Json<NewExpense>, JsonRejection>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let Json(mut new) = payload?;
    if new.date.trim().is_empty() {
        new.date = state.clock.today_iso();
    }
    let expense = state.store()?.create(new)?;
    info!(id = %expense.id, "Created expense");
    Ok((StatusCode::CREATED, Json(expense)))
}

/// PUT|PATCH /api/expenses/:id - Update fields of an expense
async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ExpensePatch>, JsonRejection>,
) -> Result<Json<Expense>, ApiError> {
    let Json(patch) = payload?;
    let updated = state.store()?.update(&id, &patch)?;
    Ok(Json(updated))
}

/// DELETE /api/expenses/:id
async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store()?.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: Summary,
    breakdown: Vec<CategoryTotal>,
    categories: Vec<String>,
}

/// GET /api/summary - Totals plus per-category breakdown of the filtered rows
async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    let filter = params.filter()?;
    let all = state.store()?.list()?;
    let filtered = filter.apply(&all);

    let order = params.order()?;
    let page = query(
        &all,
        &filter,
        order,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let response = SummaryResponse {
        summary: Summary::compute(&all, page.rows.iter().copied(), state.clock.current_month()),
        breakdown: category_breakdown(filtered),
        categories: categories(&all),
    };
    Ok(Json(ApiResponse::ok(response)))
}

/// POST /api/recurring/reconcile - Backfill missing recurring months
async fn reconcile_recurring(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ReconcileReport>>, ApiError> {
    let report = state.reconcile()?;
    Ok(Json(ApiResponse::ok(report)))
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/query", get(query_expenses))
        .route(
            "/expenses/:id",
            put(update_expense).patch(update_expense).delete(delete_expense),
        )
        .route("/summary", get(get_summary))
        .route("/recurring/reconcile", post(reconcile_recurring))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info,tower_http=debug")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = AppConfig::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?
        .with_actor("server");
    info!("Database opened: {}", config.db_path.display());

    let state = AppState::new(store, Arc::new(SystemClock));

    // Boot pass: bring recurring expenses up to the current month
    match state.reconcile() {
        Ok(report) => info!("{}", report.summary()),
        Err(e) => error!("Startup reconcile failed: {}", e.message),
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Server running on http://{}", config.bind_addr);
    info!("API: http://{}/api/expenses", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
