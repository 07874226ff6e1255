//! tavle-api - HTTP API server for the tavle event platform

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tavle_api::services::{process_submission, IdentityClient, ListingCache, Notifier, RecaptchaVerifier};
use tavle_core::{
    defaults, AdminIdentity, EditLock, EventFilter, EventRepository, EventStatus, IdentityVerifier,
    LockOutcome, LockRepository, SettingsRepository, SubmitEventRequest, UpsertEventRequest,
};
use tavle_db::{Database, FilesystemBackend, StorageBackend};
use tavle_jobs::{Scheduler, SchedulerConfig};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APP STATE
// =============================================================================

type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
struct AppState {
    db: Database,
    /// Short-TTL cache for the public listing endpoint.
    listing_cache: ListingCache,
    /// Anti-abuse token verifier for public submissions.
    moderation: Arc<RecaptchaVerifier>,
    /// Identity provider client (token verification + admin directory).
    identity: Arc<IdentityClient>,
    /// Fire-and-forget submission notifications.
    notifier: Notifier,
    /// Upload storage, used for media cleanup on replace/delete.
    storage: Arc<dyn StorageBackend>,
    /// Global per-process request limiter (None if disabled). Distinct from
    /// the durable per-client submission counter in the database.
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

// =============================================================================
// CORS CONFIGURATION HELPER
// =============================================================================

/// Parse allowed origins from the comma-separated `ALLOWED_ORIGINS`
/// environment variable. Invalid entries are logged and skipped; when the
/// variable is unset the local development origins apply.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    if origins_str.trim().is_empty() {
        return vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "tavle_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tavle_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("tavle-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/tavle".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    // Global request limiter configuration
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Initialize upload storage
    let file_storage_path =
        std::env::var("FILE_STORAGE_PATH").unwrap_or_else(|_| "/var/lib/tavle/files".to_string());
    let storage = FilesystemBackend::new(&file_storage_path);
    if let Err(e) = storage.validate().await {
        warn!("Upload storage validation failed: {}", e);
    }
    let storage: Arc<dyn StorageBackend> = Arc::new(storage);
    info!("Upload storage initialized at {}", file_storage_path);

    // External collaborators
    let identity = Arc::new(IdentityClient::from_env()?);
    let moderation = Arc::new(RecaptchaVerifier::from_env());
    let notifier = Notifier::from_env();

    // Create and start the lifecycle scheduler
    let jobs_enabled = std::env::var("JOBS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let _scheduler_handle = if jobs_enabled {
        info!("Starting lifecycle scheduler...");
        let scheduler = Scheduler::new(
            db.clone(),
            storage.clone(),
            identity.clone(),
            SchedulerConfig::from_env(),
        );
        let handle = scheduler.start();
        info!("Lifecycle scheduler started");
        Some(handle)
    } else {
        info!("Lifecycle scheduler disabled");
        None
    };

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let period = std::time::Duration::from_secs(rate_limit_period_secs.max(1));
        let burst = NonZeroU32::new(rate_limit_requests.max(1) as u32)
            .unwrap_or(NonZeroU32::MIN);
        let quota = match Quota::with_period(period) {
            Some(q) => q.allow_burst(burst),
            None => Quota::per_minute(burst),
        };
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    // Create app state
    let state = AppState {
        db,
        listing_cache: ListingCache::new(),
        moderation,
        identity,
        notifier,
        storage,
        rate_limiter,
    };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Public queries
        .route("/api/v1/events", get(list_events))
        .route("/api/v1/event", get(get_event))
        .route("/preview", get(preview_page))
        // Public submissions
        .route("/api/v1/submit", post(submit_event))
        // Admin console
        .route(
            "/api/v1/admin/events",
            get(admin_list_events).post(admin_upsert_event),
        )
        .route("/api/v1/admin/events/delete", post(admin_delete_event))
        .route("/api/v1/admin/events/lock", post(admin_lock_event))
        .route(
            "/api/v1/admin/settings/recipients",
            get(admin_get_recipients).post(admin_set_recipients),
        )
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        // Submissions carry rich text and media references, never file bodies
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)) // 2 MB
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            warn!("Global rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// ADMIN GATE
// =============================================================================

/// Extractor that requires an allow-listed administrator.
///
/// Verifies the bearer token with the identity provider, then checks the
/// allow-list. Missing or invalid token rejects with 401; a valid identity
/// that is not listed rejects with 403.
#[derive(Debug, Clone)]
struct RequireAdmin(AdminIdentity);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = authorize_admin(state, &parts.headers).await?;
        Ok(RequireAdmin(identity))
    }
}

async fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminIdentity, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing bearer token".to_string())
        })?;

    let identity = state.identity.verify(token).await?;
    if !state.db.settings.is_admin(&identity.uid, &identity.email).await? {
        return Err(ApiError::Forbidden(
            "Account is not on the administrator list".to_string(),
        ));
    }
    Ok(identity)
}

/// Best-guess client address for the durable submission counter: the first
/// hop in `X-Forwarded-For` when present (reverse-proxy deployments),
/// otherwise `X-Real-IP`, otherwise a shared fallback bucket.
fn client_address(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    "unknown".to_string()
}

// =============================================================================
// PUBLIC QUERY HANDLERS
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct ListEventsQuery {
    #[serde(rename = "type")]
    filter: Option<String>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = EventFilter::parse(query.filter.as_deref().unwrap_or(""));

    if let Some(cached) = state.listing_cache.get(filter).await {
        return Ok(Json(cached.as_ref().clone()));
    }

    let events = state
        .db
        .events
        .list_published(filter, defaults::PUBLIC_LIST_LIMIT)
        .await?;
    let listing: Vec<_> = events.iter().map(|e| e.to_public_summary()).collect();
    let listing = state.listing_cache.put(filter, listing).await;
    Ok(Json(listing.as_ref().clone()))
}

#[derive(Debug, Deserialize)]
struct GetEventQuery {
    slug: String,
    #[serde(default)]
    include_drafts: bool,
}

async fn get_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GetEventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // Draft visibility is an explicit editor request, never implicit.
    if query.include_drafts {
        authorize_admin(&state, &headers).await?;
    }

    let event = state
        .db
        .events
        .get_by_slug(&query.slug, query.include_drafts)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Event '{}' not found", query.slug)))?;

    Ok(Json(event.to_public_full()))
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    slug: String,
}

/// Bot-facing preview page: minimal HTML carrying the social metadata for
/// link unfurling. Published events only.
async fn preview_page(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> impl IntoResponse {
    let event = match state.db.events.get_by_slug(&query.slug, false).await {
        Ok(Some(event)) if event.status == EventStatus::Published => event,
        Ok(_) => return not_found_page(),
        Err(e) => {
            error!("Preview lookup failed for '{}': {}", query.slug, e);
            return not_found_page();
        }
    };

    let title = escape_html(&event.title);
    let description = escape_html(&event.summary);
    let image = escape_html(&event.image_url);

    let mut head = String::new();
    head.push_str(&format!("<title>{}</title>\n", title));
    head.push_str(&format!(
        "<meta property=\"og:title\" content=\"{}\">\n",
        title
    ));
    head.push_str(&format!(
        "<meta property=\"og:description\" content=\"{}\">\n",
        description
    ));
    head.push_str("<meta property=\"og:type\" content=\"article\">\n");
    if !image.is_empty() {
        head.push_str(&format!(
            "<meta property=\"og:image\" content=\"{}\">\n",
            image
        ));
        head.push_str("<meta name=\"twitter:card\" content=\"summary_large_image\">\n");
    } else {
        head.push_str("<meta name=\"twitter:card\" content=\"summary\">\n");
    }
    head.push_str(&format!(
        "<meta name=\"twitter:title\" content=\"{}\">\n",
        title
    ));
    head.push_str(&format!(
        "<meta name=\"twitter:description\" content=\"{}\">\n",
        description
    ));

    let body = format!(
        "<!doctype html>\n<html lang=\"no\">\n<head>\n<meta charset=\"utf-8\">\n{}</head>\n<body>\n<h1>{}</h1>\n<p>{}</p>\n</body>\n</html>\n",
        head, title, description
    );
    (StatusCode::OK, Html(body)).into_response()
}

fn not_found_page() -> axum::response::Response {
    let body = "<!doctype html>\n<html lang=\"no\">\n<head>\n<meta charset=\"utf-8\">\n<title>Not found</title>\n</head>\n<body>\n<h1>Event not found</h1>\n</body>\n</html>\n";
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// SUBMISSION HANDLER
// =============================================================================

#[derive(Debug, Deserialize)]
struct SubmitPayload {
    /// Anti-abuse token issued to the submission form.
    #[serde(rename = "captchaToken")]
    captcha_token: Option<String>,
    #[serde(flatten)]
    event: SubmitEventRequest,
}

async fn submit_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let client_addr = client_address(&headers);

    let event = process_submission(
        &state.db.rate_limits,
        state.moderation.as_ref(),
        &state.db.events,
        payload.event,
        payload.captcha_token.as_deref(),
        &client_addr,
        Utc::now(),
    )
    .await?;

    state
        .notifier
        .notify_submission(Arc::new(state.db.settings.clone()), &event);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "received",
            "id": event.id,
        })),
    ))
}

// =============================================================================
// ADMIN HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct AdminListQuery {
    #[serde(rename = "type")]
    filter: Option<String>,
    status: Option<String>,
}

async fn admin_list_events(
    State(state): State<AppState>,
    RequireAdmin(_identity): RequireAdmin,
    Query(query): Query<AdminListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = EventFilter::parse(query.filter.as_deref().unwrap_or(""));
    let status = query.status.as_deref().and_then(EventStatus::parse);

    let events = state.db.events.admin_list(filter, status).await?;
    Ok(Json(events))
}

async fn admin_upsert_event(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Json(req): Json<UpsertEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.db.events.upsert(req, Utc::now()).await?;

    // Superseded media files are deleted best-effort; the record is already
    // written, so a storage failure only leaves an orphan for the sweeper.
    for path in [&outcome.replaced_image_path, &outcome.replaced_logo_path]
        .into_iter()
        .flatten()
    {
        if let Err(e) = state.storage.delete(path).await {
            warn!("Failed to delete replaced media '{}': {}", path, e);
        }
    }

    state.listing_cache.invalidate_all().await;
    info!(
        event_id = %outcome.id,
        created = outcome.created,
        admin = %identity.uid,
        "Event saved"
    );

    Ok(Json(serde_json::json!({
        "id": outcome.id,
        "created": outcome.created,
    })))
}

#[derive(Debug, Deserialize)]
struct DeleteEventRequest {
    id: Uuid,
}

async fn admin_delete_event(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Json(req): Json<DeleteEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.db.events.delete(req.id).await?;

    for path in [&event.image_path, &event.logo_path] {
        if path.is_empty() {
            continue;
        }
        if let Err(e) = state.storage.delete(path).await {
            warn!("Failed to delete media '{}': {}", path, e);
        }
    }

    state.listing_cache.invalidate_all().await;
    info!(event_id = %event.id, admin = %identity.uid, "Event deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct LockRequest {
    id: Uuid,
    /// "lock" acquires or renews, "unlock" releases.
    action: String,
}

async fn admin_lock_event(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Json(req): Json<LockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let outcome = match req.action.as_str() {
        "lock" => state.db.locks.acquire(req.id, &identity, now).await?,
        "unlock" => state.db.locks.release(req.id, &identity.uid, now).await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "Unknown lock action '{}'",
                other
            )))
        }
    };

    match outcome {
        LockOutcome::Granted(lock) => Ok(Json(serde_json::json!({
            "locked": lock.is_some(),
            "lock": lock,
        }))),
        LockOutcome::Held(holder) => Err(ApiError::LockHeld(holder)),
    }
}

#[derive(Debug, Deserialize)]
struct RecipientsRequest {
    emails: Vec<String>,
}

async fn admin_get_recipients(
    State(state): State<AppState>,
    RequireAdmin(_identity): RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let emails = state.db.settings.mail_recipients().await?;
    Ok(Json(serde_json::json!({ "emails": emails })))
}

async fn admin_set_recipients(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Json(req): Json<RecipientsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    for email in &req.emails {
        if !tavle_core::is_valid_email(email) {
            return Err(ApiError::BadRequest(format!(
                "Invalid recipient email '{}'",
                email
            )));
        }
    }

    state.db.settings.set_mail_recipients(&req.emails).await?;
    info!(
        count = req.emails.len(),
        admin = %identity.uid,
        "Notification recipients updated"
    );
    Ok(Json(serde_json::json!({ "emails": req.emails })))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Core(tavle_core::Error),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    /// Another editor holds a live lock; carries the holder for display.
    LockHeld(EditLock),
}

impl From<tavle_core::Error> for ApiError {
    fn from(err: tavle_core::Error) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use tavle_core::Error;

        let (status, message) = match self {
            ApiError::LockHeld(holder) => {
                let body = Json(serde_json::json!({
                    "error": "Event is being edited by someone else",
                    "locked_by": {
                        "name": holder.name,
                        "email": holder.email,
                        "at": holder.at,
                    },
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Core(err) => match &err {
                Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                Error::EventNotFound(id) => {
                    (StatusCode::NOT_FOUND, format!("Event {} not found", id))
                }
                Error::InvalidInput(_) | Error::FieldTooLong { .. } | Error::Moderation(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                Error::RateLimited => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
                Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
                Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
                _ => {
                    // Internal detail stays in the logs, not the response.
                    error!("Internal error: {}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_address_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.1".parse().unwrap(),
        );
        headers.insert("x-real-ip", "10.0.0.1".parse().unwrap());
        assert_eq!(client_address(&headers), "203.0.113.9");
    }

    #[test]
    fn test_client_address_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.9".parse().unwrap());
        assert_eq!(client_address(&headers), "203.0.113.9");
    }

    #[test]
    fn test_client_address_without_headers_is_shared_bucket() {
        assert_eq!(client_address(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_server_side_faults_map_to_500_and_client_faults_to_400() {
        use tavle_core::Error;

        let resp = ApiError::from(Error::Config("secret unset".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = ApiError::from(Error::Request("provider down".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = ApiError::from(Error::Moderation("score too low".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_submit_payload_reads_captcha_token_and_nested_contact() {
        let payload: SubmitPayload = serde_json::from_value(serde_json::json!({
            "captchaToken": "tok-123",
            "title": "Fagkveld",
            "organizerName": "Foreningen",
            "contact": {"name": "Kari", "email": "kari@example.no"}
        }))
        .unwrap();
        assert_eq!(payload.captcha_token.as_deref(), Some("tok-123"));
        assert_eq!(payload.event.title, "Fagkveld");
        assert_eq!(payload.event.organizer_name, "Foreningen");
        assert_eq!(payload.event.contact.email, "kari@example.no");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"fest\" & 'moro'</b>"),
            "&lt;b&gt;&quot;fest&quot; &amp; &#39;moro&#39;&lt;/b&gt;"
        );
    }
}
