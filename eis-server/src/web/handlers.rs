//! Route handlers.
//!
//! Every protected handler takes a [`CurrentUser`] and runs
//! [`UserContext::authorize`] before touching the store. Store work runs on
//! the blocking pool through [`Store::run`].

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{
        header::{HeaderName, USER_AGENT},
        HeaderMap,
    },
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{
    verify_password, AccessFilter, CurrentUser, FacilityScope, PermissionCode, RoleCode,
    SessionInput, UserContext,
};
use crate::error::{EisError, FieldError, Result};
use crate::store::{
    record_detached, AuditAction, AuditEntry, CategorySummary, IngestOutcome, IngestSummary,
    IngestionLog, Puskesmas, ScreeningRow, Store, UserRecord, UserSummary,
};
use crate::web::cookies::{clear_refresh_cookie, clear_session_cookie, refresh_cookie, session_cookie};
use crate::web::AppState;
use crate::webhook::{read_body, FacilityRef, ScreeningPayload, SCREENING_EVENT};

const DEFAULT_LOG_LIMIT: u32 = 50;
const MAX_LOG_LIMIT: u32 = 200;

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Request helpers
// =============================================================================

/// Client address from the first `X-Forwarded-For` hop, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &'static str| {
        headers
            .get(HeaderName::from_static(name))
            .and_then(|v| v.to_str().ok())
    };

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .or_else(|| header("x-real-ip"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| EisError::invalid("body", e.body_text()))
}

fn query_params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query
        .map(|Query(params)| params)
        .map_err(|e| EisError::invalid("query", e.body_text()))
}

/// Month and year from the query, defaulting to the current period.
fn period(month: Option<u32>, year: Option<i32>) -> Result<(u32, i32)> {
    let now = Utc::now();
    let month = month.unwrap_or_else(|| now.month());
    let year = year.unwrap_or_else(|| now.year());

    if !(1..=12).contains(&month) {
        return Err(EisError::invalid("month", "must be between 1 and 12"));
    }
    Ok((month, year))
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The caller as the dashboard sees it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    pub role_code: RoleCode,
    pub puskesmas_id: Option<String>,
    pub wilayah_id: Option<String>,
    pub permissions: Vec<PermissionCode>,
}

impl From<&UserContext> for SessionUser {
    fn from(ctx: &UserContext) -> Self {
        Self {
            user_id: ctx.user_id.clone(),
            email: ctx.email.clone(),
            role_code: ctx.role_code,
            puskesmas_id: ctx.puskesmas_id.clone(),
            wilayah_id: ctx.wilayah_id.clone(),
            permissions: PermissionCode::ALL
                .into_iter()
                .filter(|p| ctx.has_permission(*p))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: SessionUser,
}

/// Issue a session and refresh credential pair and set both cookies.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &UserRecord,
) -> Result<(CookieJar, SessionResponse)> {
    let (token, claims) = state.tokens.issue_session(SessionInput {
        user_id: user.id.clone(),
        email: user.email.clone(),
        role_code: user.role_code,
        puskesmas_id: user.puskesmas_id.clone(),
        wilayah_id: user.wilayah_id.clone(),
    })?;
    let refresh_token = state.tokens.issue_refresh(&user.id)?;

    let secure = state.config.is_production();
    let jar = jar
        .add(session_cookie(&state.config.auth_cookie_name, &token, secure))
        .add(refresh_cookie(
            &state.config.refresh_cookie_name,
            &refresh_token,
            secure,
        ));

    let ctx = UserContext::from_claims(&claims);
    Ok((
        jar,
        SessionResponse {
            success: true,
            token,
            refresh_token,
            expires_at: claims.exp,
            user: SessionUser::from(&ctx),
        },
    ))
}

/// Email and password login.
///
/// Unknown email, wrong password and inactive account all answer with the
/// same 401.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let request = json_body(payload)?;

    let mut errors = Vec::new();
    if request.email.trim().is_empty() {
        errors.push(FieldError::new("email", "is required"));
    }
    if request.password.is_empty() {
        errors.push(FieldError::new("password", "is required"));
    }
    if !errors.is_empty() {
        return Err(EisError::Validation(errors));
    }

    let LoginRequest { email, password } = request;
    let user = state
        .store
        .run(move |store| {
            let Some(user) = store.find_user_by_email(&email)? else {
                return Ok(None);
            };
            if !user.is_active || !verify_password(&password, &user.password_hash)? {
                return Ok(None);
            }
            store.touch_last_login(&user.id)?;
            Ok(Some(user))
        })
        .await?;

    let Some(user) = user else {
        warn!(ip = ?client_ip(&headers), "login_failed");
        return Err(EisError::Unauthenticated);
    };

    let (jar, response) = start_session(&state, jar, &user)?;

    info!(user_id = %user.id, role = %user.role_code, "login_succeeded");
    record_detached(
        &state.store,
        AuditEntry::new(&user.id, AuditAction::Login)
            .resource("session", None)
            .details(json!({ "roleCode": user.role_code }))
            .client(client_ip(&headers), user_agent(&headers)),
    );

    Ok((jar, Json(response)))
}

/// Clear the session cookies. Succeeds with or without a valid session.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    user: Option<CurrentUser>,
) -> (CookieJar, Json<serde_json::Value>) {
    if let Some(CurrentUser(ctx)) = user {
        info!(user_id = %ctx.user_id, "logout");
        record_detached(
            &state.store,
            AuditEntry::new(&ctx.user_id, AuditAction::Logout)
                .resource("session", None)
                .client(client_ip(&headers), user_agent(&headers)),
        );
    }

    let jar = jar
        .add(clear_session_cookie(&state.config.auth_cookie_name))
        .add(clear_refresh_cookie(&state.config.refresh_cookie_name));

    (jar, Json(json!({ "success": true })))
}

/// Trade a refresh credential for a new session. The refresh credential is
/// rotated as well.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let token = payload
        .and_then(|Json(body)| body.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            jar.get(&state.config.refresh_cookie_name)
                .map(|c| c.value().to_string())
        })
        .ok_or(EisError::Unauthenticated)?;

    let claims = state.tokens.verify_refresh(&token).ok_or_else(|| {
        warn!("refresh_token_invalid");
        EisError::Unauthenticated
    })?;

    let user_id = claims.sub;
    let user = state
        .store
        .run(move |store| Ok(store.find_user_by_id(&user_id)?))
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            warn!("refresh_user_unavailable");
            EisError::Unauthenticated
        })?;

    let (jar, response) = start_session(&state, jar, &user)?;

    info!(user_id = %user.id, "session_refreshed");
    record_detached(
        &state.store,
        AuditEntry::new(&user.id, AuditAction::RefreshToken)
            .resource("session", None)
            .client(client_ip(&headers), user_agent(&headers)),
    );

    Ok((jar, Json(response)))
}

/// The authenticated caller.
pub async fn me(CurrentUser(ctx): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "user": SessionUser::from(&ctx) }))
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub puskesmas_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub success: bool,
    pub month: u32,
    pub year: i32,
    pub scope: AccessFilter,
    pub categories: Vec<CategorySummary>,
}

/// Aggregated screening figures for the caller's scope, optionally narrowed
/// to one puskesmas.
pub async fn dashboard_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentUser(ctx): CurrentUser,
    query: std::result::Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<SummaryResponse>> {
    let query = query_params(query)?;
    let (month, year) = period(query.month, query.year)?;

    let resolved = ctx.authorize(
        PermissionCode::ViewDashboard,
        FacilityScope::Required(query.puskesmas_id),
    )?;
    let filter = match &resolved {
        Some(id) => AccessFilter::for_puskesmas(id.clone()),
        None => ctx.filter_by_access()?,
    };

    let scope = filter.clone();
    let categories = state
        .store
        .run(move |store| Ok(store.screening_summary(&filter, month, year)?))
        .await?;

    record_detached(
        &state.store,
        AuditEntry::new(&ctx.user_id, AuditAction::ViewDashboard)
            .resource("dashboard", resolved)
            .details(json!({ "month": month, "year": year }))
            .client(client_ip(&headers), user_agent(&headers)),
    );

    Ok(Json(SummaryResponse {
        success: true,
        month,
        year,
        scope,
        categories,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailResponse {
    pub success: bool,
    pub puskesmas: Puskesmas,
    pub rows: Vec<ScreeningRow>,
}

/// Facility-level screening rows.
pub async fn puskesmas_screening(
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentUser(ctx): CurrentUser,
    Path(puskesmas_id): Path<String>,
    query: std::result::Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<DetailResponse>> {
    let query = query_params(query)?;
    if let Some(month) = query.month {
        if !(1..=12).contains(&month) {
            return Err(EisError::invalid("month", "must be between 1 and 12"));
        }
    }

    ctx.authorize(PermissionCode::ViewOwnPuskesmas, FacilityScope::NotRequired)?;
    if !ctx.can_view_detail(Some(&puskesmas_id)) {
        warn!(user_id = %ctx.user_id, puskesmas_id = %puskesmas_id, "detail_access_denied");
        return Err(EisError::forbidden("puskesmas outside your scope"));
    }

    let id = puskesmas_id.clone();
    let (puskesmas, rows) = state
        .store
        .run(move |store| {
            let puskesmas = store
                .find_puskesmas(&FacilityRef::Id(id.clone()))?
                .ok_or_else(|| EisError::NotFound(format!("puskesmas {}", id)))?;
            let rows =
                store.screening_rows(&AccessFilter::for_puskesmas(id), query.month, query.year)?;
            Ok((puskesmas, rows))
        })
        .await?;

    record_detached(
        &state.store,
        AuditEntry::new(&ctx.user_id, AuditAction::ViewDetail)
            .resource("puskesmas", Some(puskesmas_id))
            .details(json!({ "month": query.month, "year": query.year, "rows": rows.len() }))
            .client(client_ip(&headers), user_agent(&headers)),
    );

    Ok(Json(DetailResponse {
        success: true,
        puskesmas,
        rows,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<u32>,
}

/// Recent webhook deliveries within the caller's scope.
pub async fn ingestion_logs(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    query: std::result::Result<Query<LogQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>> {
    let query = query_params(query)?;
    ctx.authorize(PermissionCode::SyncData, FacilityScope::NotRequired)?;

    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let filter = ctx.filter_by_access()?;
    let logs: Vec<IngestionLog> = state
        .store
        .run(move |store| Ok(store.list_ingestion_logs(&filter, limit)?))
        .await?;

    Ok(Json(json!({ "success": true, "logs": logs })))
}

/// Accounts the caller may manage: same scope, same or lower rank.
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<Json<serde_json::Value>> {
    ctx.authorize(PermissionCode::ManageUsers, FacilityScope::Required(None))?;

    let filter = ctx.filter_by_access()?;
    let min_rank = ctx.role_code.rank();
    let users: Vec<UserSummary> = state
        .store
        .run(move |store| Ok(store.list_users(&filter, min_rank)?))
        .await?;

    Ok(Json(json!({ "success": true, "users": users })))
}

// =============================================================================
// SIMPUS Webhook
// =============================================================================

/// Webhook response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub duplicate: bool,
    pub ingestion_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<IngestSummary>,
}

impl From<IngestOutcome> for WebhookResponse {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Applied {
                ingestion_id,
                summary,
            } => WebhookResponse {
                success: true,
                duplicate: false,
                ingestion_id,
                summary: Some(summary),
            },
            IngestOutcome::Duplicate { ingestion_id } => WebhookResponse {
                success: true,
                duplicate: true,
                ingestion_id,
                summary: None,
            },
        }
    }
}

fn resolve_facility(store: &Store, facility: &FacilityRef) -> Result<Puskesmas> {
    store.find_puskesmas(facility)?.ok_or_else(|| {
        warn!(facility = ?facility, "webhook_unknown_puskesmas");
        EisError::invalid(facility.field(), "unknown puskesmas")
    })
}

/// Monthly screening webhook from SIMPUS.
///
/// This endpoint:
/// 1. Decodes the body (gzip allowed)
/// 2. Verifies the HMAC signature and replay window
/// 3. Validates the payload
/// 4. Applies it at most once per batch
pub async fn screening_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    info!(body_length = body.len(), "simpus_webhook_received");

    let raw = read_body(&headers, &body)?;
    state
        .webhook
        .verify(&headers, &raw, Utc::now().timestamp())?;

    let batch = ScreeningPayload::parse(&raw)?.validate()?;
    let raw_json = String::from_utf8_lossy(&raw).into_owned();

    let outcome = state
        .store
        .run(move |store| {
            let puskesmas = resolve_facility(store, &batch.facility)?;
            Ok(store.ingest_screening(SCREENING_EVENT, &puskesmas.id, &batch, &raw_json)?)
        })
        .await?;

    Ok(Json(outcome.into()))
}
