use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tripcover_core::{
    Actor, ClaimPatch, CoverageSummary, MemberCoverage, MemberPatch, NewAttachment, NewClaim,
    NewMember, NewTrip, PaymentMeta, ReceiptOptions, ReceiptSnapshot, TripDesk, TripPatch,
};
use tripcover_shared::{
    ActorRole, ClaimId, EntryKind, MemberId, PaymentStatus, Region, TripId, TripStatus,
};
use tripcover_store::{Claim, Database, HistoryEvent, LedgerEntry, Member, Rate, Trip};

use crate::config::ServerConfig;
use crate::error::ApiError;

pub type Desk = TripDesk<Database>;

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<Mutex<Desk>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(desk: Desk, config: ServerConfig) -> Self {
        Self {
            desk: Arc::new(Mutex::new(desk)),
            config: Arc::new(config),
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/rates", get(list_rates))
        .route("/rates/:region", put(set_rate))
        .route("/quote", get(quote))
        .route("/trips", get(list_trips).post(create_trip))
        .route(
            "/trips/:trip_id",
            get(get_trip).patch(update_trip).delete(delete_trip),
        )
        .route("/trips/:trip_id/status", put(set_trip_status))
        .route("/trips/:trip_id/payment-status", put(set_payment_status))
        .route("/trips/:trip_id/members", get(list_members).post(add_member))
        .route(
            "/trips/:trip_id/members/:member_id",
            get(get_member).patch(update_member).delete(remove_member),
        )
        .route("/trips/:trip_id/members/:member_id/confirm", post(confirm_member))
        .route(
            "/trips/:trip_id/members/:member_id/guardian-approval",
            post(approve_guardian),
        )
        .route(
            "/trips/:trip_id/payments",
            get(list_payments).post(record_payment),
        )
        .route("/trips/:trip_id/balance", get(ledger_balance))
        .route("/trips/:trip_id/coverage", get(coverage))
        .route("/trips/:trip_id/coverage/allocate", post(allocate_coverage))
        .route("/trips/:trip_id/coverage/release", post(release_coverage))
        .route("/trips/:trip_id/coverage/transfer", post(transfer_coverage))
        .route("/trips/:trip_id/history", get(history))
        .route("/trips/:trip_id/receipt", get(receipt))
        .route("/trips/:trip_id/receipt/text", get(receipt_text))
        .route("/claims", get(list_claims).post(create_claim))
        .route("/claims/unseen", get(unseen_claims))
        .route("/claims/:claim_id", get(get_claim).patch(update_claim))
        .route("/claims/:claim_id/notes", post(add_claim_note))
        .route("/claims/:claim_id/messages", post(add_claim_message))
        .route("/claims/:claim_id/attachments", post(add_claim_attachment))
        .route("/claims/:claim_id/seen", post(mark_claim_seen))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Actors ───

/// Resolve the caller from `X-Actor-Role` / `X-Actor-Id`.  A missing role
/// means `LEADER`.  `ADMIN` and `SYSTEM` require the admin bearer token.
fn actor(headers: &HeaderMap, config: &ServerConfig) -> Result<Actor, ApiError> {
    let role = match headers.get("x-actor-role").and_then(|v| v.to_str().ok()) {
        Some(raw) => raw
            .parse::<ActorRole>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => ActorRole::Leader,
    };
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if role != ActorRole::Leader {
        verify_admin_token(headers, config)?;
    }
    Ok(Actor::new(role, id))
}

fn admin(headers: &HeaderMap, config: &ServerConfig) -> Result<Actor, ApiError> {
    let actor = actor(headers, config)?;
    if actor.role == ActorRole::Leader {
        return Err(ApiError::Forbidden("Admin role required".into()));
    }
    Ok(actor)
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ApiError::Forbidden(
            "Admin actions are disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        warn!("Rejected admin token");
        return Err(ApiError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct RateRequest {
    rate_cents: i64,
}

#[derive(Deserialize)]
struct QuoteQuery {
    region: Region,
    start_date: NaiveDate,
    end_date: NaiveDate,
    headcount: u32,
}

#[derive(Serialize)]
struct QuoteResponse {
    region: Region,
    rate_cents: i64,
    total_cents: i64,
}

#[derive(Deserialize)]
struct TripListQuery {
    leader_id: Option<String>,
}

#[derive(Deserialize)]
struct TripStatusRequest {
    status: TripStatus,
}

#[derive(Deserialize)]
struct PaymentStatusRequest {
    status: PaymentStatus,
}

#[derive(Deserialize)]
struct PaymentRequest {
    amount_cents: i64,
    #[serde(rename = "type", default = "default_entry_kind")]
    kind: EntryKind,
    #[serde(flatten)]
    meta: PaymentMeta,
}

fn default_entry_kind() -> EntryKind {
    EntryKind::Charge
}

#[derive(Serialize)]
struct BalanceResponse {
    trip_id: TripId,
    balance_cents: i64,
}

#[derive(Serialize)]
struct MemberStatusView {
    #[serde(flatten)]
    member: Member,
    coverage: MemberCoverage,
}

#[derive(Serialize)]
struct CoverageView {
    #[serde(flatten)]
    summary: CoverageSummary,
    unallocated_cents: i64,
    members: Vec<MemberStatusView>,
}

#[derive(Deserialize)]
struct AllocateRequest {
    member_id: MemberId,
}

#[derive(Deserialize)]
struct ReleaseRequest {
    member_id: MemberId,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct TransferRequest {
    from: MemberId,
    to: MemberId,
}

#[derive(Deserialize)]
struct ReceiptQuery {
    payer_name: Option<String>,
}

#[derive(Deserialize)]
struct ClaimListQuery {
    trip_id: Option<TripId>,
}

#[derive(Deserialize)]
struct NoteRequest {
    body: String,
}

#[derive(Deserialize)]
struct MessageRequest {
    body: String,
    #[serde(default)]
    author_name: Option<String>,
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_rates(State(state): State<AppState>) -> ApiResult<Vec<Rate>> {
    Ok(Json(state.desk.lock().await.list_rates()?))
}

async fn set_rate(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(region): Path<String>,
    Json(req): Json<RateRequest>,
) -> ApiResult<Rate> {
    let actor = admin(&headers, &state.config)?;
    let region = region
        .parse::<Region>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.set_rate(region, req.rate_cents, &actor)?))
}

async fn quote(
    State(state): State<AppState>,
    Query(q): Query<QuoteQuery>,
) -> ApiResult<QuoteResponse> {
    let desk = state.desk.lock().await;
    Ok(Json(QuoteResponse {
        region: q.region,
        rate_cents: desk.current_rate(q.region)?,
        total_cents: desk.quote(q.region, q.start_date, q.end_date, q.headcount)?,
    }))
}

async fn list_trips(
    State(state): State<AppState>,
    Query(q): Query<TripListQuery>,
) -> ApiResult<Vec<Trip>> {
    let desk = state.desk.lock().await;
    Ok(Json(desk.list_trips(q.leader_id.as_deref())?))
}

async fn create_trip(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(mut new): Json<NewTrip>,
) -> Result<(StatusCode, Json<Trip>), ApiError> {
    let actor = actor(&headers, &state.config)?;
    if new.leader_id.is_none() && actor.role == ActorRole::Leader {
        new.leader_id = actor.id.clone();
    }
    let trip = state.desk.lock().await.create_trip(new, &actor)?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn get_trip(State(state): State<AppState>, Path(trip_id): Path<TripId>) -> ApiResult<Trip> {
    Ok(Json(state.desk.lock().await.get_trip(trip_id)?))
}

async fn update_trip(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(patch): Json<TripPatch>,
) -> ApiResult<Trip> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.update_trip(trip_id, patch, &actor)?))
}

async fn delete_trip(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> Result<StatusCode, ApiError> {
    let actor = actor(&headers, &state.config)?;
    state.desk.lock().await.delete_trip(trip_id, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_trip_status(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(req): Json<TripStatusRequest>,
) -> ApiResult<Trip> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.set_trip_status(trip_id, req.status, &actor)?))
}

async fn set_payment_status(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(req): Json<PaymentStatusRequest>,
) -> ApiResult<Trip> {
    let actor = admin(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.set_payment_status(trip_id, req.status, &actor)?))
}

async fn list_members(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<Vec<Member>> {
    Ok(Json(state.desk.lock().await.list_members(trip_id)?))
}

async fn add_member(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(new): Json<NewMember>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    let actor = actor(&headers, &state.config)?;
    let member = state.desk.lock().await.add_member(trip_id, new, &actor)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn get_member(
    State(state): State<AppState>,
    Path((trip_id, member_id)): Path<(TripId, MemberId)>,
) -> ApiResult<Member> {
    Ok(Json(state.desk.lock().await.get_member(trip_id, member_id)?))
}

async fn update_member(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((trip_id, member_id)): Path<(TripId, MemberId)>,
    Json(patch): Json<MemberPatch>,
) -> ApiResult<Member> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.update_member(trip_id, member_id, patch, &actor)?))
}

async fn remove_member(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((trip_id, member_id)): Path<(TripId, MemberId)>,
) -> Result<StatusCode, ApiError> {
    let actor = actor(&headers, &state.config)?;
    state
        .desk
        .lock()
        .await
        .remove_member(trip_id, member_id, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_member(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((trip_id, member_id)): Path<(TripId, MemberId)>,
) -> ApiResult<Member> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.confirm_member(trip_id, member_id, &actor)?))
}

async fn approve_guardian(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((trip_id, member_id)): Path<(TripId, MemberId)>,
) -> ApiResult<Member> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.approve_guardian(trip_id, member_id, &actor)?))
}

async fn list_payments(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<Vec<LedgerEntry>> {
    Ok(Json(state.desk.lock().await.ledger_entries(trip_id)?))
}

/// Leaders may record charges; credits and refunds are admin-only.
async fn record_payment(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(req): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    let actor = if req.kind == EntryKind::Charge {
        actor(&headers, &state.config)?
    } else {
        admin(&headers, &state.config)?
    };
    let entry = state.desk.lock().await.record_payment(
        trip_id,
        req.amount_cents,
        req.kind,
        req.meta,
        &actor,
    )?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn ledger_balance(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<BalanceResponse> {
    let balance_cents = state.desk.lock().await.ledger_balance(trip_id)?;
    Ok(Json(BalanceResponse {
        trip_id,
        balance_cents,
    }))
}

fn coverage_view(desk: &Desk, trip_id: TripId) -> Result<CoverageView, ApiError> {
    let summary = desk.coverage_summary(trip_id)?;
    let members = desk
        .member_statuses(trip_id)?
        .into_iter()
        .map(|(member, coverage)| MemberStatusView { member, coverage })
        .collect();
    Ok(CoverageView {
        unallocated_cents: summary.unallocated_cents(),
        summary,
        members,
    })
}

async fn coverage(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<CoverageView> {
    let desk = state.desk.lock().await;
    Ok(Json(coverage_view(&desk, trip_id)?))
}

async fn allocate_coverage(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(req): Json<AllocateRequest>,
) -> ApiResult<CoverageView> {
    let actor = admin(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    desk.allocate_coverage(trip_id, req.member_id, &actor)?;
    Ok(Json(coverage_view(&desk, trip_id)?))
}

async fn release_coverage(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(req): Json<ReleaseRequest>,
) -> ApiResult<CoverageView> {
    let actor = admin(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    desk.release_coverage(trip_id, req.member_id, req.reason.as_deref(), &actor)?;
    Ok(Json(coverage_view(&desk, trip_id)?))
}

async fn transfer_coverage(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<CoverageView> {
    let actor = admin(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    desk.transfer_coverage(trip_id, req.from, req.to, &actor)?;
    Ok(Json(coverage_view(&desk, trip_id)?))
}

async fn history(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<Vec<HistoryEvent>> {
    Ok(Json(state.desk.lock().await.history(trip_id)?))
}

async fn build_receipt(
    state: &AppState,
    trip_id: TripId,
    q: ReceiptQuery,
) -> Result<ReceiptSnapshot, ApiError> {
    let opts = ReceiptOptions {
        issued_at: None,
        payer_name: q.payer_name,
    };
    Ok(state.desk.lock().await.receipt(trip_id, opts)?)
}

async fn receipt(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Query(q): Query<ReceiptQuery>,
) -> ApiResult<ReceiptSnapshot> {
    Ok(Json(build_receipt(&state, trip_id, q).await?))
}

async fn receipt_text(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Query(q): Query<ReceiptQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = build_receipt(&state, trip_id, q).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        snapshot.render(),
    ))
}

async fn list_claims(
    State(state): State<AppState>,
    Query(q): Query<ClaimListQuery>,
) -> ApiResult<Vec<Claim>> {
    Ok(Json(state.desk.lock().await.list_claims(q.trip_id)?))
}

async fn create_claim(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(new): Json<NewClaim>,
) -> Result<(StatusCode, Json<Claim>), ApiError> {
    let actor = actor(&headers, &state.config)?;
    let claim = state.desk.lock().await.create_claim(new, &actor)?;
    info!(number = %claim.claim_number, role = %actor.role, "Claim filed via API");
    Ok((StatusCode::CREATED, Json(claim)))
}

async fn unseen_claims(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<Vec<Claim>> {
    let actor = actor(&headers, &state.config)?;
    Ok(Json(state.desk.lock().await.unseen_claims(actor.role)?))
}

async fn get_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<ClaimId>,
) -> ApiResult<Claim> {
    Ok(Json(state.desk.lock().await.get_claim(claim_id)?))
}

async fn update_claim(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(claim_id): Path<ClaimId>,
    Json(patch): Json<ClaimPatch>,
) -> ApiResult<Claim> {
    let actor = actor(&headers, &state.config)?;
    if patch.status.is_some() && actor.role == ActorRole::Leader {
        return Err(ApiError::Forbidden(
            "Claim status changes are admin-only".into(),
        ));
    }
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.update_claim(claim_id, patch, &actor)?))
}

async fn add_claim_note(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(claim_id): Path<ClaimId>,
    Json(req): Json<NoteRequest>,
) -> ApiResult<Claim> {
    let actor = admin(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.add_claim_note(claim_id, &req.body, &actor)?))
}

async fn add_claim_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(claim_id): Path<ClaimId>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<Claim> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.add_claim_message(
        claim_id,
        &req.body,
        req.author_name.as_deref(),
        &actor,
    )?))
}

async fn add_claim_attachment(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(claim_id): Path<ClaimId>,
    Json(req): Json<NewAttachment>,
) -> ApiResult<Claim> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.add_claim_attachment(claim_id, req, &actor)?))
}

async fn mark_claim_seen(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(claim_id): Path<ClaimId>,
) -> ApiResult<Claim> {
    let actor = actor(&headers, &state.config)?;
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.mark_claim_seen(claim_id, actor.role)?))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
