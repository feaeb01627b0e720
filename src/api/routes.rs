//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use sqlx::PgPool;

use crate::envelope::{ClaimView, Envelope, EnvelopeActivity, EnvelopeClaim, EnvelopeDistributor};
use crate::error::AppError;
use crate::handlers::{
    AccountHandler, CreateAccountCommand, DepositCommand, EnvelopeHandler, PageQuery,
    ReceiveEnvelopeCommand, SendEnvelopeCommand,
};
use crate::ledger::{Account, AccountLogEntry};

/// Shared state of all routes
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub distributor: EnvelopeDistributor,
}

impl AppState {
    pub fn new(pool: PgPool, distributor: EnvelopeDistributor) -> Self {
        Self { pool, distributor }
    }

    fn accounts(&self) -> AccountHandler {
        AccountHandler::new(self.pool.clone())
    }

    fn envelopes(&self) -> EnvelopeHandler {
        EnvelopeHandler::new(self.distributor.clone())
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/accounts", post(create_account))
        .route("/accounts/:account_no", get(get_account))
        .route("/accounts/:account_no/logs", get(get_account_logs))
        .route("/accounts/:account_no/deposits", post(deposit))
        .route("/users/:user_id/envelope-account", get(get_envelope_account))
        // Envelopes
        .route("/envelopes", post(send_envelope))
        .route("/envelopes/receivable", get(list_receivable))
        .route("/envelopes/:envelope_no", get(get_envelope))
        .route("/envelopes/:envelope_no/claims", get(list_claims))
        .route("/envelopes/:envelope_no/receive", post(receive_envelope))
        .route("/users/:user_id/envelopes", get(list_sent))
        .route("/users/:user_id/claims", get(list_received))
}

// =========================================================================
// Accounts
// =========================================================================

async fn create_account(
    State(state): State<AppState>,
    Json(command): Json<CreateAccountCommand>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = state.accounts().create(command).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    State(state): State<AppState>,
    Path(account_no): Path<String>,
) -> Result<Json<Account>, AppError> {
    Ok(Json(state.accounts().get(&account_no).await?))
}

async fn get_account_logs(
    State(state): State<AppState>,
    Path(account_no): Path<String>,
) -> Result<Json<Vec<AccountLogEntry>>, AppError> {
    Ok(Json(state.accounts().logs(&account_no).await?))
}

async fn deposit(
    State(state): State<AppState>,
    Path(account_no): Path<String>,
    Json(command): Json<DepositCommand>,
) -> Result<(StatusCode, Json<AccountLogEntry>), AppError> {
    let entry = state.accounts().deposit(&account_no, command).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_envelope_account(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Account>, AppError> {
    Ok(Json(state.accounts().envelope_account(&user_id).await?))
}

// =========================================================================
// Envelopes
// =========================================================================

async fn send_envelope(
    State(state): State<AppState>,
    Json(command): Json<SendEnvelopeCommand>,
) -> Result<(StatusCode, Json<EnvelopeActivity>), AppError> {
    let activity = state.envelopes().send(command).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn receive_envelope(
    State(state): State<AppState>,
    Path(envelope_no): Path<String>,
    Json(command): Json<ReceiveEnvelopeCommand>,
) -> Result<(StatusCode, Json<EnvelopeClaim>), AppError> {
    let claim = state.envelopes().receive(&envelope_no, command).await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

async fn get_envelope(
    State(state): State<AppState>,
    Path(envelope_no): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    Ok(Json(state.envelopes().get(&envelope_no).await?))
}

async fn list_claims(
    State(state): State<AppState>,
    Path(envelope_no): Path<String>,
) -> Result<Json<Vec<ClaimView>>, AppError> {
    Ok(Json(state.envelopes().claims(&envelope_no).await?))
}

async fn list_sent(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Envelope>>, AppError> {
    Ok(Json(state.envelopes().list_sent(&user_id, query).await?))
}

async fn list_received(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<EnvelopeClaim>>, AppError> {
    Ok(Json(state.envelopes().list_received(&user_id, query).await?))
}

async fn list_receivable(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Envelope>>, AppError> {
    Ok(Json(state.envelopes().list_receivable(query).await?))
}
