// Router HTTP API implementation
// This file provides HTTP endpoints for trade execution, module
// administration, balance queries and monitoring
//

use crate::bootstrap::Deployment;
use crate::control::ReplayGuard;
use crate::errors::{AuthError, RouterError};
use crate::metrics;
use crate::router::execution::ExecutionStats;
use crate::router::registry::ModuleInfo;
use crate::router::routes::{TradeReceipt, TradeRequest};
use crate::signing::{verify_request, RequestStamp};
use crate::state::{Address, Asset};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router as AxumRouter,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const PUBLIC_KEY_HEADER: &str = "x-public-key";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const NONCE_HEADER: &str = "x-nonce";
pub const EXPIRES_AT_HEADER: &str = "x-expires-at";

/// Shared service state. Calls against the deployment are serialized.
pub struct ServiceState {
    deployment: Mutex<Deployment>,
    replay: ReplayGuard,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteTradesRequest {
    pub request: TradeRequest,
    /// Native currency attached to the call.
    #[serde(default)]
    pub value: u128,
}

#[derive(Debug, Serialize)]
pub struct ExecuteTradesResponse {
    pub caller: Address,
    pub receipt: TradeReceipt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleAction {
    Register,
    Unregister,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModuleActionRequest {
    pub action: ModuleAction,
}

#[derive(Debug, Serialize)]
pub struct ModuleActionResponse {
    pub module: Address,
    pub action: ModuleAction,
    /// `false` when the registry already was in the requested state.
    pub changed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RescueRequest {
    pub asset: Asset,
    pub amount: u128,
    pub recipient: Address,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub holder: Address,
    pub balances: BTreeMap<Asset, u128>,
}

/// Create the HTTP router with API endpoints
pub fn create_api_router(deployment: Deployment) -> AxumRouter {
    let state = Arc::new(ServiceState {
        deployment: Mutex::new(deployment),
        replay: ReplayGuard::default(),
    });
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .route("/api/v1/modules", get(list_modules))
        .route("/api/v1/balances/:holder", get(get_balances))
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/trades", post(execute_trades))
        .route("/api/v1/admin/modules/:address", post(update_module))
        .route("/api/v1/admin/rescue", post(rescue_funds))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn render_metrics() -> String {
    metrics::render()
}

async fn list_modules(State(state): State<Arc<ServiceState>>) -> Json<Vec<ModuleInfo>> {
    let deployment = state.deployment.lock().await;
    Json(deployment.registry.authorized_modules())
}

async fn get_balances(
    State(state): State<Arc<ServiceState>>,
    Path(holder): Path<String>,
) -> Result<Json<BalancesResponse>, ApiError> {
    let holder: Address = holder
        .parse()
        .map_err(|e: crate::errors::LedgerError| bad_request(e.to_string()))?;
    let deployment = state.deployment.lock().await;
    Ok(Json(BalancesResponse {
        holder,
        balances: deployment.ledger.holdings(holder),
    }))
}

async fn get_stats(State(state): State<Arc<ServiceState>>) -> Json<ExecutionStats> {
    let deployment = state.deployment.lock().await;
    Json(deployment.router.stats())
}

/// Execute a signed trade batch; the signer is the caller.
async fn execute_trades(
    State(state): State<Arc<ServiceState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ExecuteTradesResponse>, ApiError> {
    let caller = authenticate(&state, &headers, &body)?;
    let req: ExecuteTradesRequest = parse_body(&body)?;

    let mut guard = state.deployment.lock().await;
    let deployment = &mut *guard;
    let router = deployment.router.clone();
    let receipt = router
        .execute_trades(&mut deployment.ledger, caller, req.value, &req.request)
        .map_err(router_error)?;

    Ok(Json(ExecuteTradesResponse { caller, receipt }))
}

/// Register or unregister a deployed module. Administrator only.
async fn update_module(
    State(state): State<Arc<ServiceState>>,
    Path(address): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ModuleActionResponse>, ApiError> {
    let caller = authenticate(&state, &headers, &body)?;
    let module: Address = address
        .parse()
        .map_err(|e: crate::errors::LedgerError| bad_request(e.to_string()))?;
    let req: ModuleActionRequest = parse_body(&body)?;

    let deployment = state.deployment.lock().await;
    let changed = match req.action {
        ModuleAction::Register => {
            let deployed = deployment.deployed_module(module).ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse {
                        error: format!("no module deployed at {module}"),
                        kind: "not_found".to_string(),
                    }),
                )
            })?;
            deployment
                .registry
                .register_swap_module(caller, deployed)
                .map_err(router_error)?
        }
        ModuleAction::Unregister => deployment
            .registry
            .unregister_swap_module(caller, module)
            .map_err(router_error)?,
    };

    info!(module = %module, action = ?req.action, changed, "module registry updated via API");
    Ok(Json(ModuleActionResponse {
        module,
        action: req.action,
        changed,
    }))
}

/// Move a stranded custody balance. Administrator only.
async fn rescue_funds(
    State(state): State<Arc<ServiceState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = authenticate(&state, &headers, &body)?;
    let req: RescueRequest = parse_body(&body)?;

    let mut guard = state.deployment.lock().await;
    let deployment = &mut *guard;
    let router = deployment.router.clone();
    router
        .rescue_funds(
            &mut deployment.ledger,
            caller,
            req.asset,
            req.amount,
            req.recipient,
        )
        .map_err(router_error)?;

    Ok(Json(serde_json::json!({
        "asset": req.asset,
        "amount": req.amount.to_string(),
        "recipient": req.recipient,
    })))
}

/// Verify the signature over body and stamp, then consume the stamp's nonce.
fn authenticate(
    state: &ServiceState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Address, ApiError> {
    verify_signed(state, headers, body).map_err(|err| {
        warn!(error = %err, "request authentication failed");
        let (status, kind) = match err {
            AuthError::Replayed { .. } => (StatusCode::CONFLICT, "replayed"),
            _ => (StatusCode::UNAUTHORIZED, "authentication"),
        };
        (
            status,
            Json(ErrorResponse {
                error: err.to_string(),
                kind: kind.to_string(),
            }),
        )
    })
}

fn verify_signed(
    state: &ServiceState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Address, AuthError> {
    let header = |name: &'static str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingHeader(name))
    };
    let number = |name: &'static str| {
        header(name)?
            .parse::<u64>()
            .map_err(|e| AuthError::BadStamp(format!("{name}: {e}")))
    };
    let stamp = RequestStamp::new(number(NONCE_HEADER)?, number(EXPIRES_AT_HEADER)?);
    let caller = verify_request(
        body,
        stamp,
        header(PUBLIC_KEY_HEADER)?,
        header(SIGNATURE_HEADER)?,
    )?;
    state.replay.admit(caller, stamp, unix_now())?;
    Ok(caller)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid request body: {e}")))
}

fn bad_request(error: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error,
            kind: "bad_request".to_string(),
        }),
    )
}

fn router_error(err: RouterError) -> ApiError {
    let status = match &err {
        RouterError::Unauthorized { .. } | RouterError::UnauthorizedModule(_) => {
            StatusCode::FORBIDDEN
        }
        RouterError::InvalidParameters(_) | RouterError::Overflow => StatusCode::BAD_REQUEST,
        RouterError::InsufficientOutput { .. }
        | RouterError::Ledger(_)
        | RouterError::Module { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RouterError::Reentrancy | RouterError::AlreadyInitialized => StatusCode::CONFLICT,
        RouterError::NotInitialized(_) => StatusCode::SERVICE_UNAVAILABLE,
        RouterError::ResidualBalance { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }),
    )
}
