//! # HTTP + JSON-RPC API
//!
//! Builds the axum router that exposes the node's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path      | Description          |
//! |--------|-----------|----------------------|
//! | GET    | `/health` | Liveness probe       |
//! | GET    | `/status` | Node status summary  |
//! | POST   | `/rpc`    | JSON-RPC 2.0 gateway |
//!
//! ## JSON-RPC methods
//!
//! Caller identity is a parameter (`from`); the node is a devnet host and
//! authenticates nothing. Amounts are decimal strings in both directions;
//! small amounts may also be sent as plain integers.
//!
//! Read-only methods give up after the configured timeout. Mutating methods
//! always report their real outcome, however long they waited for a lock.
//!
//! | Method                    | Params                      |
//! |---------------------------|-----------------------------|
//! | `hub_createProject`       | `{from, goal, duration}`    |
//! | `hub_getAllProjects`      | none                        |
//! | `hub_countOfProjects`     | none                        |
//! | `project_fund`            | `{project, from, value}`    |
//! | `project_withdraw`        | `{project, from}`           |
//! | `project_completeDetails` | `{project}`                 |
//! | `project_contributionOf`  | `{project, contributor}`    |
//! | `ledger_getBalance`       | `{address}`                 |
//! | `ledger_faucet`           | `{address, amount}`         |

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use fundhub_contracts::{ContractError, FundingHub, Project};
use fundhub_protocol::config::MAX_FAUCET_AMOUNT;
use fundhub_protocol::transfer::amount_string;
use fundhub_protocol::{Address, Amount, InMemoryLedger, ValueTransfer};

use crate::metrics::SharedMetrics;
use crate::state::MutationGate;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
const PROJECT_NOT_FOUND: i32 = -32001;
const INVALID_ARGUMENT: i32 = -32010;
const FUNDING_REJECTED: i32 = -32011;
const WITHDRAWAL_REJECTED: i32 = -32012;
const TRANSFER_FAILED: i32 = -32013;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The hub served by this node.
    pub hub: Arc<FundingHub>,
    /// The ledger the hub moves value through.
    pub ledger: Arc<InMemoryLedger>,
    /// Held shared by every mutating call so snapshots see a quiet node.
    pub gate: MutationGate,
    /// Budget for read-only calls.
    pub rpc_timeout: Duration,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// When the node started.
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Named method parameters.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: Value,
}

impl JsonRpcResponse {
    fn from_result(id: Value, result: Result<Value, JsonRpcError>) -> Self {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: "2.0".into(),
            result,
            error,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<ContractError> for JsonRpcError {
    fn from(err: ContractError) -> Self {
        let code = match &err {
            ContractError::InvalidArgument(_) => INVALID_ARGUMENT,
            ContractError::FundingRejected(_) => FUNDING_REJECTED,
            ContractError::WithdrawalRejected(_) => WITHDRAWAL_REJECTED,
            ContractError::Transfer(_) => TRANSFER_FAILED,
        };
        Self {
            code,
            message: err.to_string(),
            data: Some(json!({ "kind": err.kind() })),
        }
    }
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateProjectParams {
    from: Address,
    #[serde(with = "amount_string")]
    goal: Amount,
    duration: u64,
}

#[derive(Debug, Deserialize)]
struct FundParams {
    project: Address,
    from: Address,
    #[serde(with = "amount_string")]
    value: Amount,
}

#[derive(Debug, Deserialize)]
struct WithdrawParams {
    project: Address,
    from: Address,
}

#[derive(Debug, Deserialize)]
struct ProjectParams {
    project: Address,
}

#[derive(Debug, Deserialize)]
struct ContributionParams {
    project: Address,
    contributor: Address,
}

#[derive(Debug, Deserialize)]
struct BalanceParams {
    address: Address,
}

#[derive(Debug, Deserialize)]
struct FaucetParams {
    address: Address,
    #[serde(with = "amount_string")]
    amount: Amount,
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Address of the hub served by this node.
    pub hub: Address,
    /// Projects created so far.
    pub project_count: usize,
    /// Sum of all ledger balances.
    #[serde(with = "amount_string")]
    pub total_supply: Amount,
    /// Seconds since the node started.
    pub uptime_secs: i64,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` - returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status` - node status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    Json(StatusResponse {
        version: state.version.clone(),
        hub: state.hub.address(),
        project_count: state.hub.count_of_projects(),
        total_supply: state.ledger.total_supply(),
        uptime_secs: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    })
}

/// `POST /rpc` - JSON-RPC 2.0 gateway.
///
/// Contract calls may wait on a project lock, so they run on the blocking
/// pool. Only read-only calls are bounded by `rpc_timeout`: a mutating call
/// that outlived its caller's patience would still commit.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::from_result(
            req.id,
            Err(JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
        ));
    }

    let started = Instant::now();
    let method = req.method;
    let params = req.params;
    let call_state = state.clone();
    let call_method = method.clone();
    let call = tokio::task::spawn_blocking(move || dispatch(&call_state, &call_method, params));
    let joined = if is_mutating(&method) {
        Ok(call.await)
    } else {
        tokio::time::timeout(state.rpc_timeout, call).await
    };

    let result = match joined {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            tracing::error!(method = %method, error = %join_error, "rpc call panicked");
            Err(JsonRpcError::new(INTERNAL_ERROR, "Internal error"))
        }
        Err(_) => {
            tracing::warn!(method = %method, "rpc call timed out");
            Err(JsonRpcError::new(INTERNAL_ERROR, "Internal error: call timed out"))
        }
    };

    let label = if is_known_method(&method) {
        method.as_str()
    } else {
        "unknown"
    };
    state
        .metrics
        .rpc_latency_seconds
        .with_label_values(&[label])
        .observe(started.elapsed().as_secs_f64());

    Json(JsonRpcResponse::from_result(req.id, result))
}

const METHODS: &[&str] = &[
    "hub_createProject",
    "hub_getAllProjects",
    "hub_countOfProjects",
    "project_fund",
    "project_withdraw",
    "project_completeDetails",
    "project_contributionOf",
    "ledger_getBalance",
    "ledger_faucet",
];

fn is_known_method(method: &str) -> bool {
    METHODS.contains(&method)
}

fn is_mutating(method: &str) -> bool {
    matches!(
        method,
        "hub_createProject" | "project_fund" | "project_withdraw" | "ledger_faucet"
    )
}

/// Routes one JSON-RPC call to the hub, a project, or the ledger.
fn dispatch(state: &AppState, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
    let _gate = is_mutating(method).then(|| state.gate.enter());
    match method {
        "hub_createProject" => {
            let p: CreateProjectParams = parse_params(params)?;
            let project = state
                .hub
                .create_project(p.from, p.goal, p.duration)
                .map_err(|e| contract_error(state, e))?;
            state.metrics.projects_created_total.inc();
            state
                .metrics
                .projects_registered
                .set(state.hub.count_of_projects() as i64);
            Ok(json!(project.address()))
        }
        "hub_getAllProjects" => Ok(json!(state.hub.get_all_projects())),
        "hub_countOfProjects" => Ok(json!(state.hub.count_of_projects())),
        "project_fund" => {
            let p: FundParams = parse_params(params)?;
            let project = find_project(state, &p.project)?;
            let outcome = project
                .fund(p.from, p.value)
                .map_err(|e| contract_error(state, e))?;
            state.metrics.contributions_total.inc();
            if outcome.paid_out() {
                state.metrics.payouts_total.inc();
            }
            Ok(to_value(&outcome))
        }
        "project_withdraw" => {
            let p: WithdrawParams = parse_params(params)?;
            let project = find_project(state, &p.project)?;
            let refunded = project
                .withdraw(p.from)
                .map_err(|e| contract_error(state, e))?;
            state.metrics.refunds_total.inc();
            Ok(amount_value(refunded))
        }
        "project_completeDetails" => {
            let p: ProjectParams = parse_params(params)?;
            let project = find_project(state, &p.project)?;
            Ok(to_value(&project.complete_details()))
        }
        "project_contributionOf" => {
            let p: ContributionParams = parse_params(params)?;
            let project = find_project(state, &p.project)?;
            Ok(amount_value(project.contribution_of(&p.contributor)))
        }
        "ledger_getBalance" => {
            let p: BalanceParams = parse_params(params)?;
            Ok(amount_value(state.ledger.balance_of(&p.address)))
        }
        "ledger_faucet" => {
            let p: FaucetParams = parse_params(params)?;
            if p.amount > MAX_FAUCET_AMOUNT {
                return Err(JsonRpcError::new(
                    INVALID_PARAMS,
                    format!("Invalid params: faucet amount exceeds {MAX_FAUCET_AMOUNT}"),
                ));
            }
            // Escrow accounts only ever hold what their project raised.
            if state.hub.project(&p.address).is_some() {
                return Err(JsonRpcError::new(
                    INVALID_PARAMS,
                    format!("Invalid params: {} is a project escrow", p.address),
                ));
            }
            let balance = state
                .ledger
                .mint(&p.address, p.amount)
                .map_err(|e| contract_error(state, e.into()))?;
            Ok(amount_value(balance))
        }
        other => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        )),
    }
}

fn find_project(state: &AppState, address: &Address) -> Result<Arc<Project>, JsonRpcError> {
    state.hub.project(address).ok_or_else(|| {
        JsonRpcError::new(PROJECT_NOT_FOUND, format!("Project not found: {address}"))
    })
}

fn contract_error(state: &AppState, err: ContractError) -> JsonRpcError {
    state.metrics.record_rejection(err.kind());
    err.into()
}

fn amount_value(amount: Amount) -> Value {
    Value::String(amount.to_string())
}

fn to_value<T: Serialize>(value: &T) -> Value {
    // Only called with types whose serialization cannot fail.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
