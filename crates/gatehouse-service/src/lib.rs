//! REST surface for the gatehouse policy evaluation service.
//!
//! Handlers are thin plumbing around [`gatehouse_core`]: the store supplies
//! policies in evaluation order, the engine produces the decision, and this
//! crate only decodes requests and maps errors onto HTTP statuses.

#![deny(unsafe_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gatehouse_core::{
    evaluate, Criteria, CustomFields, EvalError, Policy, PolicyStore, PolicyStoreConfig,
    StoreError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub policy_store: PolicyStoreConfig,
}

#[derive(Clone)]
pub struct ServiceState {
    pub store: Arc<PolicyStore>,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, StoreError> {
        let store = PolicyStore::bootstrap(config.policy_store).await?;
        Ok(Self {
            store: Arc::new(store),
        })
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/policies", get(list_policies).post(save_policy))
        .route("/v1/decisions", post(decide))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Http { status, message } => (status, message),
            ApiError::Eval(err) => {
                let status = match err {
                    // Nothing is configured to decide against; resubmitting
                    // the same request cannot help until a policy exists.
                    EvalError::NoPolicies => StatusCode::CONFLICT,
                    EvalError::MissingField(_) | EvalError::UnknownField(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                };
                (status, err.to_string())
            }
            ApiError::Store(err) => {
                error!("store failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    store_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "gatehouse-service",
        store_backend: state.store.backend_label(),
    })
}

/// Wire shape for policy upserts. `id` and `criteria` arrive as strings and
/// are validated here, at the decode boundary, so the core types only ever
/// hold a parsed [`Uuid`] and a recognized operator.
#[derive(Debug, Clone, Deserialize)]
pub struct SavePolicyRequest {
    pub id: String,
    pub name: String,
    pub criteria: String,
    pub value: i64,
    pub success_case: bool,
    pub priority: i32,
}

impl SavePolicyRequest {
    fn into_policy(self) -> Result<Policy, ApiError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|_| ApiError::bad_request(format!("id '{}' is not a valid UUID", self.id)))?;
        let criteria = self
            .criteria
            .parse::<Criteria>()
            .map_err(|err| ApiError::bad_request(err.to_string()))?;

        Ok(Policy {
            id,
            name: self.name,
            criteria,
            value: self.value,
            success_case: self.success_case,
            priority: self.priority,
        })
    }
}

async fn save_policy(
    State(state): State<ServiceState>,
    Json(request): Json<SavePolicyRequest>,
) -> Result<Json<Policy>, ApiError> {
    let policy = request.into_policy()?;
    state.store.save(policy.clone()).await?;
    info!(id = %policy.id, name = %policy.name, priority = policy.priority, "policy saved");
    Ok(Json(policy))
}

#[derive(Debug, Clone, Serialize)]
struct PolicyListResponse {
    total: usize,
    items: Vec<Policy>,
}

async fn list_policies(
    State(state): State<ServiceState>,
) -> Result<Json<PolicyListResponse>, ApiError> {
    let policies = state.store.policies().await?;
    Ok(Json(PolicyListResponse {
        total: policies.len(),
        items: policies.as_slice().to_vec(),
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub custom_fields: CustomFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionResponse {
    pub decision: bool,
}

async fn decide(
    State(state): State<ServiceState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let policies = state.store.policies().await?;
    let decision = evaluate(&policies, &request.custom_fields)?;
    info!(decision, policies = policies.len(), "decision evaluated");
    Ok(Json(DecisionResponse { decision }))
}
