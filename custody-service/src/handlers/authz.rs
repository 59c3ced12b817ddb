//! Access decision preview.
//!
//! Evaluates the policy for the caller without performing the action, so
//! nothing is written to the audit trail.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    middleware::AuthIdentity,
    models::{AccessAction, ResourceRef},
    services::{AuthorizationPolicy, Decision},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    pub action: AccessAction,
    pub resource: ResourceRef,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EvaluateResponse {
    pub permitted: bool,
    #[schema(value_type = Object)]
    pub decision: Decision,
}

/// Preview the access decision for the current identity
#[utoipa::path(
    post,
    path = "/authz/evaluate",
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Decision", body = EvaluateResponse),
        (status = 401, description = "No session", body = ErrorResponse)
    ),
    tag = "Authorization"
)]
pub async fn evaluate(
    AuthIdentity(identity): AuthIdentity,
    Json(req): Json<EvaluateRequest>,
) -> Json<EvaluateResponse> {
    let decision = AuthorizationPolicy::evaluate(Some(&identity), req.action, &req.resource);
    Json(EvaluateResponse {
        permitted: decision.is_permitted(),
        decision,
    })
}
