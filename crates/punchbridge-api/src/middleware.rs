use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use punchbridge_types::api::ErrorResponse;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::state::AppState;

/// Reject requests whose Authorization header is not exactly
/// `Bearer <admin token>`.
pub async fn require_admin_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| tokens_match(token, &state.admin_token));

    if !authorized {
        warn!(path = %req.uri().path(), "rejected admin request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        )
            .into_response();
    }

    next.run(req).await
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
