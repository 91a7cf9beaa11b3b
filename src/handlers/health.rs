use axum::Json;
use serde_json::{Value, json};

use crate::auth::extractors::OptionalAuthUser;

/// Liveness probe. Reports whether the caller's bearer token (if any)
/// resolved, without ever rejecting the request.
pub async fn health(OptionalAuthUser(user): OptionalAuthUser) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "authenticated": user.is_some(),
    }))
}
