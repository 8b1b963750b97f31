//! Auth API endpoints.

use crate::auth::middleware::{check_rate_limit, AppState, Authenticated};
use crate::error::AppError;
use crate::models::{LoginRequest, LoginResponse, MeResponse, TokenUser};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    Json,
};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

/// POST /auth/login — Exchange credentials for a token
///
/// The body is parsed leniently: anything that isn't a `{username, password}`
/// object is checked as empty credentials and fails the same way.
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<LoginResponse>, AppError> {
    let max_per_min = state.config.rate_limit_login_per_min;
    if max_per_min > 0 {
        let mut con = state.redis_connection().await?;

        let rate_limit_key = format!("ratelimit:login:{}", addr.ip());
        let allowed = check_rate_limit(&mut con, &rate_limit_key, max_per_min, 60)
            .await
            .map_err(|e| AppError::Internal(format!("Rate limit check failed: {}", e)))?;

        if !allowed {
            let mut hasher = std::hash::DefaultHasher::new();
            addr.ip().hash(&mut hasher);
            let ip_hash = format!("{:x}", hasher.finish());
            tracing::warn!(action = "rate_limited", endpoint = "auth/login", ip_hash = %ip_hash, "Rate limit exceeded");
            return Err(AppError::RateLimited);
        }
    }

    let req: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();

    let user = match state.credentials.authenticate(&req.username, &req.password) {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(action = "login_failed", username = %req.username, "Invalid credentials");
            return Err(err.into());
        }
    };

    let issued = state.tokens.issue(user)?;

    tracing::info!(action = "login_success", username = %issued.user.username, role = %issued.user.role, "Token issued");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_in: issued.expires_in,
        user: issued.user,
    }))
}

/// GET /auth/me — Identity carried by the presented token
pub async fn me(Authenticated(identity): Authenticated) -> Json<MeResponse> {
    Json(MeResponse {
        user: TokenUser {
            username: identity.username,
            role: identity.role,
        },
        expires_at: identity.expires_at,
    })
}
