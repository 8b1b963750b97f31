//! API route handlers.

pub mod auth;
pub mod resources;

use crate::auth::middleware::{require_auth, AppState};
use crate::error::AppError;
use crate::models::{is_document_id, Customer, Product, Resource, Student, Task, User};
use axum::{middleware, routing::get, routing::post, Json, Router};

/// Reject ids that can't name a document. Reported as not found so a bad id
/// and a missing document look the same.
pub fn validate_id<T: Resource>(id: &str) -> Result<(), AppError> {
    if !is_document_id(id) {
        return Err(AppError::NotFound(format!("{} not found", T::LABEL)));
    }
    Ok(())
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// CRUD routes for one collection, behind the access gate when the
/// collection is configured as protected.
fn collection_router<T: Resource>(state: &AppState) -> Router<AppState> {
    let base = format!("/api/{}", T::COLLECTION);
    let router = Router::new()
        .route(
            &base,
            get(resources::list::<T>).post(resources::create::<T>),
        )
        .route(
            &format!("{}/{{id}}", base),
            get(resources::get_one::<T>)
                .put(resources::replace::<T>)
                .delete(resources::remove::<T>),
        );

    if state.config.is_protected(T::COLLECTION) {
        router.route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
    } else {
        router
    }
}

/// Build the API router with all endpoints.
pub fn api_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Auth endpoints
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Collections
        .merge(collection_router::<User>(state))
        .merge(collection_router::<Task>(state))
        .merge(collection_router::<Customer>(state))
        .merge(collection_router::<Product>(state))
        .merge(collection_router::<Student>(state))
}
