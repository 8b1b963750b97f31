//! CRUD endpoints shared by every collection.
//!
//! Handlers are generic over the document type; `routes::collection_router`
//! mounts one set per collection.

use crate::auth::middleware::AppState;
use crate::error::AppError;
use crate::models::{DocMeta, Page, Resource, WriteMode};
use crate::routes::validate_id;
use crate::storage::{document, WriteOutcome};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::collections::HashMap;

const MAX_PAGE_LIMIT: usize = 100;
const DUPLICATE_EMAIL: &str = "Email already exists";

/// Resolved list window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    /// Read `page` and `limit`. Unparseable values fall back to defaults;
    /// page is at least 1 and limit is clamped to [1, 100].
    pub fn from_params(params: &HashMap<String, String>, default_limit: usize) -> Self {
        let page = params
            .get("page")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(1, |p| p.max(1) as usize);
        let limit = params
            .get("limit")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(default_limit, |l| l.clamp(1, MAX_PAGE_LIMIT as i64) as usize);

        Self { page, limit }
    }

    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Boolean list filter for collections that declare one. Only `true`
/// (any case) selects true; every other value selects false.
pub fn filter_from_params<T: Resource>(params: &HashMap<String, String>) -> Option<bool> {
    let param = T::FILTER_PARAM?;
    params.get(param).map(|v| v.eq_ignore_ascii_case("true"))
}

fn parse_body<T: Resource>(body: &[u8], mode: WriteMode, meta: DocMeta) -> Result<T, AppError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest(T::required_message(mode).to_string()))?;
    T::parse(value, mode, meta)
}

fn not_found<T: Resource>() -> AppError {
    AppError::NotFound(format!("{} not found", T::LABEL))
}

/// GET /api/{collection} — Paginated listing in insertion order
pub async fn list<T: Resource>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<T>>, AppError> {
    let pagination = Pagination::from_params(&params, T::DEFAULT_LIMIT);
    let filter = filter_from_params::<T>(&params);

    let mut con = state.redis_connection().await?;
    let (items, total) =
        document::list::<T, _>(&mut con, pagination.skip(), pagination.limit, filter).await?;

    Ok(Json(Page {
        page: pagination.page,
        limit: pagination.limit,
        total,
        items,
    }))
}

/// GET /api/{collection}/{id}
pub async fn get_one<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<T>, AppError> {
    validate_id::<T>(&id)?;

    let mut con = state.redis_connection().await?;
    let doc = document::get::<T, _>(&mut con, &id)
        .await?
        .ok_or_else(not_found::<T>)?;

    Ok(Json(doc))
}

/// POST /api/{collection}
pub async fn create<T: Resource>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<T>), AppError> {
    let doc: T = parse_body(&body, WriteMode::Create, document::new_meta(Utc::now()))?;

    let mut con = state.redis_connection().await?;
    match document::insert(&mut con, &doc).await? {
        WriteOutcome::Written => {}
        WriteOutcome::Conflict => return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string())),
        WriteOutcome::NotFound => return Err(not_found::<T>()),
    }

    tracing::info!(action = "document_created", collection = T::COLLECTION, id = %doc.meta().id, "Document created");

    Ok((StatusCode::CREATED, Json(doc)))
}

/// PUT /api/{collection}/{id} — Full replacement; `createdAt` is kept
///
/// The body is validated before the stored document is read.
pub async fn replace<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<T>, AppError> {
    validate_id::<T>(&id)?;

    let now = Utc::now();
    let meta = DocMeta {
        id: id.clone(),
        created_at: now,
        updated_at: now,
    };
    let mut doc: T = parse_body(&body, WriteMode::Replace, meta)?;

    let mut con = state.redis_connection().await?;
    let existing = document::get::<T, _>(&mut con, &id)
        .await?
        .ok_or_else(not_found::<T>)?;
    doc.meta_mut().created_at = existing.meta().created_at;

    match document::replace(&mut con, &doc).await? {
        WriteOutcome::Written => {}
        WriteOutcome::Conflict => return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string())),
        // Deleted between the read and the write
        WriteOutcome::NotFound => return Err(not_found::<T>()),
    }

    tracing::info!(action = "document_replaced", collection = T::COLLECTION, id = %doc.meta().id, "Document replaced");

    Ok(Json(doc))
}

/// DELETE /api/{collection}/{id}
pub async fn remove<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    validate_id::<T>(&id)?;

    let mut con = state.redis_connection().await?;
    if !document::delete::<T, _>(&mut con, &id).await? {
        return Err(not_found::<T>());
    }

    tracing::info!(action = "document_deleted", collection = T::COLLECTION, id = %id, "Document deleted");

    Ok(StatusCode::NO_CONTENT)
}
