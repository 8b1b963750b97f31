//! Demo data for the `seed` subcommand.
//!
//! Customers are upserted by email and products by name, so running the
//! seeder twice leaves one copy of each.

use crate::error::AppError;
use crate::models::{Customer, DocMeta, Product, Resource, WriteMode};
use crate::storage::{document, WriteOutcome};
use chrono::Utc;
use redis::AsyncCommands;
use serde_json::json;

/// What a seeding run did to one collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedCounts {
    pub inserted: usize,
    pub updated: usize,
    pub total: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub cleared: usize,
    pub customers: SeedCounts,
    pub products: SeedCounts,
}

pub fn demo_customers() -> Vec<serde_json::Value> {
    vec![
        json!({"name": "Jane Doe", "email": "jane@example.com", "phone": "+61 412 345 678", "address": "1 George St, Sydney NSW"}),
        json!({"name": "John Smith", "email": "john@example.com", "phone": "+61 400 111 222", "address": "200 Pitt St, Sydney NSW"}),
        json!({"name": "Ayesha Mahveen", "email": "ayesha@example.com", "phone": "+61 433 987 654", "address": "5 King St, Sydney NSW"}),
    ]
}

pub fn demo_products() -> Vec<serde_json::Value> {
    vec![
        json!({"name": "Comfort Sneakers", "price": 129.95, "inStock": true, "description": "Lightweight daily wear shoes"}),
        json!({"name": "Trail Runner Pro", "price": 189.00, "inStock": true, "description": "Grip and cushioning for trails"}),
        json!({"name": "Office Loafers", "price": 149.50, "inStock": false, "description": "Classic, comfy, formal-friendly"}),
    ]
}

/// Write `doc` over `existing` if there is one, otherwise insert it.
async fn upsert<T, C>(
    con: &mut C,
    body: serde_json::Value,
    existing: Option<&DocMeta>,
    counts: &mut SeedCounts,
) -> Result<(), AppError>
where
    T: Resource,
    C: AsyncCommands,
{
    let now = Utc::now();
    match existing {
        Some(meta) => {
            let meta = DocMeta {
                id: meta.id.clone(),
                created_at: meta.created_at,
                updated_at: now,
            };
            let doc = T::parse(body, WriteMode::Replace, meta)?;
            match document::replace(con, &doc).await? {
                WriteOutcome::Written => counts.updated += 1,
                outcome => {
                    return Err(AppError::Internal(format!(
                        "Seeding {} {} failed: {:?}",
                        T::COLLECTION,
                        doc.meta().id,
                        outcome
                    )))
                }
            }
        }
        None => {
            let doc = T::parse(body, WriteMode::Create, document::new_meta(now))?;
            match document::insert(con, &doc).await? {
                WriteOutcome::Written => counts.inserted += 1,
                outcome => {
                    return Err(AppError::Internal(format!(
                        "Seeding {} failed: {:?}",
                        T::COLLECTION,
                        outcome
                    )))
                }
            }
        }
    }
    Ok(())
}

/// Seed demo customers and products. With `reset`, both collections are
/// emptied first.
pub async fn run<C>(con: &mut C, reset: bool) -> Result<SeedReport, AppError>
where
    C: AsyncCommands,
{
    let mut report = SeedReport::default();

    if reset {
        report.cleared += document::clear::<Customer, _>(con).await?;
        report.cleared += document::clear::<Product, _>(con).await?;
        tracing::info!(
            action = "seed_reset",
            documents = report.cleared,
            "Cleared customers and products"
        );
    }

    for body in demo_customers() {
        let email = body["email"].as_str().unwrap_or_default().to_lowercase();
        let existing = document::find_by_unique::<Customer, _>(con, &email).await?;
        upsert::<Customer, _>(
            con,
            body,
            existing.as_ref().map(|c| &c.meta),
            &mut report.customers,
        )
        .await?;
    }
    report.customers.total = document::count::<Customer, _>(con).await?;

    let products = document::list_all::<Product, _>(con).await?;
    for body in demo_products() {
        let name = body["name"].as_str().unwrap_or_default();
        let existing = products.iter().find(|p| p.name == name).map(|p| &p.meta);
        upsert::<Product, _>(con, body, existing, &mut report.products).await?;
    }
    report.products.total = document::count::<Product, _>(con).await?;

    tracing::info!(
        action = "seed_complete",
        customers_inserted = report.customers.inserted,
        customers_updated = report.customers.updated,
        customers_total = report.customers.total,
        products_inserted = report.products.inserted,
        products_updated = report.products.updated,
        products_total = report.products.total,
        "Seeding complete"
    );

    Ok(report)
}
