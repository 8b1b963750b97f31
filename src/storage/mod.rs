//! Redis storage layer for the document collections.
//!
//! All functions are async and use redis::AsyncCommands.
//! Documents are serialized to JSON for storage in Redis.

pub mod document;

pub use document::WriteOutcome;

use redis::AsyncCommands;

/// Scan for Redis keys matching a pattern using SCAN (non-blocking).
///
/// Iterates until the cursor wraps, so every matching key is returned.
pub async fn scan_keys<C>(con: &mut C, pattern: &str) -> Result<Vec<String>, redis::RedisError>
where
    C: AsyncCommands,
{
    let mut all_keys = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(100)
            .query_async(con)
            .await?;
        all_keys.extend(keys);
        cursor = new_cursor;
        if cursor == 0 {
            break;
        }
    }
    Ok(all_keys)
}
