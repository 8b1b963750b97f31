//! Generic document operations for every collection.
//!
//! Redis key patterns:
//! - `{collection}:{id}` — document (JSON)
//! - `{collection}:index` — ZSET of ids scored by creation time (ms)
//! - `{collection}:unique:{field}:{value}` — id owning a unique field value
//!
//! Create, replace and delete run as Lua scripts so uniqueness checks and
//! index maintenance happen atomically with the document write.

use crate::models::{DocMeta, Resource};
use chrono::{DateTime, Utc};
use rand::Rng;
use redis::AsyncCommands;

/// Outcome of a write that can collide with an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    NotFound,
    Conflict,
}

/// Generate a 24-char hex document id: big-endian unix seconds followed by
/// 8 random bytes, so ids sort roughly by creation time.
pub fn new_document_id(now: DateTime<Utc>) -> String {
    let secs = now.timestamp().clamp(0, i64::from(u32::MAX)) as u32;
    let mut random = [0u8; 8];
    rand::rng().fill(&mut random);

    secs.to_be_bytes()
        .iter()
        .chain(random.iter())
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Metadata for a document created at `now`.
pub fn new_meta(now: DateTime<Utc>) -> DocMeta {
    DocMeta {
        id: new_document_id(now),
        created_at: now,
        updated_at: now,
    }
}

fn doc_key<T: Resource>(id: &str) -> String {
    format!("{}:{}", T::COLLECTION, id)
}

fn index_key<T: Resource>() -> String {
    format!("{}:index", T::COLLECTION)
}

fn unique_prefix<T: Resource>() -> String {
    match T::UNIQUE_FIELD {
        Some(field) => format!("{}:unique:{}:", T::COLLECTION, field),
        None => String::new(),
    }
}

fn json_error(context: &'static str, err: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((
        redis::ErrorKind::UnexpectedReturnType,
        context,
        err.to_string(),
    ))
}

fn encode<T: Resource>(doc: &T) -> Result<String, redis::RedisError> {
    serde_json::to_string(doc).map_err(|e| json_error("JSON serialize", e))
}

fn decode<T: Resource>(data: &str) -> Result<T, redis::RedisError> {
    serde_json::from_str(data).map_err(|e| json_error("JSON deserialize", e))
}

/// Insert a new document. Returns `Conflict` if its unique value is taken.
pub async fn insert<T, C>(con: &mut C, doc: &T) -> Result<WriteOutcome, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    let meta = doc.meta();
    let unique_key = match doc.unique_value() {
        Some(value) if T::UNIQUE_FIELD.is_some() => format!("{}{}", unique_prefix::<T>(), value),
        _ => String::new(),
    };

    let script = redis::Script::new(
        r#"
        if ARGV[4] ~= '' then
            if not redis.call('SET', ARGV[4], ARGV[2], 'NX') then
                return 0
            end
        end
        redis.call('SET', KEYS[1], ARGV[1])
        redis.call('ZADD', KEYS[2], ARGV[3], ARGV[2])
        return 1
        "#,
    );

    let written: i32 = script
        .key(doc_key::<T>(&meta.id))
        .key(index_key::<T>())
        .arg(encode(doc)?)
        .arg(&meta.id)
        .arg(meta.created_at.timestamp_millis())
        .arg(unique_key)
        .invoke_async(con)
        .await?;

    Ok(if written == 1 {
        WriteOutcome::Written
    } else {
        WriteOutcome::Conflict
    })
}

/// Get a document by id.
pub async fn get<T, C>(con: &mut C, id: &str) -> Result<Option<T>, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    let json: Option<String> = con.get(doc_key::<T>(id)).await?;
    json.map(|data| decode(&data)).transpose()
}

/// Overwrite an existing document, moving its unique-value claim if the
/// value changed.
pub async fn replace<T, C>(con: &mut C, doc: &T) -> Result<WriteOutcome, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    let meta = doc.meta();

    let script = redis::Script::new(
        r#"
        local old = redis.call('GET', KEYS[1])
        if not old then
            return 0
        end
        if ARGV[3] ~= '' then
            local previous = cjson.decode(old)[ARGV[3]]
            if previous ~= ARGV[5] then
                local new_key = ARGV[4] .. ARGV[5]
                local owner = redis.call('GET', new_key)
                if owner and owner ~= ARGV[2] then
                    return -1
                end
                redis.call('SET', new_key, ARGV[2])
                if type(previous) == 'string' then
                    redis.call('DEL', ARGV[4] .. previous)
                end
            end
        end
        redis.call('SET', KEYS[1], ARGV[1])
        return 1
        "#,
    );

    let result: i32 = script
        .key(doc_key::<T>(&meta.id))
        .arg(encode(doc)?)
        .arg(&meta.id)
        .arg(T::UNIQUE_FIELD.unwrap_or(""))
        .arg(unique_prefix::<T>())
        .arg(doc.unique_value().unwrap_or(""))
        .invoke_async(con)
        .await?;

    Ok(match result {
        1 => WriteOutcome::Written,
        0 => WriteOutcome::NotFound,
        _ => WriteOutcome::Conflict,
    })
}

/// Delete a document with its index entry and unique-value claim.
///
/// Returns true if the document was deleted, false if it didn't exist.
pub async fn delete<T, C>(con: &mut C, id: &str) -> Result<bool, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    let script = redis::Script::new(
        r#"
        local old = redis.call('GET', KEYS[1])
        if not old then
            return 0
        end
        redis.call('DEL', KEYS[1])
        redis.call('ZREM', KEYS[2], ARGV[1])
        if ARGV[2] ~= '' then
            local value = cjson.decode(old)[ARGV[2]]
            if type(value) == 'string' then
                local unique_key = ARGV[3] .. value
                if redis.call('GET', unique_key) == ARGV[1] then
                    redis.call('DEL', unique_key)
                end
            end
        end
        return 1
        "#,
    );

    let deleted: i32 = script
        .key(doc_key::<T>(id))
        .key(index_key::<T>())
        .arg(id)
        .arg(T::UNIQUE_FIELD.unwrap_or(""))
        .arg(unique_prefix::<T>())
        .invoke_async(con)
        .await?;

    Ok(deleted > 0)
}

/// List documents in creation order.
///
/// Without a filter only the requested window of the index is read. With a
/// filter the whole index is walked, since matches can't be counted without
/// loading each document. Returns the window and the total number of matches.
pub async fn list<T, C>(
    con: &mut C,
    skip: usize,
    limit: usize,
    filter: Option<bool>,
) -> Result<(Vec<T>, usize), redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    let index = index_key::<T>();

    if filter.is_none() {
        let total = count::<T, C>(con).await?;
        if limit == 0 || skip >= total {
            return Ok((Vec::new(), total));
        }
        let stop = (skip.saturating_add(limit).min(total) - 1) as isize;
        let ids: Vec<String> = con.zrange(&index, skip as isize, stop).await?;

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            // Index entries without a document are skipped
            if let Some(doc) = get::<T, C>(con, &id).await? {
                items.push(doc);
            }
        }
        return Ok((items, total));
    }

    let mut total = 0;
    let mut items = Vec::new();
    for doc in list_all::<T, C>(con).await? {
        if doc.filter_value() != filter {
            continue;
        }
        if total >= skip && items.len() < limit {
            items.push(doc);
        }
        total += 1;
    }

    Ok((items, total))
}

/// Number of documents in a collection.
pub async fn count<T, C>(con: &mut C) -> Result<usize, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    con.zcard(index_key::<T>()).await
}

/// Every document in a collection, in creation order.
pub async fn list_all<T, C>(con: &mut C) -> Result<Vec<T>, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    let ids: Vec<String> = con.zrange(index_key::<T>(), 0, -1).await?;
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(doc) = get::<T, C>(con, &id).await? {
            items.push(doc);
        }
    }
    Ok(items)
}

/// Look up a document through its unique-value claim.
pub async fn find_by_unique<T, C>(con: &mut C, value: &str) -> Result<Option<T>, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    if T::UNIQUE_FIELD.is_none() {
        return Ok(None);
    }
    let owner: Option<String> = con
        .get(format!("{}{}", unique_prefix::<T>(), value))
        .await?;
    match owner {
        Some(id) => get(con, &id).await,
        None => Ok(None),
    }
}

/// Delete every document of a collection along with its unique claim, then
/// sweep any keys left under the collection prefix. Returns the number of
/// documents removed.
pub async fn clear<T, C>(con: &mut C) -> Result<usize, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    clear_in_batches::<T, C>(con, CLEAR_BATCH).await
}

const CLEAR_BATCH: isize = 500;

async fn clear_in_batches<T, C>(con: &mut C, batch: isize) -> Result<usize, redis::RedisError>
where
    T: Resource,
    C: AsyncCommands,
{
    let index = index_key::<T>();
    let mut removed = 0;

    // Every pass shrinks the index, so the head window always holds new ids
    loop {
        let ids: Vec<String> = con.zrange(&index, 0, batch - 1).await?;
        if ids.is_empty() {
            break;
        }
        for id in ids {
            if delete::<T, C>(con, &id).await? {
                removed += 1;
            } else {
                // Index entry without a document
                con.zrem::<_, _, ()>(&index, &id).await?;
            }
        }
    }

    let stray = super::scan_keys(con, &format!("{}:*", T::COLLECTION)).await?;
    for key in stray {
        con.del::<_, ()>(&key).await?;
    }

    Ok(removed)
}
