//! In-memory pre-check for username availability.
//!
//! A cuckoo filter answers "definitely free" without touching the database;
//! a positive answer may be a false positive and falls through to a query.

use anyhow::{Context, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

const FILTER_CAPACITY: usize = 10_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static TAKEN_USERNAMES: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

pub fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

/// A poisoned lock only means another thread panicked mid-insert; the
/// filter is still usable and at worst reports a false positive.
fn might_be_taken(username: &str) -> bool {
    let filter = TAKEN_USERNAMES
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    filter.contains(&normalize(username))
}

pub fn mark_taken(username: &str) {
    let mut filter = TAKEN_USERNAMES
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    filter.add(&normalize(username));
}

pub async fn is_username_available(username: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
    let username = normalize(username);

    if !might_be_taken(&username) {
        return Ok(true);
    }

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
    )
    .bind(&username)
    .fetch_one(pool)
    .await?;

    Ok(exists == 0)
}

/// Streams every stored username into the filter, locking once per batch.
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<usize> {
    let mut rows = sqlx::query_scalar::<_, String>("SELECT username FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = rows.next().await {
        batch.push(normalize(&row.context("username row fetch failed")?));
        total += 1;

        if batch.len() == batch_size {
            add_batch(&batch);
            batch.clear();
        }
    }
    add_batch(&batch);

    tracing::info!(total, "Username filter warmup complete");
    Ok(total)
}

fn add_batch(usernames: &[String]) {
    if usernames.is_empty() {
        return;
    }
    let mut filter = TAKEN_USERNAMES
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    for username in usernames {
        filter.add(username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marked_names_are_reported_case_insensitively() {
        mark_taken("  Filter.Test.User ");
        assert!(might_be_taken("filter.test.user"));
        assert!(might_be_taken("FILTER.TEST.USER"));
    }

    #[test]
    fn normalizes() {
        assert_eq!(normalize("  JDoe "), "jdoe");
    }
}
