// ============================================================
// Layer 3 — Rating Domain Types
// ============================================================
// Two shapes of the same fact:
//
//   RatingRecord — as ingested, keyed by external ids
//   Rating       — as trained on, keyed by internal indices
//
// Moving from one to the other goes through the EntityIndex of
// the training partition; records whose ids are unknown to that
// index are dropped by the caller, never silently remapped.

use serde::{Deserialize, Serialize};

use crate::domain::entity_index::EntityIndex;
use crate::domain::error::{RecError, RecResult};

/// One ingested rating row. Ids stay strings whatever their source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: String,
    pub item_id: String,
    pub rating:  f32,
}

impl RatingRecord {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>, rating: f32) -> Self {
        Self { user_id: user_id.into(), item_id: item_id.into(), rating }
    }
}

/// One training sample in index space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user:  usize,
    pub item:  usize,
    pub value: f32,
}

impl Rating {
    pub fn new(user: usize, item: usize, value: f32) -> Self {
        Self { user, item, value }
    }
}

/// Zip three parallel columns into ratings. Unequal lengths are a
/// configuration error, not a truncation.
pub fn ratings_from_columns(users: &[usize], items: &[usize], values: &[f32]) -> RecResult<Vec<Rating>> {
    if users.len() != items.len() || items.len() != values.len() {
        return Err(RecError::config(format!(
            "rating columns differ in length: users={}, items={}, ratings={}",
            users.len(),
            items.len(),
            values.len()
        )));
    }
    Ok(users
        .iter()
        .zip(items)
        .zip(values)
        .map(|((&u, &i), &v)| Rating::new(u, i, v))
        .collect())
}

/// Map records into index space, dropping rows whose user or item is
/// absent from the indices. Returns the mapped ratings and the number
/// of rows dropped.
pub fn index_records(
    records: &[RatingRecord],
    users:   &EntityIndex,
    items:   &EntityIndex,
) -> RecResult<(Vec<Rating>, usize)> {
    let mut user_col  = Vec::with_capacity(records.len());
    let mut item_col  = Vec::with_capacity(records.len());
    let mut value_col = Vec::with_capacity(records.len());
    for r in records {
        if let (Some(u), Some(i)) = (users.get(&r.user_id), items.get(&r.item_id)) {
            user_col.push(u);
            item_col.push(i);
            value_col.push(r.rating);
        }
    }
    let mapped  = ratings_from_columns(&user_col, &item_col, &value_col)?;
    let dropped = records.len() - mapped.len();
    Ok((mapped, dropped))
}

/// Arithmetic mean of the rating values; 0.0 for an empty slice.
pub fn mean_rating(ratings: &[Rating]) -> f32 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: f64 = ratings.iter().map(|r| r.value as f64).sum();
    (sum / ratings.len() as f64) as f32
}
