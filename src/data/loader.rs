// ============================================================
// Layer 4 — CSV Rating Source
// ============================================================
// Reads the two ingestion tables from disk with the csv crate:
//
//   ratings.csv  — user_id,item_id,rating
//                  (userId / movieId / itemId headers also accepted)
//   items.csv    — item_id,<genre_0>,<genre_1>,...
//                  header names become the genre column names
//
// Ids are kept as strings whatever they look like. Deduplication
// and cleaning happen upstream; this loader refuses rows it cannot
// parse rather than guessing.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::domain::error::RecError;
use crate::domain::rating::RatingRecord;
use crate::domain::traits::{ItemMetadata, RatingSource};

const USER_HEADERS:   &[&str] = &["user_id", "userId", "user"];
const ITEM_HEADERS:   &[&str] = &["item_id", "itemId", "movie_id", "movieId", "item"];
const RATING_HEADERS: &[&str] = &["rating", "score"];

pub struct CsvRatingSource {
    ratings_path: PathBuf,
    items_path:   Option<PathBuf>,
}

impl CsvRatingSource {
    pub fn new(ratings_path: impl Into<PathBuf>, items_path: Option<PathBuf>) -> Self {
        Self { ratings_path: ratings_path.into(), items_path }
    }
}

fn column(headers: &StringRecord, names: &[&str], path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim()))
        .ok_or_else(|| anyhow!("'{}' has no column named any of {:?}", path.display(), names))
}

fn field<'r>(record: &'r StringRecord, col: usize, line: usize) -> Result<&'r str> {
    record
        .get(col)
        .map(str::trim)
        .ok_or_else(|| anyhow!("line {line}: missing column {col}"))
}

/// A finite number, or a configuration error naming the line.
fn finite_value(raw: &str, what: &str, line: usize) -> Result<f32, RecError> {
    match raw.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RecError::config(format!("line {line}: {what} '{raw}' is not a finite number"))),
    }
}

impl RatingSource for CsvRatingSource {
    fn load_ratings(&self) -> Result<Vec<RatingRecord>> {
        let path = &self.ratings_path;
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Cannot open ratings file '{}'", path.display()))?;

        let headers = reader.headers()?.clone();
        let user_col   = column(&headers, USER_HEADERS, path)?;
        let item_col   = column(&headers, ITEM_HEADERS, path)?;
        let rating_col = column(&headers, RATING_HEADERS, path)?;

        let mut records = Vec::new();
        for (n, row) in reader.records().enumerate() {
            // +2: one for the header, one for 1-based line numbers
            let line = n + 2;
            let row  = row.with_context(|| format!("'{}' line {line}", path.display()))?;
            let raw  = field(&row, rating_col, line)?;
            let rating = finite_value(raw, "rating", line)?;
            records.push(RatingRecord::new(
                field(&row, user_col, line)?,
                field(&row, item_col, line)?,
                rating,
            ));
        }

        tracing::info!("Loaded {} ratings from '{}'", records.len(), path.display());
        Ok(records)
    }

    fn load_item_metadata(&self) -> Result<ItemMetadata> {
        let Some(path) = &self.items_path else {
            return Ok(ItemMetadata::default());
        };
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Cannot open item metadata '{}'", path.display()))?;

        let headers = reader.headers()?.clone();
        let item_col = column(&headers, ITEM_HEADERS, path)?;
        let genre_cols: Vec<usize> = (0..headers.len()).filter(|&c| c != item_col).collect();
        let genre_names: Vec<String> = genre_cols
            .iter()
            .map(|&c| headers[c].trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (n, row) in reader.records().enumerate() {
            let line = n + 2;
            let row  = row.with_context(|| format!("'{}' line {line}", path.display()))?;
            let flags = genre_cols
                .iter()
                .map(|&c| {
                    let raw = field(&row, c, line)?;
                    Ok(finite_value(raw, "genre value", line)?)
                })
                .collect::<Result<Vec<f32>>>()?;
            rows.push((field(&row, item_col, line)?.to_string(), flags));
        }

        tracing::info!(
            "Loaded metadata for {} items with {} genres from '{}'",
            rows.len(),
            genre_names.len(),
            path.display()
        );
        Ok(ItemMetadata { genre_names, rows })
    }
}
