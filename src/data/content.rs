// ============================================================
// Layer 4 — Content Feature Matrix
// ============================================================
// One fixed-length genre vector per item index, stored row-major:
//
//   values[item * n_genres .. (item + 1) * n_genres]
//
// Rows line up with the item EntityIndex. Items the metadata never
// mentions keep the zero vector; metadata rows for items outside
// the index are ignored (they were never trained on).

use serde::{Deserialize, Serialize};

use crate::domain::entity_index::EntityIndex;
use crate::domain::error::{RecError, RecResult};
use crate::domain::traits::ItemMetadata;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMatrix {
    n_items:  usize,
    n_genres: usize,
    values:   Vec<f32>,
}

impl ContentMatrix {
    /// All-zero matrix; with `n_genres = 0` this is the pure
    /// collaborative model's content.
    pub fn zeros(n_items: usize, n_genres: usize) -> Self {
        Self { n_items, n_genres, values: vec![0.0; n_items * n_genres] }
    }

    /// Align ingested metadata to the item index.
    pub fn build(items: &EntityIndex, metadata: &ItemMetadata) -> RecResult<Self> {
        let n_genres = metadata.genre_names.len();
        let mut matrix = Self::zeros(items.len(), n_genres);
        let mut matched = 0usize;

        for (item_id, flags) in &metadata.rows {
            if flags.len() != n_genres {
                return Err(RecError::config(format!(
                    "item '{}' has {} genre values, expected {}",
                    item_id,
                    flags.len(),
                    n_genres
                )));
            }
            if let Some(i) = items.get(item_id) {
                matrix.values[i * n_genres..(i + 1) * n_genres].copy_from_slice(flags);
                matched += 1;
            }
        }

        tracing::debug!(
            "Content matrix: {} items x {} genres ({} rows matched metadata)",
            matrix.n_items,
            n_genres,
            matched
        );
        Ok(matrix)
    }

    /// Build straight from per-item rows, in item-index order.
    #[cfg(test)]
    pub fn from_rows(rows: Vec<Vec<f32>>, n_genres: usize) -> RecResult<Self> {
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_genres) {
            return Err(RecError::config(format!(
                "content row {} has length {}, expected {}",
                i,
                r.len(),
                n_genres
            )));
        }
        let n_items = rows.len();
        Ok(Self { n_items, n_genres, values: rows.into_iter().flatten().collect() })
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn n_genres(&self) -> usize {
        self.n_genres
    }

    /// Genre vector of one item.
    pub fn row(&self, item: usize) -> &[f32] {
        &self.values[item * self.n_genres..(item + 1) * self.n_genres]
    }

    /// Whole matrix, row-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Rows for a list of items, concatenated row-major.
    pub fn gather(&self, items: &[usize]) -> Vec<f32> {
        let mut out = Vec::with_capacity(items.len() * self.n_genres);
        for &i in items {
            out.extend_from_slice(self.row(i));
        }
        out
    }

    /// Shape check against a model's configuration.
    pub fn check_shape(&self, n_items: usize, n_genres: usize) -> RecResult<()> {
        if self.n_items != n_items || self.n_genres != n_genres {
            return Err(RecError::config(format!(
                "content matrix is {}x{}, model expects {}x{}",
                self.n_items, self.n_genres, n_items, n_genres
            )));
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ItemMetadata {
        ItemMetadata {
            genre_names: vec!["Action".into(), "Comedy".into()],
            rows: vec![
                ("Z".into(), vec![0.0, 1.0]),
                ("X".into(), vec![1.0, 0.0]),
                ("unknown".into(), vec![1.0, 1.0]),
            ],
        }
    }

    #[test]
    fn test_rows_align_with_item_index() {
        let items  = EntityIndex::build(["X", "Y", "Z"]);
        let matrix = ContentMatrix::build(&items, &metadata()).unwrap();
        assert_eq!(matrix.n_items(), 3);
        assert_eq!(matrix.row(0), &[1.0, 0.0]);
        // Y has no metadata row
        assert_eq!(matrix.row(1), &[0.0, 0.0]);
        assert_eq!(matrix.row(2), &[0.0, 1.0]);
    }

    #[test]
    fn test_wrong_row_width_is_rejected() {
        let items = EntityIndex::build(["X"]);
        let mut meta = metadata();
        meta.rows.push(("X".into(), vec![1.0]));
        let err = ContentMatrix::build(&items, &meta).unwrap_err();
        assert!(matches!(err, RecError::Configuration(_)));
    }

    #[test]
    fn test_gather_and_shape_check() {
        let m = ContentMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
        assert_eq!(m.gather(&[1, 0, 1]), vec![3.0, 4.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(m.check_shape(2, 2).is_ok());
        assert!(m.check_shape(2, 3).is_err());
    }

    #[test]
    fn test_zero_genre_matrix() {
        let m = ContentMatrix::zeros(4, 0);
        assert!(m.row(3).is_empty());
        assert!(m.gather(&[0, 1]).is_empty());
    }
}
