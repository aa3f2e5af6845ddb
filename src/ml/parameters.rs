use serde::{Deserialize, Serialize};

use crate::domain::error::{RecError, RecResult};

/// Row-major dense matrix with its shape spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    pub rows:   usize,
    pub cols:   usize,
    pub values: Vec<f32>,
}

impl DenseMatrix {
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> RecResult<Self> {
        if values.len() != rows * cols {
            return Err(RecError::config(format!(
                "matrix {}x{} needs {} values, got {}",
                rows,
                cols,
                rows * cols,
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    #[cfg(test)]
    pub fn from_rows(rows: &[Vec<f32>]) -> RecResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        Self::new(rows.len(), cols, rows.iter().flatten().copied().collect())
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.values[r * self.cols..(r + 1) * self.cols]
    }

    /// Transposed copy: [cols × rows].
    pub fn transposed(&self) -> DenseMatrix {
        let mut values = Vec::with_capacity(self.values.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                values.push(self.values[r * self.cols + c]);
            }
        }
        DenseMatrix { rows: self.cols, cols: self.rows, values }
    }

    fn expect_shape(&self, name: &str, rows: usize, cols: usize) -> RecResult<()> {
        if self.rows != rows || self.cols != cols || self.values.len() != rows * cols {
            return Err(RecError::config(format!(
                "{name} is {}x{} ({} values), expected {rows}x{cols}",
                self.rows,
                self.cols,
                self.values.len()
            )));
        }
        Ok(())
    }
}

/// Every learnable value of a hybrid model, detached from any backend.
///
/// `content_weight` uses the projection's input-major layout,
/// [n_genres × n_factors], so row g is genre g's contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub user_factors: DenseMatrix,
    pub item_factors: DenseMatrix,
    pub user_bias:    Vec<f32>,
    pub item_bias:    Vec<f32>,
    pub global_bias:  f32,
    #[serde(default)]
    pub content_weight: Option<DenseMatrix>,
    #[serde(default)]
    pub content_bias:   Option<Vec<f32>>,
}

impl ModelParameters {
    pub fn n_users(&self) -> usize {
        self.user_factors.rows
    }

    pub fn n_items(&self) -> usize {
        self.item_factors.rows
    }

    pub fn n_factors(&self) -> usize {
        self.user_factors.cols
    }

    pub fn n_genres(&self) -> usize {
        self.content_weight.as_ref().map_or(0, |w| w.rows)
    }

    /// Shapes must agree with each other and with the declared sizes.
    pub fn check(&self, n_users: usize, n_items: usize, n_factors: usize, n_genres: usize) -> RecResult<()> {
        self.user_factors.expect_shape("user_factors", n_users, n_factors)?;
        self.item_factors.expect_shape("item_factors", n_items, n_factors)?;
        if self.user_bias.len() != n_users || self.item_bias.len() != n_items {
            return Err(RecError::config(format!(
                "bias lengths users={} items={}, expected {} and {}",
                self.user_bias.len(),
                self.item_bias.len(),
                n_users,
                n_items
            )));
        }
        match (&self.content_weight, &self.content_bias, n_genres) {
            (None, None, 0) => Ok(()),
            (Some(w), Some(b), g) if g > 0 => {
                w.expect_shape("content_weight", g, n_factors)?;
                if b.len() != n_factors {
                    return Err(RecError::config(format!(
                        "content_bias has {} values, expected {}",
                        b.len(),
                        n_factors
                    )));
                }
                Ok(())
            }
            _ => Err(RecError::config(format!(
                "content projection does not match n_genres={n_genres}"
            ))),
        }
    }

    /// Number of NaN/Inf values across all tensors.
    pub fn non_finite_count(&self) -> usize {
        let mut all: Vec<&[f32]> = vec![
            &self.user_factors.values,
            &self.item_factors.values,
            &self.user_bias,
            &self.item_bias,
            std::slice::from_ref(&self.global_bias),
        ];
        if let Some(w) = &self.content_weight {
            all.push(&w.values);
        }
        if let Some(b) = &self.content_bias {
            all.push(b);
        }
        all.iter().flat_map(|s| s.iter()).filter(|v| !v.is_finite()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose() {
        let m = DenseMatrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let t = m.transposed();
        assert_eq!((t.rows, t.cols), (3, 2));
        assert_eq!(t.row(0), &[1.0, 4.0]);
        assert_eq!(t.row(2), &[3.0, 6.0]);
    }

    #[test]
    fn test_shape_check() {
        let params = ModelParameters {
            user_factors: DenseMatrix::new(2, 3, vec![0.0; 6]).unwrap(),
            item_factors: DenseMatrix::new(1, 3, vec![0.0; 3]).unwrap(),
            user_bias:    vec![0.0; 2],
            item_bias:    vec![0.0; 1],
            global_bias:  f32::NAN,
            content_weight: None,
            content_bias:   None,
        };
        assert!(params.check(2, 1, 3, 0).is_ok());
        assert!(params.check(2, 1, 4, 0).is_err());
        assert!(params.check(2, 1, 3, 2).is_err());
        assert_eq!(params.non_finite_count(), 1);
    }

    #[test]
    fn test_wrong_value_count() {
        assert!(DenseMatrix::new(2, 2, vec![1.0; 3]).is_err());
    }
}
