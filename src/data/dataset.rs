use burn::data::dataset::Dataset;

use crate::domain::error::{RecError, RecResult};
use crate::domain::rating::Rating;

/// Index-space ratings behind Burn's Dataset trait so the
/// DataLoader can shuffle and batch them.
#[derive(Debug, Clone)]
pub struct RatingDataset {
    ratings: Vec<Rating>,
}

impl RatingDataset {
    pub fn new(ratings: Vec<Rating>) -> Self { Self { ratings } }

    /// Reject any rating whose indices fall outside the model's tables.
    pub fn check_bounds(&self, n_users: usize, n_items: usize) -> RecResult<()> {
        match self.ratings.iter().find(|r| r.user >= n_users || r.item >= n_items) {
            Some(r) => Err(RecError::config(format!(
                "rating ({}, {}) outside model range users=[0,{}) items=[0,{})",
                r.user, r.item, n_users, n_items
            ))),
            None => Ok(()),
        }
    }

    pub fn ratings(&self) -> &[Rating] { &self.ratings }
}

impl Dataset<Rating> for RatingDataset {
    fn get(&self, index: usize) -> Option<Rating> {
        self.ratings.get(index).copied()
    }

    fn len(&self) -> usize {
        self.ratings.len()
    }
}
