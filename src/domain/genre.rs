// ============================================================
// Layer 3 — Genre Vocabulary
// ============================================================
// The content matrix has one column per genre, named by whatever
// header the item metadata used ("Action", or a model key such as
// "g5"). People declare genres by display name, so resolving a
// label tries, in order:
//
//   1. an exact column name
//   2. a case-insensitive, trimmed column name
//   3. an alias (display name → column name), same normalisation
//
// Labels that match nothing are ignored here; deciding what zero
// matches means is the fold-in estimator's job.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenreVocabulary {
    /// Column names in content-matrix order
    names: Vec<String>,

    /// normalised display name → column name
    #[serde(default)]
    aliases: HashMap<String, String>,
}

/// Display names of the TMDB movie genres and the model keys the
/// item metadata export uses for them.
pub const TMDB_MOVIE_GENRE_KEYS: &[(&str, &str)] = &[
    ("Action", "g5"),
    ("Adventure", "g0"),
    ("Animation", "g2"),
    ("Comedy", "g6"),
    ("Crime", "g10"),
    ("Documentary", "g11"),
    ("Drama", "g3"),
    ("Family", "g16"),
    ("Fantasy", "g1"),
    ("History", "g7"),
    ("Horror", "g4"),
    ("Music", "g14"),
    ("Mystery", "g13"),
    ("Romance", "g15"),
    ("Science Fiction", "g12"),
    ("TV Movie", "g18"),
    ("Thriller", "g9"),
    ("War", "g17"),
    ("Western", "g8"),
];

fn normalise(label: &str) -> String {
    label.trim().to_lowercase()
}

impl GenreVocabulary {
    pub fn new(names: Vec<String>) -> Self {
        Self { names, aliases: HashMap::new() }
    }

    /// Register `display` as another way to say column `column`.
    pub fn with_alias(mut self, display: &str, column: &str) -> Self {
        self.aliases.insert(normalise(display), column.to_string());
        self
    }

    /// Add the TMDB display-name aliases for any key this vocabulary has.
    pub fn with_tmdb_aliases(self) -> Self {
        let present: Vec<(&str, &str)> = TMDB_MOVIE_GENRE_KEYS
            .iter()
            .copied()
            .filter(|(_, key)| self.names.iter().any(|n| n == key))
            .collect();
        present
            .into_iter()
            .fold(self, |v, (display, key)| v.with_alias(display, key))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column index of a single label.
    pub fn resolve(&self, label: &str) -> Option<usize> {
        if let Some(i) = self.names.iter().position(|n| n == label) {
            return Some(i);
        }
        let wanted = normalise(label);
        if let Some(i) = self.names.iter().position(|n| normalise(n) == wanted) {
            return Some(i);
        }
        let column = self.aliases.get(&wanted)?;
        self.names.iter().position(|n| n == column)
    }

    /// Distinct column indices for a set of labels, ascending.
    pub fn resolve_all<S: AsRef<str>>(&self, labels: &[S]) -> BTreeSet<usize> {
        labels
            .iter()
            .filter_map(|l| self.resolve(l.as_ref()))
            .collect()
    }
}
