// ============================================================
// Layer 3 — Entity Index
// ============================================================
// Bijective mapping between external ids (strings of any domain)
// and the dense internal indices [0, N) used by the model.
//
// Construction sorts the unique ids ascending, so the same id set
// always produces the same mapping no matter what order the rows
// arrived in. Checkpoints depend on this: an index saved by one
// run can be rebuilt and compared by another.
//
// Serialised form is just the sorted id list: position = index,
// which doubles as the index → id reverse map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::{EntityKind, RecError, RecResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct EntityIndex {
    /// Sorted, unique external ids. ids[i] is the id of index i.
    ids: Vec<String>,

    /// Reverse lookup, rebuilt from `ids`
    positions: HashMap<String, usize>,
}

impl EntityIndex {
    /// Build an index from raw ids. Duplicates collapse; order of the
    /// input does not matter.
    pub fn build<I, S>(raw_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = raw_ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        Self::from_sorted(ids)
    }

    fn from_sorted(ids: Vec<String>) -> Self {
        let positions = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self { ids, positions }
    }

    /// Index of `raw_id`, or `None` if it was not in the build set.
    pub fn get(&self, raw_id: &str) -> Option<usize> {
        self.positions.get(raw_id).copied()
    }

    /// Index of `raw_id`; unknown ids are a NotFound error, never a default.
    pub fn lookup(&self, raw_id: &str, kind: EntityKind) -> RecResult<usize> {
        self.get(raw_id).ok_or_else(|| RecError::NotFound {
            kind,
            id: raw_id.to_string(),
        })
    }

    /// External id for an internal index.
    pub fn id_of(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in index order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl From<EntityIndex> for Vec<String> {
    fn from(index: EntityIndex) -> Self {
        index.ids
    }
}

impl TryFrom<Vec<String>> for EntityIndex {
    type Error = RecError;

    /// Accepts only lists that `build` could have produced: strictly
    /// ascending, which also rules out duplicates.
    fn try_from(ids: Vec<String>) -> RecResult<Self> {
        if let Some(w) = ids.windows(2).find(|w| w[0] >= w[1]) {
            return Err(RecError::config(format!(
                "entity index is not sorted/unique near '{}' and '{}'",
                w[0], w[1]
            )));
        }
        Ok(Self::from_sorted(ids))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense_and_bijective() {
        let idx = EntityIndex::build(["c", "a", "b", "a"]);
        assert_eq!(idx.len(), 3);

        let mut seen: Vec<usize> = idx.ids().iter().map(|id| idx.get(id).unwrap()).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2]);

        for id in ["a", "b", "c"] {
            let i = idx.lookup(id, EntityKind::User).unwrap();
            assert_eq!(idx.id_of(i), Some(id));
        }
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let one = EntityIndex::build(["u3", "u1", "u2", "u1"]);
        let two = EntityIndex::build(["u2", "u1", "u3"]);
        assert_eq!(one, two);
        assert_eq!(one.get("u1"), Some(0));
        assert_eq!(one.get("u3"), Some(2));
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let idx = EntityIndex::build(["A", "B"]);
        let err = idx.lookup("ghost", EntityKind::User).unwrap_err();
        assert_eq!(err, RecError::user_not_found("ghost"));
        assert_eq!(idx.id_of(5), None);
    }

    #[test]
    fn test_serialises_as_sorted_list() {
        let idx = EntityIndex::build(["y", "x"]);
        let json = serde_json::to_string(&idx).unwrap();
        assert_eq!(json, r#"["x","y"]"#);

        let back: EntityIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, idx);
        assert_eq!(back.get("y"), Some(1));
    }

    #[test]
    fn test_rejects_unsorted_list() {
        let res: Result<EntityIndex, _> = serde_json::from_str(r#"["b","a"]"#);
        assert!(res.is_err());
        let res: Result<EntityIndex, _> = serde_json::from_str(r#"["a","a"]"#);
        assert!(res.is_err());
    }
}
