// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Four kinds of failure, each with a different caller contract:
//
//   Configuration  — fatal, aborts the run, never retried
//   NotFound       — unknown user/item id; the caller maps it to a
//                    client-visible "not in model" answer
//   NotApplicable  — fold-in with no usable genre; caller skips
//   NumericAnomaly — NaN/Inf where a finite number was expected
//
// Application code works with anyhow::Result; these convert into
// anyhow::Error via `?` and can be recovered with downcast_ref.

use thiserror::Error;

/// Which index space an unknown id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Item,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::User => f.write_str("user"),
            EntityKind::Item => f.write_str("item"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecError {
    /// Mismatched array lengths, wrong vector width, bad hyperparameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The id was not present when the model was trained.
    #[error("{kind} '{id}' not in model")]
    NotFound { kind: EntityKind, id: String },

    /// The request has no well-defined answer for this entity.
    #[error("not applicable: {0}")]
    NotApplicable(String),

    /// A parameter or score was NaN or infinite.
    #[error("numeric anomaly: {0}")]
    NumericAnomaly(String),
}

impl RecError {
    pub fn config(msg: impl Into<String>) -> Self {
        RecError::Configuration(msg.into())
    }

    pub fn user_not_found(id: impl Into<String>) -> Self {
        RecError::NotFound { kind: EntityKind::User, id: id.into() }
    }

    pub fn item_not_found(id: impl Into<String>) -> Self {
        RecError::NotFound { kind: EntityKind::Item, id: id.into() }
    }

    #[cfg(test)]
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecError::NotFound { .. })
    }
}

pub type RecResult<T> = std::result::Result<T, RecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_the_id() {
        let e = RecError::user_not_found("ghost");
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "user 'ghost' not in model");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = RecError::item_not_found("42").into();
        let rec = err.downcast_ref::<RecError>();
        assert!(matches!(rec, Some(RecError::NotFound { kind: EntityKind::Item, .. })));
    }
}
