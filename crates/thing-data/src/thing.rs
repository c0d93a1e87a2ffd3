//! The Thing entity

use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer-identified token produced by generation
///
/// Things are immutable; the store creates one per generation and never
/// touches it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Thing {
    id: i64,
}

impl Thing {
    /// Create a Thing with the given id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self { id }
    }

    /// The Thing's identifier
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for Thing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thing(id={})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Thing::new(3).to_string(), "Thing(id=3)");
        assert_eq!(Thing::new(-1).to_string(), "Thing(id=-1)");
    }

    #[test]
    fn test_ordering_follows_id() {
        assert!(Thing::new(1) < Thing::new(2));
        assert_eq!(Thing::new(7).id(), 7);
    }

    #[test]
    fn test_serializes_as_object() {
        let json = serde_json::to_string(&Thing::new(5)).unwrap();
        assert_eq!(json, r#"{"id":5}"#);
    }
}
