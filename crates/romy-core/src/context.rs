//! Context type for tracking what caused a state write

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Context attached to every state an entity produces
///
/// Each coordinator refresh gets a fresh context, and every state projected
/// from that refresh carries it, so all entity updates of one poll can be
/// correlated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_distinct() {
        let first = Context::new();
        let second = Context::new();

        assert_ne!(first, second);
        assert_eq!(first.id.len(), 26);
    }
}
