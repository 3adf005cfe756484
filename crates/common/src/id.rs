//! ID generation utilities.

use uuid::Uuid;

/// ID generator for votings and owner snapshots.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new random UUID v4.
    #[must_use]
    pub fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}
