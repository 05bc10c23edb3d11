//! Row-version concurrency token shared by every stored entity.

use serde::{Deserialize, Serialize};

/// Monotonically increasing version of a stored row.
///
/// A row that was never persisted is at version 0. Stores bump the version by
/// one on every successful write and reject writes whose version is stale.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowVersion(u64);

impl RowVersion {
    pub const INITIAL: RowVersion = RowVersion(0);

    pub fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl core::fmt::Display for RowVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Entities that carry a row-version token.
pub trait Versioned {
    /// The version this copy was read at.
    fn row_version(&self) -> RowVersion;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_start_at_zero_and_bump_by_one() {
        assert_eq!(RowVersion::default(), RowVersion::INITIAL);
        assert_eq!(RowVersion::INITIAL.next(), RowVersion::new(1));
        assert!(RowVersion::new(3) < RowVersion::new(3).next());
    }
}
