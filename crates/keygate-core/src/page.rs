//! Skip/limit pagination

use serde::{Deserialize, Serialize};

/// Page window over an ordered listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Records to skip
    pub skip: u64,
    /// Maximum records to return; 0 selects the configured default
    pub limit: u64,
}

impl Page {
    /// Create a page window
    pub fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// Replace a zero limit with `default_limit` and clamp to `max_limit`
    pub fn bounded(self, default_limit: u64, max_limit: u64) -> Self {
        let limit = if self.limit == 0 {
            default_limit
        } else {
            self.limit
        };
        Self {
            skip: self.skip,
            limit: limit.min(max_limit),
        }
    }

    /// Take this page out of an ordered sequence
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}
