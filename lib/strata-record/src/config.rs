use serde::Deserialize;
use tracing::debug;

use crate::{SortHelper, SortHelperPool};

const SORT_HELPER_POOL_NAME: &str = "sort_helper";

const fn default_sort_helper_pool_capacity() -> usize {
    64
}

const fn default_sort_helper_initial_rows() -> usize {
    0
}

/// Sort configuration.
///
/// Controls the pool of [`SortHelper`]s used to sort records.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SortConfiguration {
    /// Maximum number of idle sort helpers to keep around for reuse.
    ///
    /// Helpers released while the pool is full are dropped. Setting this to zero disables reuse entirely, so that every
    /// sort builds a fresh helper.
    ///
    /// Defaults to 64.
    #[serde(default = "default_sort_helper_pool_capacity")]
    pub sort_helper_pool_capacity: usize,

    /// Number of rows to reserve room for when building a new sort helper.
    ///
    /// Helpers grow as needed, so this only avoids reallocation while a freshly built helper warms up.
    ///
    /// Defaults to 0.
    #[serde(default = "default_sort_helper_initial_rows")]
    pub sort_helper_initial_rows: usize,
}

impl SortConfiguration {
    /// Builds a pool of sort helpers based on this configuration.
    pub fn build_pool(&self) -> SortHelperPool {
        let capacity = self.sort_helper_pool_capacity;
        let initial_rows = self.sort_helper_initial_rows;
        debug!(capacity, initial_rows, "Building sort helper pool.");

        SortHelperPool::with_builder(SORT_HELPER_POOL_NAME, capacity, move || {
            SortHelper::with_capacity(initial_rows)
        })
    }
}

impl Default for SortConfiguration {
    fn default() -> Self {
        Self {
            sort_helper_pool_capacity: default_sort_helper_pool_capacity(),
            sort_helper_initial_rows: default_sort_helper_initial_rows(),
        }
    }
}
