//! In-memory trending catalog

use crate::traits::TrendingSource;
use crate::types::TrendingEntry;
use std::sync::{PoisonError, RwLock};

/// Trending charts held in memory and replaced wholesale on refresh
#[derive(Debug, Default)]
pub struct TrendingCatalog {
    entries: RwLock<Vec<TrendingEntry>>,
}

impl TrendingCatalog {
    /// Create a catalog seeded with `entries`
    pub fn new(entries: Vec<TrendingEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Swap in freshly fetched charts
    pub fn replace(&self, entries: Vec<TrendingEntry>) {
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = entries;
    }

    /// Number of countries known
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no charts are loaded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrendingSource for TrendingCatalog {
    fn entries(&self) -> Vec<TrendingEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
