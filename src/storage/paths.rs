// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Path constants and utilities for the persistent storage layout.

use std::path::{Path, PathBuf};

/// Base directory for all persistent data.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory containing all settlement orders.
    pub fn orders_dir(&self) -> PathBuf {
        self.root.join("orders")
    }

    /// Path to a specific settlement order file.
    pub fn order(&self, order_id: &str) -> PathBuf {
        self.orders_dir().join(format!("{order_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_paths_live_under_orders_dir() {
        let paths = StoragePaths::new("/tmp/rampline-test");
        assert_eq!(
            paths.order("ord-1"),
            PathBuf::from("/tmp/rampline-test/orders/ord-1.json")
        );
        assert!(paths.order("ord-1").starts_with(paths.orders_dir()));
    }
}
