// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Settlement order repository.
//!
//! Orders are create/update only; there is no delete path. Terminal records
//! are retained as the settlement audit trail.

use super::super::{JsonStorage, StorageError, StorageResult};
use crate::settlement::order::SettlementOrder;

/// Repository for settlement order storage.
pub struct OrderRepository<'a> {
    storage: &'a JsonStorage,
}

impl<'a> OrderRepository<'a> {
    /// Create repository.
    pub fn new(storage: &'a JsonStorage) -> Self {
        Self { storage }
    }

    /// Check if an order exists.
    pub fn exists(&self, order_id: &str) -> bool {
        self.storage.exists(self.storage.paths().order(order_id))
    }

    /// Get an order by ID.
    pub fn get(&self, order_id: &str) -> StorageResult<SettlementOrder> {
        let path = self.storage.paths().order(order_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Order {order_id}")));
        }
        self.storage.read_json(path)
    }

    /// Persist a new order.
    pub fn create(&self, order: &SettlementOrder) -> StorageResult<()> {
        if self.exists(&order.order_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Order {}",
                order.order_id
            )));
        }
        self.storage
            .write_json(self.storage.paths().order(&order.order_id), order)
    }

    /// Update an existing order.
    pub fn update(&self, order: &SettlementOrder) -> StorageResult<()> {
        if !self.exists(&order.order_id) {
            return Err(StorageError::NotFound(format!("Order {}", order.order_id)));
        }
        self.storage
            .write_json(self.storage.paths().order(&order.order_id), order)
    }

    /// Find the order correlated with a provider reference.
    ///
    /// Falls back to an `order_id` lookup because some providers echo our
    /// internal id instead of their own session id.
    pub fn find_by_external_ref(&self, external_ref: &str) -> StorageResult<SettlementOrder> {
        let ids = self
            .storage
            .list_files(self.storage.paths().orders_dir(), "json")?;

        for id in ids {
            if let Ok(order) = self.get(&id) {
                if order.external_payment_ref.as_deref() == Some(external_ref) {
                    return Ok(order);
                }
            }
        }

        self.get(external_ref)
    }

    /// List all orders, newest first.
    pub fn list(&self) -> StorageResult<Vec<SettlementOrder>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().orders_dir(), "json")?;

        let mut orders = Vec::new();
        for id in ids {
            if let Ok(order) = self.get(&id) {
                orders.push(order);
            }
        }

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::order::SettlementMode;
    use crate::storage::StoragePaths;
    use std::env;
    use std::fs;

    fn test_storage() -> JsonStorage {
        let test_dir = env::temp_dir().join(format!("rampline-orders-{}", uuid::Uuid::new_v4()));
        let paths = StoragePaths::new(&test_dir);
        let mut storage = JsonStorage::new(paths);
        storage.initialize().expect("initialize test storage");
        storage
    }

    fn cleanup(storage: &JsonStorage) {
        let _ = fs::remove_dir_all(storage.paths().root());
    }

    fn sample_order(id: &str) -> SettlementOrder {
        SettlementOrder::new_pending(
            id.to_string(),
            "0x00000000000000000000000000000000000000aa".to_string(),
            "USD".to_string(),
            9.6,
            0.005,
            100.0,
            97.0,
            "RMP".to_string(),
            SettlementMode::DirectTransfer,
            0.000_15,
            0.27,
        )
    }

    #[test]
    fn create_and_get_order() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);
        let order = sample_order("ord-1");

        repo.create(&order).expect("create order");
        let loaded = repo.get("ord-1").expect("get order");
        assert_eq!(loaded.order_id, "ord-1");
        assert_eq!(loaded.token_amount, 100.0);

        cleanup(&storage);
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);
        let order = sample_order("ord-1");

        repo.create(&order).expect("first create");
        let err = repo.create(&order).expect_err("duplicate should fail");
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        cleanup(&storage);
    }

    #[test]
    fn find_by_external_ref_matches_provider_session() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);

        let mut order = sample_order("ord-1");
        order.external_payment_ref = Some("mt-session-9".to_string());
        repo.create(&order).expect("create");

        let found = repo
            .find_by_external_ref("mt-session-9")
            .expect("find by ref");
        assert_eq!(found.order_id, "ord-1");

        cleanup(&storage);
    }

    #[test]
    fn find_by_external_ref_falls_back_to_order_id() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);
        repo.create(&sample_order("ord-echoed")).expect("create");

        let found = repo
            .find_by_external_ref("ord-echoed")
            .expect("fallback lookup");
        assert_eq!(found.order_id, "ord-echoed");

        cleanup(&storage);
    }

    #[test]
    fn list_returns_newest_first() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);

        let older = sample_order("ord-old");
        let mut newer = sample_order("ord-new");
        newer.created_at = older.created_at + chrono::Duration::seconds(5);

        repo.create(&older).expect("create older");
        repo.create(&newer).expect("create newer");

        let orders = repo.list().expect("list");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, "ord-new");

        cleanup(&storage);
    }
}
