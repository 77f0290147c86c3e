// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! # Storage Module
//!
//! Persistent storage for settlement orders: one JSON document per order
//! under the configured data directory, fronted by a repository.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   orders/
//!     {order_id}.json
//! ```

pub mod fs;
pub mod paths;
pub mod repository;

pub use fs::{JsonStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::OrderRepository;
