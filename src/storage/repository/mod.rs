// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Repository layer over JSON storage.

pub mod orders;

pub use orders::OrderRepository;
