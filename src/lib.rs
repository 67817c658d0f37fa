// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity Manager: keeps recurring chores in sync with Home Assistant
//!
//! This crate mirrors the remote activity collection, derives due and
//! overdue status, and applies user changes optimistically with rollback.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{ActivityStore, MutationCoordinator, PushChannel, RemoteService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<ActivityStore>,
    pub coordinator: MutationCoordinator,
    pub push: PushChannel,
}

impl AppState {
    /// Wire a store and coordinator around `remote`. Nothing is fetched yet.
    pub fn new(config: Config, remote: Arc<dyn RemoteService>) -> Self {
        let store = Arc::new(ActivityStore::new(remote));
        let coordinator = MutationCoordinator::new(Arc::clone(&store));
        Self {
            config,
            store,
            coordinator,
            push: PushChannel::new(),
        }
    }
}
