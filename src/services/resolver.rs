// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resolve an activity id into the key a remote call must use.
//!
//! Every mutation goes through [`EntityResolver::resolve`]; nothing else
//! derives remote keys. Entity lookups are cached until the next snapshot.

use crate::error::Result;
use crate::services::remote::{Addressing, RemoteKey, RemoteService};
use dashmap::DashMap;

/// Outcome of a key lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(RemoteKey),
    NotFound,
}

/// Cached activity-id → entity-key resolution.
#[derive(Default)]
pub struct EntityResolver {
    /// Entity keys found by lookup, keyed by activity id.
    cache: DashMap<String, RemoteKey>,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `activity_id` for a call that expects `addressing`.
    ///
    /// Errors only when the entity listing itself cannot be fetched.
    pub async fn resolve(
        &self,
        remote: &dyn RemoteService,
        activity_id: &str,
        addressing: Addressing,
    ) -> Result<Resolution> {
        match addressing {
            Addressing::ById => Ok(Resolution::Found(RemoteKey(activity_id.to_string()))),
            Addressing::EntityLookup => {
                if let Some(key) = self.cache.get(activity_id) {
                    return Ok(Resolution::Found(key.clone()));
                }

                let entities = remote.list_entities().await?;
                let found = entities
                    .into_iter()
                    .find(|e| e.represents(activity_id))
                    .map(|e| RemoteKey(e.entity_id));

                match found {
                    Some(key) => {
                        tracing::debug!(activity_id, entity_id = %key, "Resolved entity key");
                        self.cache.insert(activity_id.to_string(), key.clone());
                        Ok(Resolution::Found(key))
                    }
                    None => {
                        tracing::debug!(activity_id, "No entity represents activity");
                        Ok(Resolution::NotFound)
                    }
                }
            }
        }
    }

    /// Forget every cached key (entity ids may change between snapshots).
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    pub fn cached(&self, activity_id: &str) -> Option<RemoteKey> {
        self.cache.get(activity_id).map(|k| k.clone())
    }
}
