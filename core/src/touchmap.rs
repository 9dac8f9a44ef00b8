//! Name-indexed snapshot of the server's action catalog.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{Action, ActionRef, MenuItem, SearchResult, TouchmapResponse};

/// One complete touchmap snapshot. Built in full from a response and never
/// mutated afterwards; a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchmapCache {
    actions: HashMap<String, Action>,
    menu: Vec<MenuItem>,
    refresh_time: DateTime<Utc>,
}

impl TouchmapCache {
    /// Index `response` by action name and resolve its service items.
    ///
    /// A later action with a duplicate name replaces the earlier one. Service
    /// items whose action name is not in the catalog are dropped.
    pub fn from_response(response: TouchmapResponse, refresh_time: DateTime<Utc>) -> Self {
        let actions: HashMap<String, Action> = response
            .actions
            .into_iter()
            .map(|action| (action.name.clone(), action))
            .collect();

        let menu = response
            .service_items
            .into_iter()
            .filter_map(|item| {
                actions.get(&item.action).map(|action| MenuItem {
                    action: action.clone(),
                    extra: item.extra,
                })
            })
            .collect();

        Self {
            actions,
            menu,
            refresh_time,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn menu(&self) -> &[MenuItem] {
        &self.menu
    }

    pub fn refresh_time(&self) -> DateTime<Utc> {
        self.refresh_time
    }

    /// Whether the snapshot is older than `ttl` at `now`. Without a TTL the
    /// snapshot never goes stale.
    pub fn is_stale(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.refresh_time >= ttl,
            Err(_) => false,
        }
    }

    /// Replace bare action names in `result` with their cached `Action`.
    /// Returns the number of references resolved; unknown names are left as
    /// strings.
    pub fn resolve(&self, result: &mut SearchResult) -> usize {
        let mut resolved = 0;
        for entry in &mut result.results {
            let Some(ActionRef::Unresolved(name)) = &entry.action else {
                continue;
            };
            if let Some(action) = self.actions.get(name) {
                entry.action = Some(ActionRef::Resolved(action.clone()));
                resolved += 1;
            }
        }
        resolved
    }
}
