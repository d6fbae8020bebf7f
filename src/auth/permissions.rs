/*!
 * # Permissions Module
 *
 * Explicit `(resource, action)` permission tuples as stored per user and tenant.
 * A `PermissionSet` is immutable once built; sessions replace it wholesale.
 */

use crate::entities::user_permission;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const APPROVE: &'static str = "approve";
    pub const MANAGE: &'static str = "manage";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const PRODUCTS: &'static str = "products";
    pub const INVENTORY: &'static str = "inventory";
    pub const ORDERS: &'static str = "orders";
}

/// Format a permission string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// One stored permission row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
    pub granted: bool,
}

impl Permission {
    pub fn grant(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            granted: true,
        }
    }

    pub fn deny(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            granted: false,
        }
    }
}

impl From<user_permission::Model> for Permission {
    fn from(model: user_permission::Model) -> Self {
        Self {
            resource: model.resource,
            action: model.action,
            granted: model.granted,
        }
    }
}

/// Immutable set of permission tuples for one (user, tenant)
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    entries: Vec<Permission>,
    grants: HashSet<(String, String)>,
}

impl PermissionSet {
    pub fn new(entries: Vec<Permission>) -> Self {
        let grants = entries
            .iter()
            .filter(|p| p.granted)
            .map(|p| (p.resource.clone(), p.action.clone()))
            .collect();
        Self { entries, grants }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// True iff some tuple matches `(resource, action, granted = true)` exactly.
    /// No wildcards, no hierarchy.
    pub fn contains_grant(&self, resource: &str, action: &str) -> bool {
        self.grants
            .contains(&(resource.to_string(), action.to_string()))
    }

    pub fn entries(&self) -> &[Permission] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
