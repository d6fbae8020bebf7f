/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Roles, the permission evaluator, and the access policy that composes
 * explicit grants with role shortcuts.
 */

use super::permissions::{format_permission, Actions, PermissionSet};
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

/// Single role attached to a user profile
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    /// Parses a stored role, falling back to the least privileged role.
    pub fn from_stored(value: &str) -> Self {
        Role::from_str(value.trim()).unwrap_or_else(|_| {
            warn!("Unknown role '{}', treating as 'user'", value);
            Role::User
        })
    }
}

/// Actions a manager may perform without an explicit grant
pub const BASIC_CRUD_ACTIONS: [&str; 4] = [
    Actions::CREATE,
    Actions::READ,
    Actions::UPDATE,
    Actions::DELETE,
];

/// Answers permission and role questions from in-memory state only
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    role: Role,
    permissions: Arc<PermissionSet>,
}

impl PermissionEvaluator {
    pub fn new(role: Role, permissions: Arc<PermissionSet>) -> Self {
        Self { role, permissions }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Exact match against the explicit permission tuples
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.permissions.contains_grant(resource, action)
    }

    /// Exact match against the profile's single role
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Access policy: explicit grant, OR admin, OR manager performing basic CRUD.
///
/// Managers with no permission rows can still create, read, update and delete
/// anything, but never `approve` or `manage` without a grant.
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn can_perform(evaluator: &PermissionEvaluator, resource: &str, action: &str) -> bool {
        evaluator.has_permission(resource, action)
            || evaluator.has_role(Role::Admin)
            || (evaluator.has_role(Role::Manager) && BASIC_CRUD_ACTIONS.contains(&action))
    }

    /// Same as [`AccessPolicy::can_perform`], as a `Forbidden` error on denial
    pub fn ensure(
        evaluator: &PermissionEvaluator,
        resource: &str,
        action: &str,
    ) -> Result<(), ServiceError> {
        if Self::can_perform(evaluator, resource, action) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "missing permission {}",
                format_permission(resource, action)
            )))
        }
    }
}
