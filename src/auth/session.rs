//! Per-(user, tenant) session contexts.
//!
//! A `SessionContext` is built once from the stored profile role and explicit
//! permission rows, then handed to handlers and services as an `Arc`. Refreshing
//! swaps the `Arc` held by the registry; contexts already handed out stay valid
//! and unchanged.

use super::permissions::{Permission, PermissionSet};
use super::rbac::{AccessPolicy, PermissionEvaluator, Role};
use crate::entities::{user_permission, user_profile};
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Authenticated caller threaded explicitly through every handler
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub tenant_id: String,
    pub loaded_at: DateTime<Utc>,
    evaluator: PermissionEvaluator,
}

impl SessionContext {
    pub fn new(
        user_id: Uuid,
        tenant_id: impl Into<String>,
        role: Role,
        permissions: Vec<Permission>,
    ) -> Self {
        Self {
            user_id,
            tenant_id: tenant_id.into(),
            loaded_at: Utc::now(),
            evaluator: PermissionEvaluator::new(role, Arc::new(PermissionSet::new(permissions))),
        }
    }

    pub fn role(&self) -> Role {
        self.evaluator.role()
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.evaluator.has_permission(resource, action)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.evaluator.has_role(role)
    }

    /// True once the snapshot is older than `ttl`
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.loaded_at).to_std() {
            Ok(age) => age > ttl,
            Err(_) => false,
        }
    }

    /// Composed gate used at call sites; see [`AccessPolicy`]
    pub fn can_perform(&self, resource: &str, action: &str) -> bool {
        AccessPolicy::can_perform(&self.evaluator, resource, action)
    }

    pub fn require(&self, resource: &str, action: &str) -> Result<(), ServiceError> {
        AccessPolicy::ensure(&self.evaluator, resource, action)
    }
}

/// Where roles and permission rows come from
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn load_role(&self, user_id: Uuid) -> Result<Option<Role>, ServiceError>;

    async fn load_permissions(
        &self,
        user_id: Uuid,
        tenant_id: &str,
    ) -> Result<Vec<Permission>, ServiceError>;
}

/// Reads `user_profiles` and `user_permissions`
#[derive(Clone)]
pub struct SeaOrmPermissionSource {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmPermissionSource {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionSource for SeaOrmPermissionSource {
    async fn load_role(&self, user_id: Uuid) -> Result<Option<Role>, ServiceError> {
        let profile = user_profile::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(profile.map(|p| Role::from_stored(&p.role)))
    }

    async fn load_permissions(
        &self,
        user_id: Uuid,
        tenant_id: &str,
    ) -> Result<Vec<Permission>, ServiceError> {
        let rows = user_permission::Entity::find()
            .filter(user_permission::Column::UserId.eq(user_id))
            .filter(user_permission::Column::TenantId.eq(tenant_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(900);

/// Caches one session per (user, tenant).
///
/// Entries older than the TTL are reloaded on next use, and every load sweeps
/// out stale entries for other callers so the map stays bounded by the number
/// of sessions active within one TTL.
pub struct SessionRegistry {
    source: Arc<dyn PermissionSource>,
    sessions: DashMap<(Uuid, String), Arc<SessionContext>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(source: Arc<dyn PermissionSource>) -> Self {
        Self {
            source,
            sessions: DashMap::new(),
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the cached session, loading it on first use (login or tenant
    /// switch) or once the cached one has gone stale
    pub async fn session_for(
        &self,
        user_id: Uuid,
        tenant_id: &str,
    ) -> Result<Arc<SessionContext>, ServiceError> {
        let key = (user_id, tenant_id.to_string());
        if let Some(existing) = self.sessions.get(&key).map(|entry| entry.value().clone()) {
            if !existing.is_stale(self.ttl, Utc::now()) {
                return Ok(existing);
            }
        }

        self.refresh(user_id, tenant_id).await
    }

    /// Reloads role and permissions and replaces the cached session wholesale
    #[instrument(skip(self))]
    pub async fn refresh(
        &self,
        user_id: Uuid,
        tenant_id: &str,
    ) -> Result<Arc<SessionContext>, ServiceError> {
        let role = self.source.load_role(user_id).await?.ok_or_else(|| {
            ServiceError::Unauthorized(format!("no profile for user {}", user_id))
        })?;
        let permissions = self.source.load_permissions(user_id, tenant_id).await?;
        debug!(
            role = %role,
            permission_count = permissions.len(),
            "Loaded session permissions"
        );

        let evicted = self.evict_stale();
        let session = Arc::new(SessionContext::new(user_id, tenant_id, role, permissions));
        self.sessions
            .insert((user_id, tenant_id.to_string()), session.clone());
        info!(%user_id, tenant_id, evicted, "Session context loaded");

        Ok(session)
    }

    /// Drops the cached session so the next request reloads it
    pub fn invalidate(&self, user_id: Uuid, tenant_id: &str) {
        self.sessions.remove(&(user_id, tenant_id.to_string()));
    }

    pub fn cached_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn evict_stale(&self) -> usize {
        let before = self.sessions.len();
        let now = Utc::now();
        self.sessions
            .retain(|_, session| !session.is_stale(self.ttl, now));
        before.saturating_sub(self.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        role: Option<Role>,
        permissions: Mutex<Vec<Permission>>,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl PermissionSource for FakeSource {
        async fn load_role(&self, _user_id: Uuid) -> Result<Option<Role>, ServiceError> {
            Ok(self.role)
        }

        async fn load_permissions(
            &self,
            _user_id: Uuid,
            _tenant_id: &str,
        ) -> Result<Vec<Permission>, ServiceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.permissions.lock().unwrap().clone())
        }
    }

    fn source(role: Option<Role>, permissions: Vec<Permission>) -> Arc<FakeSource> {
        Arc::new(FakeSource {
            role,
            permissions: Mutex::new(permissions),
            loads: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn sessions_are_loaded_once_per_user_and_tenant() {
        let fake = source(Some(Role::User), vec![Permission::grant("orders", "read")]);
        let registry = SessionRegistry::new(fake.clone());
        let user = Uuid::new_v4();

        let first = registry.session_for(user, "acme").await.unwrap();
        let second = registry.session_for(user, "acme").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fake.loads.load(Ordering::SeqCst), 1);

        registry.session_for(user, "globex").await.unwrap();
        assert_eq!(fake.loads.load(Ordering::SeqCst), 2);
        assert_eq!(registry.cached_sessions(), 2);
    }

    #[tokio::test]
    async fn refresh_replaces_without_touching_held_snapshots() {
        let fake = source(Some(Role::User), vec![]);
        let registry = SessionRegistry::new(fake.clone());
        let user = Uuid::new_v4();

        let before = registry.session_for(user, "acme").await.unwrap();
        assert!(!before.can_perform("orders", "read"));

        fake.permissions
            .lock()
            .unwrap()
            .push(Permission::grant("orders", "read"));
        let after = registry.refresh(user, "acme").await.unwrap();

        assert!(after.can_perform("orders", "read"));
        assert!(!before.can_perform("orders", "read"));
        let current = registry.session_for(user, "acme").await.unwrap();
        assert!(Arc::ptr_eq(&after, &current));
    }

    #[tokio::test]
    async fn missing_profile_is_unauthorized() {
        let registry = SessionRegistry::new(source(None, vec![]));
        let err = registry
            .session_for(Uuid::new_v4(), "acme")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let fake = source(Some(Role::Manager), vec![]);
        let registry = SessionRegistry::new(fake.clone());
        let user = Uuid::new_v4();

        registry.session_for(user, "acme").await.unwrap();
        registry.invalidate(user, "acme");
        assert_eq!(registry.cached_sessions(), 0);
        registry.session_for(user, "acme").await.unwrap();
        assert_eq!(fake.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_sessions_reload_and_are_evicted() {
        let fake = source(Some(Role::User), vec![]);
        let registry = SessionRegistry::new(fake.clone()).with_ttl(Duration::ZERO);
        let ada = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let first = registry.session_for(ada, "acme").await.unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = registry.session_for(ada, "acme").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fake.loads.load(Ordering::SeqCst), 2);

        std::thread::sleep(Duration::from_millis(5));
        registry.session_for(bob, "acme").await.unwrap();
        // Ada's entry went stale and was swept when Bob's loaded
        assert_eq!(registry.cached_sessions(), 1);
    }

    #[test]
    fn fresh_snapshot_is_not_stale() {
        let session = SessionContext::new(Uuid::new_v4(), "acme", Role::User, vec![]);
        let now = session.loaded_at;
        assert!(!session.is_stale(DEFAULT_SESSION_TTL, now));
        assert!(!session.is_stale(DEFAULT_SESSION_TTL, now - chrono::Duration::seconds(5)));
        assert!(session.is_stale(DEFAULT_SESSION_TTL, now + chrono::Duration::seconds(901)));
    }
}
