#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use stockroom_api::{
    auth::{Role, SessionContext},
    config::{AppConfig, ImportConfig},
    db::{self, DbConfig},
    entities::{category, location, product, user_permission, user_profile},
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "k7Qp2vXr9LmZ4sTw8YbN3cHd6FgJ1aEu";
pub const TENANT: &str = "acme";

/// Application state backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_import_config(ImportConfig::default()).await
    }

    pub async fn with_import_config(import: ImportConfig) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.import = import;
        // In-memory SQLite is per-connection, so the pool must hold exactly one.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_with_config(&DbConfig::from(&cfg))
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = stockroom_api::app(state.clone());

        Self { router, state }
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    pub async fn seed_category(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        category::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed category");
        id
    }

    pub async fn seed_location(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        location::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed location");
        id
    }

    pub async fn seed_product(&self, sku: &str, selling_price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            sku: Set(sku.to_string()),
            name: Set(format!("Product {}", sku)),
            description: Set(None),
            category_id: Set(None),
            selling_price: Set(selling_price),
            cost_price: Set(Decimal::ZERO),
            weight_kg: Set(None),
            status: Set("active".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed product");
        id
    }

    /// Creates a profile with `role` and returns the user id
    pub async fn seed_user(&self, role: Role) -> Uuid {
        let user_id = Uuid::new_v4();
        user_profile::ActiveModel {
            user_id: Set(user_id),
            full_name: Set(Some(format!("Test {}", role))),
            role: Set(role.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed user profile");
        user_id
    }

    pub async fn grant(&self, user_id: Uuid, resource: &str, action: &str) {
        user_permission::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            tenant_id: Set(TENANT.to_string()),
            resource: Set(resource.to_string()),
            action: Set(action.to_string()),
            granted: Set(true),
        }
        .insert(self.db())
        .await
        .expect("seed permission");
    }

    pub async fn session(&self, user_id: Uuid) -> Arc<SessionContext> {
        self.state
            .sessions
            .session_for(user_id, TENANT)
            .await
            .expect("load session")
    }

    /// Seeds an admin profile and loads its session
    pub async fn admin_session(&self) -> Arc<SessionContext> {
        let admin = self.seed_user(Role::Admin).await;
        self.session(admin).await
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth
            .issue_token(user_id, TENANT)
            .expect("issue token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = match body {
            Some(text) => {
                builder = builder.header("content-type", "text/csv");
                Body::from(text)
            }
            None => Body::empty(),
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response is JSON")
}

pub async fn response_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    String::from_utf8(bytes.to_vec()).expect("response is UTF-8")
}
