//! Shared integration test harness.
//!
//! Spins up the full application (services, event loop, router) against an
//! in-memory SQLite database. Each `TestApp` owns its own database, so tests
//! are isolated and can run in parallel.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use autoshop_api::{
    auth::{Principal, Role, USER_ID_HEADER, USER_ROLE_HEADER},
    config::AppConfig,
    db,
    entities::service_definition::ServiceCategory,
    events::{process_events, EventSender},
    handlers::AppServices,
    services::catalog::{CreateServiceDefinitionRequest, ServiceDefinitionResponse},
    AppState,
};

/// Fully wired application instance backed by a private in-memory database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub admin: Principal,
    pub mechanic: Principal,
    pub customer: Principal,
    _event_task: tokio::task::JoinHandle<()>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        );
        // A single pooled connection keeps the in-memory database alive for
        // the lifetime of the app.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Some(Arc::new(event_sender)), &cfg);

        let state = AppState {
            db: db_arc,
            config: cfg,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", autoshop_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            admin: Principal {
                id: Uuid::new_v4(),
                role: Role::Admin,
            },
            mechanic: Principal {
                id: Uuid::new_v4(),
                role: Role::Mechanic,
            },
            customer: Principal {
                id: Uuid::new_v4(),
                role: Role::Customer,
            },
        }
    }

    /// Sends a request through the router, optionally authenticated via the
    /// gateway identity headers.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        principal: Option<&Principal>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(principal) = principal {
            builder = builder
                .header(USER_ID_HEADER, principal.id.to_string())
                .header(USER_ROLE_HEADER, principal.role.to_string());
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request build"),
            None => builder.body(Body::empty()).expect("request build"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request handled")
    }

    pub async fn request_as(
        &self,
        principal: &Principal,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(principal)).await
    }

    /// Inserts a catalog definition through the catalog service.
    pub async fn seed_service(
        &self,
        name: &str,
        category: ServiceCategory,
        price: Decimal,
    ) -> ServiceDefinitionResponse {
        self.state
            .services
            .catalog
            .create_service(
                &self.admin,
                CreateServiceDefinitionRequest {
                    name: name.to_string(),
                    category,
                    sub_category: None,
                    description: None,
                    price,
                },
            )
            .await
            .expect("seed service definition")
    }

    /// Fresh customer identity, for tests exercising per-customer access.
    pub fn another_customer(&self) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: Role::Customer,
        }
    }
}

/// A bookable date safely in the future.
pub fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(1)
}

pub fn in_days(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}
