//! Application startup and lifecycle management.

use axum::{
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{Config, StoreBackend};
use crate::handlers::{self, payments, stats};
use crate::services::{
    Clock, JwtPrincipalResolver, MemoryStore, MongoStore, PaymentLedger, RecordStore,
    SettingsService, SettingsStore, StatsService, SystemClock,
};
use crate::AppState;

/// Build the HTTP router over an assembled state.
pub fn build_router(state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .server
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Reports
        .route("/stats/rent-status", get(stats::rent_status))
        .route("/stats/income/monthly", get(stats::monthly_income))
        // Settings
        .route(
            "/payments/settings",
            get(payments::get_settings).put(payments::update_settings),
        )
        // Ledger
        .route("/payments/records", post(payments::open_record))
        .route(
            "/payments/records/:tenant_id/:period",
            get(payments::get_record),
        )
        .route(
            "/payments/records/:tenant_id/:period/proof",
            post(payments::submit_proof),
        )
        .route(
            "/payments/records/:tenant_id/:period/confirm",
            post(payments::confirm_payment),
        )
        .route(
            "/payments/records/:tenant_id/:period/note",
            post(payments::annotate_payment),
        )
        .route("/payments/pending", get(payments::pending_payments))
        .route("/payments/pending-count", get(payments::pending_count))
        .route("/payments/my-records", get(payments::my_records))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    principal_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (records, settings_store): (Arc<dyn RecordStore>, Arc<dyn SettingsStore>) =
            match config.store.backend {
                StoreBackend::MongoDb => {
                    let store = MongoStore::connect(
                        config.store.url.expose_secret(),
                        &config.store.db_name,
                    )
                    .await?;

                    store.init_indexes().await.map_err(|e| {
                        tracing::error!("Failed to initialize database indexes: {}", e);
                        AppError::DatabaseError(e)
                    })?;

                    let store = Arc::new(store);
                    (
                        store.clone() as Arc<dyn RecordStore>,
                        store as Arc<dyn SettingsStore>,
                    )
                }
                StoreBackend::Memory => {
                    tracing::warn!("Using in-memory store; payment records will not persist");
                    let store = Arc::new(MemoryStore::new());
                    (
                        store.clone() as Arc<dyn RecordStore>,
                        store as Arc<dyn SettingsStore>,
                    )
                }
            };

        let principals = Arc::new(JwtPrincipalResolver::new(
            &config.auth.jwt_secret,
            config.auth.access_token_expiry_minutes,
        ));

        let state = AppState {
            config: config.clone(),
            ledger: PaymentLedger::new(records.clone(), clock.clone()),
            stats: StatsService::new(records, clock.clone()),
            settings: SettingsService::new(settings_store, clock),
            principals,
        };

        // Port 0 binds a random port for testing
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Invalid listen address {}:{}: {}",
                    config.server.host,
                    config.server.port,
                    e
                ))
            })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, backend = ?config.store.backend, "Rent service bound");

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT or SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!("Listening on port {}", self.port);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
