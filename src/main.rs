use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use hostelpay_backend::api::bookings::{self, BookingsState};
use hostelpay_backend::api::callbacks::{self, CallbackState};
use hostelpay_backend::api::payments::{self, PaymentsState};
use hostelpay_backend::config::AppConfig;
use hostelpay_backend::database::booking_repository::BookingRepository;
use hostelpay_backend::database::payment_repository::PaymentRepository;
use hostelpay_backend::database::room_repository::RoomRepository;
use hostelpay_backend::database::{init_pool, PoolConfig};
use hostelpay_backend::health::{health_handler, HealthChecker};
use hostelpay_backend::logging::init_tracing;
use hostelpay_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use hostelpay_backend::payments::DarajaClient;
use hostelpay_backend::services::booking_admission::{AdmissionConfig, BookingAdmissionService};
use hostelpay_backend::services::payment_orchestrator::PaymentOrchestrator;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting hostelpay backend service"
    );

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!("📊 Initializing database connection pool...");
    let pool = init_pool(
        &config.database.url,
        Some(PoolConfig::from_database_config(&config.database)),
    )
    .await
    .map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!("✅ Database connection pool initialized");

    let rooms = Arc::new(RoomRepository::new(pool.clone()));
    let bookings_repo = Arc::new(BookingRepository::new(pool.clone()));
    let payments_repo = Arc::new(PaymentRepository::new(pool.clone()));

    info!("📱 Initializing M-Pesa gateway client...");
    let gateway = Arc::new(DarajaClient::from_env().map_err(|e| {
        error!("Failed to initialize M-Pesa gateway client: {}", e);
        anyhow::anyhow!(e)
    })?);
    info!(
        base_url = %gateway.config().base_url,
        shortcode = %gateway.config().shortcode,
        "✅ M-Pesa gateway client initialized"
    );

    let admission_config = AdmissionConfig::from_env();
    info!(
        blocking_statuses = ?admission_config.blocking_statuses,
        "Booking admission configured"
    );
    let admission = Arc::new(BookingAdmissionService::new(
        rooms,
        bookings_repo.clone(),
        admission_config,
    ));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        payments_repo,
        bookings_repo,
        gateway,
    ));

    info!("🛣️  Setting up application routes...");
    let booking_routes = Router::new()
        .route(
            "/api/bookings",
            post(bookings::submit_booking).get(bookings::list_bookings),
        )
        .route("/api/bookings/{id}", get(bookings::get_booking))
        .with_state(BookingsState {
            admission: admission.clone(),
        });

    let payment_routes = Router::new()
        .route("/api/payments/initiate", post(payments::initiate_payment))
        .route("/api/payments", get(payments::list_payments))
        .route("/api/payments/{id}", get(payments::get_payment))
        .route("/api/payments/{id}/query", post(payments::query_payment))
        .with_state(PaymentsState {
            orchestrator: orchestrator.clone(),
        });

    let callback_routes = Router::new()
        .route(
            "/api/payments/mpesa/callback",
            post(callbacks::handle_mpesa_callback),
        )
        .with_state(CallbackState { orchestrator });

    let health_routes = Router::new()
        .route("/health", get(health_handler))
        .with_state(HealthChecker::new(pool));

    let app = Router::new()
        .merge(booking_routes)
        .merge(payment_routes)
        .merge(callback_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(axum::middleware::from_fn(request_logging_middleware)),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "✅ Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
