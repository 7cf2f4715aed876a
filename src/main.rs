//! Fusion credential server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use fusion_server::api;
use fusion_server::config::Config;
use fusion_server::db::{self, postgres::PgStore, SharedStore};
use fusion_server::middleware::RequestLogger;
use fusion_server::migration::Migrator;
use fusion_server::services::cleanup::{start_cleanup_task, CleanupConfig};
use fusion_server::services::email::Mailer;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL, FUSION_ADMIN_EMAIL_DOMAIN and SMTP_HOST must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Fusion Credential Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        if config.smtp.is_none() {
            warn!("SMTP not configured; admin login codes will be logged, not emailed");
        }
    }

    // Connect to PostgreSQL and run migrations
    let conn = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    info!("Database connection established");

    Migrator::up(&conn, None)
        .await
        .expect("Failed to run migrations");
    info!("Database migrations complete");

    let store: SharedStore = Arc::new(PgStore::new(conn));

    // Outbound HTTP client for webhook deliveries; per-request timeouts are
    // set at the call site
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build HTTP client");

    let mailer = Mailer::new(config.smtp.clone());

    // Start the cleanup background task
    let cleanup_config = CleanupConfig {
        interval_secs: if config.is_development() { 60 } else { 3600 }, // 1 min dev, 1 hour prod
    };
    start_cleanup_task(store.clone(), cleanup_config);
    info!("Cleanup service started");

    let bind_address = config.bind_address();
    let is_development = config.is_development();

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    let openapi = api::ApiDoc::openapi();
    let config_data = web::Data::new(config);
    let store_data = web::Data::new(store);
    let client_data = web::Data::new(http_client);
    let mailer_data = web::Data::new(mailer);

    // Start HTTP server
    HttpServer::new(move || {
        // Every handler answers OPTIONS with permissive CORS headers
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(RequestLogger)
            .app_data(config_data.clone())
            .app_data(store_data.clone())
            .app_data(client_data.clone())
            .app_data(mailer_data.clone())
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_key_routes)
                    .configure(api::configure_webhook_routes)
                    .configure(api::configure_admin_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .workers(worker_count)
    .bind(&bind_address)?
    .run()
    .await
}
