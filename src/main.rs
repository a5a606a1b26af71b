// Solar Forecast API v0.1
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::AppState;
use services::auth::AuthClient;
use services::cache::ForecastCache;
use services::ingest::MAX_UPLOAD_BYTES;
use services::nominatim::NominatimClient;
use services::rate_limit::RateLimiter;
use services::solcast::SolcastClient;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Solar Forecast API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Solar Forecast API",
        version = "0.1.0",
        description = "Solar energy forecasting and prediction API. Proxies and caches a \
            rate-limited radiation forecast provider, proxies a geocoding service, ingests \
            weather and production telemetry uploads (CSV/XLSX/PDF), and trains and serves \
            a regression model for energy output prediction.",
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Auth", description = "Authentication"),
        (name = "Forecast", description = "Solar radiation forecast proxy"),
        (name = "Geocode", description = "Location search proxy"),
        (name = "Uploads", description = "Telemetry and image uploads"),
        (name = "Predictions", description = "Energy output predictions"),
        (name = "Training", description = "Model training"),
        (name = "Dashboard", description = "Aggregate statistics"),
    ),
    paths(
        routes::health::health_status,
        routes::auth::login,
        routes::forecast::get_solar_forecast,
        routes::geocode::search_locations,
        routes::uploads::upload_weather,
        routes::uploads::upload_production,
        routes::uploads::upload_images,
        routes::predictions::hourly_predictions,
        routes::predictions::daily_predictions,
        routes::training::start_training,
        routes::training::training_status,
        routes::dashboard::dashboard_stats,
    ),
    components(
        schemas(
            errors::ErrorResponse,
            routes::health::HealthResponse,
            routes::auth::LoginRequest,
            routes::auth::LoginResponse,
            routes::geocode::GeocodeSearchResponse,
            routes::uploads::UploadResponse,
            routes::uploads::UploadedImage,
            routes::uploads::ImageUploadResponse,
            routes::predictions::PredictionRecord,
            routes::training::TrainingRequest,
            routes::training::TrainingResponse,
            routes::dashboard::DashboardStats,
            services::auth::AuthenticatedUser,
            services::forecast::ForecastPayload,
            services::forecast::LocationInfo,
            services::forecast::CurrentConditions,
            services::forecast::HourlyForecastEntry,
            services::forecast::DailyEnergySummary,
            services::forecast::CacheInfo,
            services::nominatim::GeocodeMatch,
            services::nominatim::LocationMeta,
            services::predictor::WeatherFeatureSnapshot,
            services::trainer::TrainingOutcome,
            db::models::Prediction,
            db::models::ModelVersion,
            db::models::TrainingJob,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solar_forecast_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Media and model artifact directories
    std::fs::create_dir_all(&config.media_root).expect("Failed to create media root");
    std::fs::create_dir_all(&config.models_dir).expect("Failed to create models directory");

    // External service clients. The geocoding rate limiter is shared
    // process-wide — it is the single throttle for the provider.
    let limiter = Arc::new(RateLimiter::from_seconds(config.nominatim_rate_limit_seconds));
    let nominatim = NominatimClient::new(
        &config.nominatim_base_url,
        &config.nominatim_user_agent,
        &config.nominatim_email,
        limiter,
    );
    let solcast = SolcastClient::new(
        &config.solcast_base_url,
        &config.solcast_api_key,
        config.solcast_max_hours,
    );
    let auth = AuthClient::new(&config.auth_base_url, &config.auth_api_key);
    let cache = Arc::new(ForecastCache::new(config.solcast_cache_ttl_seconds));

    if config.solcast_base_url.is_empty() {
        tracing::warn!("SOLCAST_BASE_URL not set — forecast requests will fail");
    }
    if config.nominatim_base_url.is_empty() {
        tracing::warn!("NOMINATIM_BASE_URL not set — location metadata will be null");
    }

    let app_state = AppState {
        pool,
        cache,
        solcast,
        nominatim,
        auth,
        media_root: config.media_root.clone().into(),
        models_dir: config.models_dir.clone().into(),
    };

    // CORS — browser dashboard reads and uploads
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Upload routes carry a raised body limit (20 MB files plus
    // multipart framing overhead).
    let upload_routes = Router::new()
        .route("/api/v1/upload/weather", post(routes::uploads::upload_weather))
        .route(
            "/api/v1/upload/production",
            post(routes::uploads::upload_production),
        )
        .route("/api/v1/upload/images", post(routes::uploads::upload_images))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024));

    let api_routes = Router::new()
        .route("/api/v1/health/status", get(routes::health::health_status))
        .route("/api/v1/auth/login", post(routes::auth::login))
        .route(
            "/api/v1/forecast/solar",
            get(routes::forecast::get_solar_forecast),
        )
        .route(
            "/api/v1/geocode/search",
            get(routes::geocode::search_locations),
        )
        .route(
            "/api/v1/predictions/hourly",
            get(routes::predictions::hourly_predictions),
        )
        .route(
            "/api/v1/predictions/daily",
            get(routes::predictions::daily_predictions),
        )
        .route("/api/v1/training", post(routes::training::start_training))
        .route(
            "/api/v1/training/status",
            get(routes::training::training_status),
        )
        .route(
            "/api/v1/dashboard/stats",
            get(routes::dashboard::dashboard_stats),
        );

    let app = Router::new()
        .merge(api_routes)
        .merge(upload_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(app_state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
