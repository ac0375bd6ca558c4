use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use playhead_api::{
    build_router,
    config::Config,
    repositories::PgConversationRepository,
    services::{ChatService, HealthService, MusicCatalog, SessionStore, SpeechService, TitleGenerator},
    AppState, HealthState,
};
use playhead_apple_music_client::AppleMusicClient;
use playhead_llm_client::LlmClient;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the CORS layer based on configuration.
///
/// In production mode:
/// - If `CORS_ORIGINS` is set, only those origins are allowed
/// - If `CORS_ORIGINS` is not set, CORS requests are rejected (no origins allowed)
///
/// In development mode:
/// - If `CORS_ORIGINS` is set, those origins are used
/// - If `CORS_ORIGINS` is not set, permissive CORS is used for convenience
fn build_cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<_> = origins
                .iter()
                .filter_map(|origin| {
                    origin.parse().ok().or_else(|| {
                        tracing::warn!("Invalid CORS origin '{}', skipping", origin);
                        None
                    })
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::error!("No valid CORS origins configured, CORS requests will be rejected");
                CorsLayer::new()
            } else {
                tracing::info!(
                    "CORS configured with {} allowed origin(s): {:?}",
                    allowed_origins.len(),
                    origins
                );
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PATCH,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
                    .max_age(Duration::from_secs(3600))
            }
        }
        _ if config.is_production() => {
            tracing::warn!(
                "CORS_ORIGINS not configured in production mode. \
                 CORS requests will be rejected. Set CORS_ORIGINS to allow cross-origin requests."
            );
            CorsLayer::new()
        }
        _ => {
            tracing::warn!(
                "Using permissive CORS in development mode. \
                 Set CORS_ORIGINS for production-like behavior."
            );
            CorsLayer::permissive()
        }
    }
}

/// Catalog search is optional; tools fall back to device search without it
fn build_catalog(config: &Config) -> Option<Arc<dyn MusicCatalog>> {
    let apple_music = config.apple_music()?;
    match AppleMusicClient::new(apple_music) {
        Ok(client) => {
            tracing::info!(storefront = %apple_music.storefront, "Apple Music catalog enabled");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Apple Music client creation failed, catalog disabled");
            None
        }
    }
}

fn build_speech(config: &Config) -> Option<SpeechService> {
    let speech = config.speech()?;
    match SpeechService::new(speech.clone()) {
        Ok(service) => {
            tracing::info!(model = %speech.model, "Speech synthesis enabled");
            Some(service)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Speech client creation failed, speech disabled");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playhead_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing::info!("Starting Playhead API server on port {}", config.port);

    tracing::info!("Connecting to database...");
    let database = config.database();
    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .acquire_timeout(database.acquire_timeout())
        .idle_timeout(database.idle_timeout())
        .connect(&database.url)
        .await?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations completed successfully");

    let llm = LlmClient::new(config.llm())?;
    tracing::info!(
        provider = %config.llm().provider,
        model = %config.llm().model,
        "LLM client initialized"
    );

    let titles = TitleGenerator::new(llm.clone(), Duration::from_secs(config.title_timeout_secs));
    let sessions = SessionStore::new(Arc::new(PgConversationRepository::new(pool.clone())))
        .with_title_generator(titles);

    let mut chat = ChatService::new(llm.clone(), sessions)
        .with_history_window(config.chat_history_window);
    if let Some(catalog) = build_catalog(&config) {
        chat = chat.with_catalog(catalog);
    } else {
        tracing::info!("No catalog configured, search is delegated to the device");
    }

    let speech = build_speech(&config);
    if let Some(speech) = &speech {
        chat = chat.with_speech(speech.clone());
    }

    let mut app_state = AppState::new(chat);
    if let Some(speech) = speech {
        app_state = app_state.with_speech(speech);
    }

    let health_state = HealthState::new(HealthService::new(Some(pool), Some(llm)));

    let app = build_router(app_state, health_state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
