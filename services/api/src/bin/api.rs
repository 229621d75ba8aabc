//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        ElevenLabsTtsAdapter, FsStorageAdapter, GalleryDbAdapter, GeminiCharacterAdapter,
        GeminiClient, GeminiIllustratorAdapter, GeminiOutlineAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        export::{export_html_handler, export_pdf_handler, publish_handler},
        rest::{
            approve_page_handler, confirm_characters_handler, confirm_outline_handler,
            create_session_handler, delete_page_handler, delete_session_handler,
            generate_audiobook_handler, generate_portrait_handler, get_session_handler,
            illustrate_page_handler, update_character_handler, update_page_handler,
            upload_portrait_handler,
        },
        stories::{list_stories_handler, save_story_handler, upload_handler},
        ApiDoc, AppState, SessionStore,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use storybook_core::ports::TextToSpeechService;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let gallery_adapter = Arc::new(GalleryDbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    gallery_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::new();
    let gemini_client = GeminiClient::new(http_client.clone(), config.gemini_api_key.clone());

    let outline_adapter = Arc::new(GeminiOutlineAdapter::new(
        gemini_client.clone(),
        config.outline_model.clone(),
    ));
    let character_adapter = Arc::new(GeminiCharacterAdapter::new(
        gemini_client.clone(),
        config.outline_model.clone(),
    ));
    let illustrator_adapter = Arc::new(GeminiIllustratorAdapter::new(
        gemini_client.clone(),
        config.image_model.clone(),
    ));

    let tts_adapter: Option<Arc<dyn TextToSpeechService>> = match &config.elevenlabs_api_key {
        Some(key) => Some(Arc::new(ElevenLabsTtsAdapter::new(
            http_client.clone(),
            key.clone(),
            config.elevenlabs_voice_id.clone(),
        ))),
        None => {
            info!("No ELEVENLABS_API_KEY set; audiobook narration is disabled.");
            None
        }
    };

    let storage_adapter = Arc::new(
        FsStorageAdapter::new(config.storage_root.clone(), config.public_base_url.clone())
            .await?,
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        sessions: SessionStore::new(),
        outline_adapter,
        character_adapter,
        illustrator_adapter,
        tts_adapter,
        storage_adapter: storage_adapter.clone(),
        gallery_adapter,
    });

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route(
            "/sessions/{id}/pages/{index}",
            put(update_page_handler).delete(delete_page_handler),
        )
        .route("/sessions/{id}/outline/confirm", post(confirm_outline_handler))
        .route(
            "/sessions/{id}/characters/{name}",
            put(update_character_handler),
        )
        .route(
            "/sessions/{id}/characters/{name}/portrait",
            post(upload_portrait_handler),
        )
        .route(
            "/sessions/{id}/characters/{name}/portrait/generate",
            post(generate_portrait_handler),
        )
        .route(
            "/sessions/{id}/characters/confirm",
            post(confirm_characters_handler),
        )
        .route("/sessions/{id}/illustration", post(illustrate_page_handler))
        .route(
            "/sessions/{id}/illustration/approve",
            post(approve_page_handler),
        )
        .route("/sessions/{id}/audiobook", post(generate_audiobook_handler))
        .route("/sessions/{id}/export/pdf", get(export_pdf_handler))
        .route("/sessions/{id}/export/html", get(export_html_handler))
        .route("/sessions/{id}/publish", post(publish_handler))
        .route("/stories", get(list_stories_handler).post(save_story_handler))
        .route("/upload", post(upload_handler))
        // Portraits and page images travel as base64 in JSON bodies.
        .layer(DefaultBodyLimit::max(30 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Serve stored artifacts (published HTML, cover images) directly.
    let files_service = ServeDir::new(&config.storage_root);

    let app = Router::new()
        .merge(api_router)
        .nest_service("/files", files_service)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
