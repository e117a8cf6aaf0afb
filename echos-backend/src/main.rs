use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

mod ai;
mod config;
mod controllers;
mod db;
mod models;
mod scheduler;
mod twitter;

use ai::{ImgflipMemeGenerator, OpenAiResponseGenerator};
use config::Config;
use controllers::replies::{delivery_cache, DeliveryCache};
use db::Database;
use models::AgentProfile;
use scheduler::{ReplyGuyScheduler, SchedulerConfig};
use twitter::{ReplyGuyAgent, XApiClient};

/// Timeout for every outbound request (Twitter, LLM, Imgflip)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AppState {
    pub agent: Arc<ReplyGuyAgent>,
    pub reply_deliveries: DeliveryCache,
}

impl AppState {
    pub fn new(agent: Arc<ReplyGuyAgent>) -> Self {
        Self {
            agent,
            reply_deliveries: delivery_cache(),
        }
    }
}

fn startup_error(message: String) -> io::Error {
    log::error!("{}", message);
    io::Error::other(message)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    let profile_path = config.profile_path().map_err(startup_error)?;
    log::info!("Loading agent profile from {:?}", profile_path);
    let profile = AgentProfile::load(&profile_path).map_err(startup_error)?;

    log::info!("Initializing database at {}", config.database_url);
    let db = Arc::new(
        Database::new(&config.database_url)
            .map_err(|e| startup_error(format!("Failed to initialize database: {}", e)))?,
    );

    let http_client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| startup_error(format!("HTTP client error: {}", e)))?;

    let credentials = config
        .twitter_credentials
        .clone()
        .ok_or_else(|| startup_error("Twitter credentials are not configured".to_string()))?;
    let twitter = Arc::new(XApiClient::new(http_client.clone(), credentials));

    let llm_api_key = config
        .llm_api_key
        .clone()
        .ok_or_else(|| startup_error("LLM API key is not configured".to_string()))?;
    let generator = Arc::new(OpenAiResponseGenerator::new(
        http_client.clone(),
        config.llm_endpoint.as_deref(),
        &llm_api_key,
        config.llm_model.as_deref(),
    ));
    let memes = Arc::new(ImgflipMemeGenerator::new(
        http_client,
        config.imgflip_username.clone(),
        config.imgflip_password.clone(),
    ));

    let agent = Arc::new(ReplyGuyAgent::new(
        db,
        twitter,
        generator,
        memes,
        profile,
        config.thresholds,
    ));

    let agent_user_id = agent
        .user_id()
        .await
        .map_err(|e| startup_error(format!("Failed to resolve @{}: {}", agent.handle(), e)))?;
    log::info!(
        "Agent {} running as @{} (user {})",
        agent.name(),
        agent.handle(),
        agent_user_id
    );

    let scheduler = Arc::new(ReplyGuyScheduler::new(
        Arc::clone(&agent),
        SchedulerConfig::from_config(&config),
    ));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let scheduler_handle = tokio::spawn(scheduler.start(shutdown_rx));

    log::info!("Starting echos server on port {}", port);

    let server_agent = Arc::clone(&agent);
    let state = web::Data::new(AppState::new(server_agent));
    let result = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config_routes)
            .configure(controllers::checkpoints::config_routes)
            .configure(controllers::replies::config_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await;

    log::info!("HTTP server stopped, shutting down scheduler");
    let _ = shutdown_tx.send(());
    if let Err(e) = scheduler_handle.await {
        log::error!("Scheduler task failed: {}", e);
    }

    result
}
