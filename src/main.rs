mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("database init failed: {0}")]
    Db(#[from] sqlx::Error),
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "whiteboard failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = config::ServerConfig::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;

    // Sign-in is optional: without OAuth settings only the dev bypass works.
    let github = services::auth::GitHubConfig::from_env();
    if github.is_none() {
        tracing::warn!("GitHub OAuth not configured; sign-in disabled");
    }

    let autosave = services::autosave::AutosaveConfig::from_env();
    tracing::info!(
        policy = autosave.default_kind.as_str(),
        idle = ?autosave.idle,
        flush_on_close = autosave.flush_on_close,
        "autosave configured"
    );

    let state = state::AppState::new(pool, github, autosave);
    let app = routes::app(state, &config);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    tracing::info!(port = config.port, static_dir = %config.static_dir.display(), "whiteboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}
