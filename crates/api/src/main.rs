use gijiroku_api::{build_router, state::AppState};
use gijiroku_config::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "gijiroku_api=debug,gijiroku_engine=debug,gijiroku_services=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!(
        "Starting gijiroku API on {}:{}",
        settings.host, settings.port
    );

    std::fs::create_dir_all(&settings.data_dir)?;
    std::fs::create_dir_all(&settings.upload_dir)?;

    let app_state = AppState::from_settings(settings.clone())?;
    app_state.engine.start()?;

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
