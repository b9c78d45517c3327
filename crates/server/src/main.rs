use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfscan_server::{start_server, ApiState, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfscan_server=info,shelfscan_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(
        "strategy {} detector {}",
        settings.strategy,
        settings.pipeline.detector_url
    );

    let state = ApiState::from_settings(&settings)?;
    start_server(&settings.addr, state).await?;

    Ok(())
}
