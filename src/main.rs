use heart_rate_bridge::application::ServiceCoordinator;
use heart_rate_bridge::console;
use heart_rate_bridge::domain::settings::SettingsService;
use heart_rate_bridge::infrastructure::{bluetooth, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    tracing::info!("Starting Heart Rate Bridge");
    tracing::debug!("Settings loaded from {}", settings_service.path().display());

    let coordinator = ServiceCoordinator::from_settings(
        bluetooth::platform_radio(),
        settings_service.get(),
    );

    console::run(&coordinator).await?;

    tracing::info!("Heart Rate Bridge exited");
    Ok(())
}
