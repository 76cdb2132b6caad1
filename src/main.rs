use anyhow::Result;
use tracing::{error, info, warn};
use wandkit::domain::settings::{Settings, SettingsService};
use wandkit::infrastructure::logging;
use wandkit::infrastructure::shutdown::{self, ShutdownSignal};

#[tokio::main]
async fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting WandKit");

    if !settings_service.path().exists() {
        match settings_service.save() {
            Ok(()) => info!("Wrote default settings to {:?}", settings_service.path()),
            Err(e) => warn!("Could not write settings: {}", e),
        }
    }

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(shutdown::listen_for_os_signals(trigger));

    run_wand(&settings, signal).await?;

    info!("Goodbye");
    Ok(())
}

#[cfg(windows)]
async fn run_wand(settings: &Settings, signal: ShutdownSignal) -> Result<()> {
    use wandkit::infrastructure::bluetooth::winrt::WinRtTransport;
    use wandkit::infrastructure::bluetooth::{ServiceConfig, WandService};
    use wandkit::infrastructure::input_simulator::platform_input;

    let mut service = WandService::new(
        WinRtTransport::new(),
        platform_input(),
        ServiceConfig::from(settings),
    );

    if let Err(e) = service.run(signal).await {
        error!("Wand session ended: {}", e);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(not(windows))]
async fn run_wand(_settings: &Settings, _signal: ShutdownSignal) -> Result<()> {
    error!("No Bluetooth backend is available on this platform");
    anyhow::bail!("unsupported platform")
}
