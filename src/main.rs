//! Image Clicker - clicks on reference images when they appear on screen
//!
//! Main entry point for the console application.
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/image_clicker.<date>
//! 2. Create tokio runtime
//! 3. Load `image_clicker.yaml` (plus `IMAGE_CLICKER_*` overrides) into the [`StateManager`]
//! 4. Create the image folder if needed and load the templates
//! 5. Connect screen capture and pointer input, build the [`ClickerService`]
//! 6. Install the global hook for the stop key and drag selection
//! 7. Run the [`ConsoleController`] until 'quit', end of input or Ctrl+C
//! 8. Stop the loop, save settings, log the session metrics
//!
//! # Environment
//!
//! - `IMAGE_CLICKER_CONFIG_DIR`: directory holding the settings file (default: current directory)
//! - `IMAGE_CLICKER_DEBUG=1`: debug-level logging
//! - `RUST_LOG`: overrides the log filter entirely

use anyhow::{Context, Result};
use image_clicker::logging::{DEFAULT_LOG_DIR, DEFAULT_LOG_PREFIX};
use image_clicker::services::{
    ClickerService, EnigoBackend, GlobalInput, TemplateStore, XcapCapture,
};
use image_clicker::ui::ConsoleController;
use image_clicker::{APP_NAME, ConfigManager, Metrics, StateManager, VERSION};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let debug_mode = std::env::var("IMAGE_CLICKER_DEBUG").is_ok_and(|v| v == "1");
    let _guard = image_clicker::logging::setup_logging_with_console(
        DEFAULT_LOG_DIR,
        DEFAULT_LOG_PREFIX,
        debug_mode,
        debug_mode,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("image-clicker-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let metrics = Arc::new(Metrics::new());
    let result = runtime.block_on(run(metrics.clone()));

    runtime.shutdown_timeout(Duration::from_secs(5));
    metrics.log_summary();

    if let Err(ref e) = result {
        tracing::error!("Fatal error: {:#}", e);
    }
    tracing::info!("Application shutdown complete");
    result
}

async fn run(metrics: Arc<Metrics>) -> Result<()> {
    let config_dir = std::env::var("IMAGE_CLICKER_CONFIG_DIR").unwrap_or_else(|_| ".".to_string());
    let config_manager = ConfigManager::new(config_dir.as_str())?;
    let user_config = config_manager.load_user_config()?;

    let state_manager = Arc::new(StateManager::new());
    state_manager.load_from_user_config(&user_config);

    let image_folder = config_manager.ensure_image_folder(&user_config)?;
    let templates = Arc::new(TemplateStore::new());
    match templates.reload(&image_folder) {
        Ok(count) => {
            state_manager.set_template_count(count);
        }
        Err(e) => tracing::warn!("Starting without templates: {}", e),
    }

    let input = EnigoBackend::new().context("Failed to connect to the pointer input subsystem")?;
    let clicker = Arc::new(ClickerService::new(
        state_manager.clone(),
        templates.clone(),
        Arc::new(XcapCapture::new()),
        Box::new(input),
        metrics,
    ));

    let global_input = GlobalInput::new();
    let global_events = global_input.listen();

    tracing::info!("Clicker ready, waiting for console commands");

    ConsoleController::new(state_manager, config_manager, templates, clicker)
        .with_global_input(global_input, global_events)
        .run()
        .await
}
