//! Environment overrides for the settings file
//!
//! Kept in its own test binary because it mutates the process environment.

use camino::Utf8PathBuf;
use image_clicker::ConfigManager;
use image_clicker::models::MoveMode;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_environment_overrides_file_values() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(
        manager.user_config_path(),
        "settings:\n  threshold: 0.85\n  move_mode: smooth\n",
    )
    .unwrap();

    // Only test in this binary, nothing else reads the environment concurrently
    unsafe {
        std::env::set_var("IMAGE_CLICKER_SETTINGS__THRESHOLD", "0.95");
        std::env::set_var("IMAGE_CLICKER_SETTINGS__MOVE_MODE", "instant");
    }

    let config = manager.load_user_config().unwrap();

    unsafe {
        std::env::remove_var("IMAGE_CLICKER_SETTINGS__THRESHOLD");
        std::env::remove_var("IMAGE_CLICKER_SETTINGS__MOVE_MODE");
    }

    assert_eq!(config.settings.threshold, 0.95);
    assert_eq!(config.settings.move_mode, MoveMode::Instant);
}
