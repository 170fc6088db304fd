// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the console and the loop.

use crate::models::{AppState, ClickerSettings, RunState, SearchArea, UserConfig};
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events let the console report progress without polling the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The loop lifecycle moved
    RunStateChanged { from: RunState, to: RunState },

    /// A new search area was committed
    SearchAreaChanged(SearchArea),

    /// Settings have been updated
    SettingsChanged,

    /// The template set was rescanned
    TemplatesReloaded { count: usize },

    /// A loop cycle has finished
    CycleCompleted {
        cycle: u64,
        matched: Option<String>,
    },

    /// A click was performed
    Clicked { template: String, total: u64 },

    /// Status line has changed
    StatusChanged { message: String },
}

/// Errors raised by state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Cannot go from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },
}

/// Thread-safe state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Validates [`RunState`] transitions
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// Always use `StateManager` instead of accessing [`AppState`] directly:
/// - [`read()`](Self::read) for reading a few fields under the lock
/// - [`snapshot()`](Self::snapshot) for a per-cycle copy
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// # Related Types
///
/// - [`crate::models::AppState`]: The underlying state structure
/// - [`crate::services::ClickerService`]: Reads a snapshot once per cycle
/// - [`crate::ui::ConsoleController`]: Writes the search area and settings
pub struct StateManager {
    /// The application state protected by RwLock for thread-safe access
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// The broadcast channel buffers 100 events.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Get a copy of the current state
    ///
    /// Safe to hold across blocking work since no lock is kept.
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies `update_fn`, then emits one event per
    /// detected difference. Returns the emitted events.
    ///
    /// # Example
    /// ```ignore
    /// state_manager.update(|state| {
    ///     state.status_message = "Waiting".to_string();
    /// });
    /// ```
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);
        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.run_state != new.run_state {
            changes.push(StateChange::RunStateChanged {
                from: old.run_state,
                to: new.run_state,
            });
        }

        if old.search_area != new.search_area {
            changes.push(StateChange::SearchAreaChanged(new.search_area));
        }

        if old.settings != new.settings || old.image_folder != new.image_folder {
            changes.push(StateChange::SettingsChanged);
        }

        if old.cycles != new.cycles {
            changes.push(StateChange::CycleCompleted {
                cycle: new.cycles,
                matched: new.last_match.clone(),
            });
        }

        if old.clicks != new.clicks {
            changes.push(StateChange::Clicked {
                template: new.last_match.clone().unwrap_or_default(),
                total: new.clicks,
            });
        }

        if old.status_message != new.status_message {
            changes.push(StateChange::StatusChanged {
                message: new.status_message.clone(),
            });
        }

        changes
    }

    /// Move the run state to `next`, rejecting illegal transitions
    fn transition(&self, next: RunState) -> Result<Vec<StateChange>, StateError> {
        let mut result = Ok(());
        let changes = self.update(|state| {
            if state.run_state.can_transition_to(next) {
                state.run_state = next;
            } else {
                result = Err(StateError::InvalidTransition {
                    from: state.run_state,
                    to: next,
                });
            }
        });
        result.map(|_| changes)
    }

    // Convenience methods for common state updates

    /// Idle → Running, clearing the per-run counters
    pub fn start(&self) -> Result<Vec<StateChange>, StateError> {
        let mut result = Ok(());
        let changes = self.update(|state| {
            if state.run_state.can_transition_to(RunState::Running) {
                state.run_state = RunState::Running;
                state.reset_run_counters();
                state.status_message = "Searching".to_string();
            } else {
                result = Err(StateError::InvalidTransition {
                    from: state.run_state,
                    to: RunState::Running,
                });
            }
        });
        result.map(|_| changes)
    }

    /// Running → Stopping
    pub fn request_stop(&self) -> Result<Vec<StateChange>, StateError> {
        self.transition(RunState::Stopping)
    }

    /// Stopping → Idle, once the in-flight cycle has completed
    pub fn mark_idle(&self) -> Result<Vec<StateChange>, StateError> {
        let mut changes = self.transition(RunState::Idle)?;
        changes.extend(self.set_status("Stopped"));
        Ok(changes)
    }

    /// Replace the search area; takes effect on the next cycle
    pub fn set_search_area(&self, area: SearchArea) -> Vec<StateChange> {
        self.update(|state| {
            state.search_area = area;
        })
    }

    /// Apply a settings edit, resetting any out-of-range value to its default
    pub fn update_settings<F>(&self, settings_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ClickerSettings),
    {
        self.update(|state| {
            settings_fn(&mut state.settings);
            for field in state.settings.sanitize() {
                tracing::warn!("Invalid value for '{}', using default", field);
            }
        })
    }

    /// Record the size of a freshly loaded template set
    pub fn set_template_count(&self, count: usize) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.template_count = count;
        });

        let event = StateChange::TemplatesReloaded { count };
        let _ = self.state_tx.send(event.clone());
        changes.push(event);

        changes
    }

    /// Count a finished cycle and the template it matched, if any
    pub fn record_cycle(&self, matched: Option<String>) -> Vec<StateChange> {
        self.update(|state| {
            state.cycles += 1;
            if matched.is_some() {
                state.last_match = matched;
            }
        })
    }

    /// Count a click on `template`
    pub fn record_click(&self, template: &str) -> Vec<StateChange> {
        self.update(|state| {
            state.clicks += 1;
            state.last_match = Some(template.to_string());
        })
    }

    pub fn set_status(&self, message: impl Into<String>) -> Vec<StateChange> {
        let message = message.into();
        self.update(|state| {
            state.status_message = message;
        })
    }

    /// Load configuration from UserConfig
    ///
    /// Copies the image folder and the settings into state. Invalid values
    /// are replaced by defaults.
    pub fn load_from_user_config(&self, user_config: &UserConfig) -> Vec<StateChange> {
        self.update(|state| {
            state.image_folder = Utf8PathBuf::from(&user_config.paths.image_folder);
            state.settings = user_config.settings.clone();
            for field in state.settings.sanitize() {
                tracing::warn!("Invalid value for '{}' in config, using default", field);
            }

            tracing::info!(
                "Loaded user config: image_folder={}, threshold={}, move_mode={}, post_click_delay={}s, idle_delay={}s",
                state.image_folder,
                state.settings.threshold,
                state.settings.move_mode,
                state.settings.post_click_delay,
                state.settings.idle_delay
            );
        })
    }

    /// Current state written back in config form, for saving on exit
    pub fn to_user_config(&self) -> UserConfig {
        self.read(|state| {
            let mut config = UserConfig::default();
            config.paths.image_folder = state.image_folder.to_string();
            config.settings = state.settings.clone();
            config
        })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MoveMode, SearchRegion};

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert_eq!(state.run_state, RunState::Idle);
        assert_eq!(state.search_area, SearchArea::FullScreen);
        assert_eq!(state.cycles, 0);
    }

    #[test]
    fn test_start_stop_cycle() {
        let manager = StateManager::new();

        let changes = manager.start().unwrap();
        assert!(changes.contains(&StateChange::RunStateChanged {
            from: RunState::Idle,
            to: RunState::Running
        }));

        manager.request_stop().unwrap();
        assert_eq!(manager.read(|s| s.run_state), RunState::Stopping);

        manager.mark_idle().unwrap();
        let state = manager.snapshot();
        assert_eq!(state.run_state, RunState::Idle);
        assert_eq!(state.status_message, "Stopped");
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let manager = StateManager::new();
        manager.start().unwrap();

        let err = manager.start().unwrap_err();

        assert_eq!(
            err,
            StateError::InvalidTransition {
                from: RunState::Running,
                to: RunState::Running
            }
        );
    }

    #[test]
    fn test_stop_when_idle_is_rejected() {
        let manager = StateManager::new();
        assert!(manager.request_stop().is_err());
        assert!(manager.mark_idle().is_err());
        assert_eq!(manager.read(|s| s.run_state), RunState::Idle);
    }

    #[test]
    fn test_start_resets_run_counters() {
        let manager = StateManager::new();
        manager.start().unwrap();
        manager.record_cycle(Some("a.png".to_string()));
        manager.record_click("a.png");
        manager.request_stop().unwrap();
        manager.mark_idle().unwrap();

        manager.start().unwrap();

        let state = manager.snapshot();
        assert_eq!(state.cycles, 0);
        assert_eq!(state.clicks, 0);
        assert!(state.last_match.is_none());
    }

    #[test]
    fn test_search_area_change() {
        let manager = StateManager::new();
        let region = SearchRegion::new(10, 20, 300, 200).unwrap();

        let changes = manager.set_search_area(SearchArea::Region(region));

        assert_eq!(changes, vec![StateChange::SearchAreaChanged(SearchArea::Region(region))]);
        assert!(manager.set_search_area(SearchArea::Region(region)).is_empty());
    }

    #[test]
    fn test_update_settings_sanitizes() {
        let manager = StateManager::new();

        let changes = manager.update_settings(|settings| {
            settings.threshold = 3.0;
            settings.move_mode = MoveMode::Instant;
        });

        assert_eq!(changes, vec![StateChange::SettingsChanged]);
        let settings = manager.read(|s| s.settings.clone());
        assert_eq!(settings.threshold, 0.8);
        assert_eq!(settings.move_mode, MoveMode::Instant);
    }

    #[test]
    fn test_template_count_event() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.set_template_count(3);

        assert_eq!(rx.try_recv().unwrap(), StateChange::TemplatesReloaded { count: 3 });
        assert_eq!(manager.read(|s| s.template_count), 3);
    }

    #[test]
    fn test_record_cycle_and_click() {
        let manager = StateManager::new();

        let changes = manager.record_cycle(None);
        assert_eq!(
            changes,
            vec![StateChange::CycleCompleted {
                cycle: 1,
                matched: None
            }]
        );

        let changes = manager.record_click("ok.png");
        assert!(changes.contains(&StateChange::Clicked {
            template: "ok.png".to_string(),
            total: 1
        }));
    }

    #[test]
    fn test_load_and_export_user_config() {
        let manager = StateManager::new();
        let mut config = UserConfig::default();
        config.paths.image_folder = "targets".to_string();
        config.settings.threshold = 0.9;
        config.settings.idle_delay = -1.0;

        manager.load_from_user_config(&config);

        let exported = manager.to_user_config();
        assert_eq!(exported.paths.image_folder, "targets");
        assert_eq!(exported.settings.threshold, 0.9);
        assert_eq!(exported.settings.idle_delay, 0.5);
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.start().unwrap();

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.set_status("Waiting");

        assert_eq!(manager2.snapshot().status_message, "Waiting");
    }
}
