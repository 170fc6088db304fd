use crate::models::config::ClickerSettings;
use crate::models::geometry::SearchArea;
use camino::Utf8PathBuf;
use std::fmt;

/// Lifecycle of the search-and-click loop.
///
/// `Idle → Running` on start, `Running → Stopping` on stop, and
/// `Stopping → Idle` once the cycle in flight has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl RunState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Running)
                | (RunState::Running, RunState::Stopping)
                | (RunState::Stopping, RunState::Idle)
        )
    }

    pub fn is_active(self) -> bool {
        self != RunState::Idle
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Single source of truth for everything the console and the loop share.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`].
/// The console context writes the search area and settings; the loop context
/// reads a snapshot of them once per cycle and only writes counters and the
/// run state. Never hold the lock across a capture or a mouse movement.
///
/// Templates are not stored here: they live in
/// [`crate::services::TemplateStore`], which swaps whole sets atomically.
#[derive(Clone, Debug)]
pub struct AppState {
    // Loop lifecycle
    pub run_state: RunState,

    // Inputs read by every cycle
    pub search_area: SearchArea,
    pub settings: ClickerSettings,
    pub image_folder: Utf8PathBuf,
    pub template_count: usize,

    // Progress
    pub cycles: u64,
    pub clicks: u64,
    pub last_match: Option<String>,
    pub status_message: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            run_state: RunState::Idle,

            search_area: SearchArea::FullScreen,
            settings: ClickerSettings::default(),
            image_folder: Utf8PathBuf::from(crate::models::config::DEFAULT_IMAGE_FOLDER),
            template_count: 0,

            cycles: 0,
            clicks: 0,
            last_match: None,
            status_message: String::new(),
        }
    }
}

impl AppState {
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Clear per-run counters before a new run starts.
    pub fn reset_run_counters(&mut self) {
        self.cycles = 0;
        self.clicks = 0;
        self.last_match = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle_full_screen() {
        let state = AppState::default();
        assert_eq!(state.run_state, RunState::Idle);
        assert_eq!(state.search_area, SearchArea::FullScreen);
        assert_eq!(state.image_folder, "img");
        assert!(!state.is_running());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(RunState::Idle.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::Stopping));
        assert!(RunState::Stopping.can_transition_to(RunState::Idle));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!RunState::Idle.can_transition_to(RunState::Stopping));
        assert!(!RunState::Idle.can_transition_to(RunState::Idle));
        assert!(!RunState::Running.can_transition_to(RunState::Idle));
        assert!(!RunState::Running.can_transition_to(RunState::Running));
        assert!(!RunState::Stopping.can_transition_to(RunState::Running));
    }

    #[test]
    fn test_reset_run_counters() {
        let mut state = AppState {
            cycles: 12,
            clicks: 3,
            last_match: Some("ok.png".to_string()),
            ..AppState::default()
        };

        state.reset_run_counters();

        assert_eq!(state.cycles, 0);
        assert_eq!(state.clicks, 0);
        assert!(state.last_match.is_none());
    }
}
