use crate::metrics::Metrics;
use crate::models::{ClickerSettings, Point, SearchArea};
use crate::services::capture::{ScreenCapture, frame_origin};
use crate::services::matcher::Matcher;
use crate::services::mouse::{InputBackend, MouseController, Movement};
use crate::services::templates::TemplateStore;
use crate::state::{StateError, StateManager};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What a single capture → match → act pass ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A template reached the threshold and was clicked
    Clicked {
        template: String,
        score: f64,
        target: Point,
    },

    /// The active set is empty, nothing was captured
    NoTemplates,

    /// No template reached the threshold
    NoMatch,

    /// The screen could not be captured
    CaptureFailed,

    /// A match was found but moving or clicking failed
    InputFailed { template: String },
}

impl CycleOutcome {
    /// Delay before the next cycle: the post-click delay after a click,
    /// the idle delay otherwise.
    pub fn delay(&self, settings: &ClickerSettings) -> Duration {
        match self {
            CycleOutcome::Clicked { .. } => settings.post_click_delay(),
            _ => settings.idle_delay(),
        }
    }

    pub fn matched_template(&self) -> Option<&str> {
        match self {
            CycleOutcome::Clicked { template, .. } | CycleOutcome::InputFailed { template } => {
                Some(template)
            }
            _ => None,
        }
    }
}

/// The search-and-click loop.
///
/// Every cycle reads a fresh state snapshot, so edits made from the console
/// take effect on the next cycle. The blocking part of a cycle runs on the
/// blocking thread pool; only the delay between cycles can be cut short.
pub struct ClickerService {
    state: Arc<StateManager>,
    templates: Arc<TemplateStore>,
    capture: Arc<dyn ScreenCapture>,
    matcher: Matcher,
    mouse: Mutex<MouseController<Box<dyn InputBackend>>>,
    metrics: Arc<Metrics>,
}

impl ClickerService {
    pub fn new(
        state: Arc<StateManager>,
        templates: Arc<TemplateStore>,
        capture: Arc<dyn ScreenCapture>,
        input: Box<dyn InputBackend>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            state,
            templates,
            capture,
            matcher: Matcher::new(),
            mouse: Mutex::new(MouseController::new(input)),
            metrics,
        }
    }

    /// Replace the default ZNCC matcher.
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Run one cycle synchronously and record it.
    ///
    /// Blocks for the capture, the matching and the pointer movement.
    pub fn run_cycle(&self) -> CycleOutcome {
        let snapshot = self.state.snapshot();
        let cycle = snapshot.cycles + 1;

        let outcome = self.execute(cycle, &snapshot.settings, &snapshot.search_area);

        self.metrics.record_cycle();
        if !matches!(outcome, CycleOutcome::Clicked { .. }) {
            self.metrics.record_idle_cycle();
        }
        self.state
            .record_cycle(outcome.matched_template().map(str::to_string));

        outcome
    }

    fn execute(
        &self,
        cycle: u64,
        settings: &ClickerSettings,
        area: &SearchArea,
    ) -> CycleOutcome {
        let templates = self.templates.active();
        if templates.is_empty() {
            tracing::debug!("Cycle {}: no templates loaded, skipping capture", cycle);
            return CycleOutcome::NoTemplates;
        }

        let frame = match self.capture.capture(area) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Cycle {}: capture of {} failed: {}", cycle, area, e);
                self.metrics.record_capture_failure();
                return CycleOutcome::CaptureFailed;
            }
        };

        let started = Instant::now();
        let scan = self.matcher.scan(&frame, &templates, settings.threshold);
        self.metrics.record_match_time(started.elapsed());

        for skipped in &scan.skipped {
            tracing::warn!("Cycle {}: skipping template in {}: {}", cycle, area, skipped);
        }

        let Some(found) = scan.best else {
            tracing::debug!("Cycle {}: nothing above {:.2} in {}", cycle, settings.threshold, area);
            return CycleOutcome::NoMatch;
        };

        self.metrics.record_match();
        tracing::info!(
            "Cycle {}: found '{}' (score {:.3}) at {} in {}",
            cycle,
            found.template,
            found.score,
            found.location,
            area
        );

        let movement = Movement::from_settings(settings);
        let result = self
            .mouse
            .lock()
            .unwrap()
            .act(&found, frame_origin(area), movement);

        match result {
            Ok(target) => {
                self.metrics.record_click();
                self.state.record_click(&found.template);
                CycleOutcome::Clicked {
                    template: found.template,
                    score: found.score,
                    target,
                }
            }
            Err(e) => {
                tracing::warn!("Cycle {}: clicking '{}' failed: {}", cycle, found.template, e);
                self.metrics.record_input_failure();
                CycleOutcome::InputFailed {
                    template: found.template,
                }
            }
        }
    }

    /// Cycle until `stop_rx` carries `true` or its sender is dropped.
    ///
    /// The state must already be `Running`. On exit the state is moved
    /// through `Stopping` to `Idle`.
    pub async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        tracing::info!("Clicker loop started");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let service = Arc::clone(&self);
            let delay = match tokio::task::spawn_blocking(move || service.run_cycle()).await {
                Ok(outcome) => self.state.read(|s| outcome.delay(&s.settings)),
                Err(e) => {
                    tracing::error!("Cycle task failed: {}", e);
                    self.state.read(|s| s.settings.idle_delay())
                }
            };

            // A stop during the sleep wakes the loop immediately
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Stop channel closed, ending loop");
                        break;
                    }
                }
            }
        }

        self.finish();
    }

    fn finish(&self) {
        if self.state.read(|s| s.is_running()) {
            let _ = self.state.request_stop();
        }
        if let Err(e) = self.state.mark_idle() {
            tracing::warn!("Loop ended in unexpected state: {}", e);
        }
        tracing::info!("Clicker loop stopped");
    }

    /// Transition to `Running` and spawn the loop on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> Result<ClickerHandle, StateError> {
        self.state.start()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(self).run(stop_rx));

        Ok(ClickerHandle {
            stop_tx,
            task,
            state: Arc::clone(&self.state),
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Handle to a running loop.
pub struct ClickerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    state: Arc<StateManager>,
}

impl ClickerHandle {
    /// Ask the loop to stop after the cycle in flight.
    pub fn stop(&self) {
        if let Err(e) = self.state.request_stop() {
            tracing::debug!("Stop requested twice: {}", e);
        }
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop task to end.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Clicker loop task failed: {}", e);
        }
    }

    /// Stop and wait for the state to reach `Idle`.
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}
