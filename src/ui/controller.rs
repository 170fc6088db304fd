// Console Controller - drives the clicker from standard input
//
// This module contains the ConsoleController which coordinates between:
// - The console (one command per line on stdin, replies on stdout)
// - GlobalInput (stop key and pointer drags from anywhere on the desktop)
// - RegionSelector (turns drags or corner pairs into a search region)
// - StateManager (search area, settings, run state)
// - ClickerService (the search-and-click loop)
//
// It is the only writer of the search area and the settings while the loop runs.

use crate::config::ConfigManager;
use crate::models::{RunState, SearchArea};
use crate::services::hotkeys::parse_key;
use crate::services::{
    ClickerHandle, ClickerService, GlobalEvent, GlobalInput, RegionSelector, SelectionOutcome,
    SelectorState, TemplateStore,
};
use crate::state::{StateChange, StateManager};
use crate::ui::commands::{Command, DelayKind, HELP};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

/// Reply to one console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    pub quit: bool,
}

impl Reply {
    fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            quit: false,
        }
    }
}

/// Console front-end for the clicker
///
/// # Example
/// ```ignore
/// let controller = ConsoleController::new(state, config_manager, templates, clicker);
/// controller.run().await?; // Returns on 'quit', end of input or Ctrl+C
/// ```
pub struct ConsoleController {
    state_manager: Arc<StateManager>,
    config_manager: ConfigManager,
    templates: Arc<TemplateStore>,
    clicker: Arc<ClickerService>,
    selector: RegionSelector,
    handle: Option<ClickerHandle>,
    global: Option<GlobalInput>,
    global_events: Option<mpsc::UnboundedReceiver<GlobalEvent>>,
}

impl ConsoleController {
    pub fn new(
        state_manager: Arc<StateManager>,
        config_manager: ConfigManager,
        templates: Arc<TemplateStore>,
        clicker: Arc<ClickerService>,
    ) -> Self {
        Self {
            state_manager,
            config_manager,
            templates,
            clicker,
            selector: RegionSelector::new(),
            handle: None,
            global: None,
            global_events: None,
        }
    }

    /// Take the stop key and drag selections from a global input hook
    pub fn with_global_input(
        mut self,
        input: GlobalInput,
        events: mpsc::UnboundedReceiver<GlobalEvent>,
    ) -> Self {
        self.global = Some(input);
        self.global_events = Some(events);
        self
    }

    /// Rescan the image folder into the template store
    pub fn reload_templates(&self) -> String {
        let folder = self
            .config_manager
            .image_folder_path(&self.state_manager.to_user_config());

        match self.templates.reload(&folder) {
            Ok(count) => {
                self.state_manager.set_template_count(count);
                format!("Loaded {} templates from {}", count, folder)
            }
            Err(e) => {
                self.state_manager.set_template_count(0);
                format!("No templates loaded: {}", e)
            }
        }
    }

    /// Apply one command. `Start` must run inside a tokio runtime.
    pub fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::Start => Reply::text(self.start()),
            Command::Stop => Reply::text(self.stop()),
            Command::SelectDrag => Reply::text(self.begin_drag()),
            Command::Select { from, to } => {
                self.selector.begin_selection();
                self.selector.pointer_down(from);
                self.selector.pointer_move(to);
                let outcome = self.selector.pointer_up(to);
                Reply::text(self.finish_selection(outcome))
            }
            Command::Reset => {
                self.set_tracking(false);
                self.selector.reset();
                self.state_manager.set_search_area(SearchArea::FullScreen);
                Reply::text("Searching the full screen")
            }
            Command::Reload => Reply::text(self.reload_templates()),
            Command::Threshold(value) => {
                self.state_manager.update_settings(|s| s.threshold = value);
                Reply::text(format!("Threshold set to {:.2}", value))
            }
            Command::Mode(mode) => {
                self.state_manager.update_settings(|s| s.move_mode = mode);
                Reply::text(format!("Move mode set to {}", mode))
            }
            Command::Delay { kind, seconds } => {
                self.state_manager.update_settings(|s| match kind {
                    DelayKind::PostClick => s.post_click_delay = seconds,
                    DelayKind::Idle => s.idle_delay = seconds,
                    DelayKind::Smooth => s.smooth_duration = seconds,
                    DelayKind::Instant => s.instant_delay = seconds,
                });
                Reply::text(format!("{:?} delay set to {}s", kind, seconds))
            }
            Command::StopKey(key) => {
                self.state_manager.update_settings(|s| s.stop_key = key.clone());
                Reply::text(format!("Stop key set to '{}'", key))
            }
            Command::Status => Reply::text(self.status()),
            Command::Help => Reply::text(HELP),
            Command::Quit => Reply {
                message: "Stopping and saving settings".to_string(),
                quit: true,
            },
        }
    }

    fn start(&mut self) -> String {
        let run_state = self.state_manager.read(|s| s.run_state);
        if run_state != RunState::Idle {
            return format!("Cannot start: loop is {}", run_state);
        }
        if self.is_selecting() {
            return "Cannot start: finish or cancel the region selection first".to_string();
        }

        // Pick up images added since the last scan
        let loaded = self.reload_templates();

        match self.clicker.spawn() {
            Ok(handle) => {
                self.handle = Some(handle);
                let (area, count) = self
                    .state_manager
                    .read(|s| (s.search_area, s.template_count));
                if count == 0 {
                    format!(
                        "{}\nStarted on {} with no templates, nothing will be clicked",
                        loaded, area
                    )
                } else {
                    format!("{}\nStarted: searching {} for {} templates", loaded, area, count)
                }
            }
            Err(e) => format!("Cannot start: {}", e),
        }
    }

    fn stop(&mut self) -> String {
        match &self.handle {
            Some(handle) if self.state_manager.read(|s| s.is_running()) => {
                handle.stop();
                "Stopping after the current cycle".to_string()
            }
            _ => "Not running".to_string(),
        }
    }

    fn is_selecting(&self) -> bool {
        matches!(self.selector.state(), SelectorState::Selecting { .. })
    }

    fn set_tracking(&self, on: bool) {
        if let Some(global) = &self.global {
            global.set_tracking(on);
        }
    }

    fn begin_drag(&mut self) -> String {
        if self.global.is_none() {
            return "Drag selection needs the global input hook; use 'select X1 Y1 X2 Y2'"
                .to_string();
        }
        if self.state_manager.read(|s| s.run_state) != RunState::Idle {
            return "Stop the loop before selecting a region".to_string();
        }

        self.selector.begin_selection();
        self.set_tracking(true);
        let stop_key = self.state_manager.read(|s| s.settings.stop_key.clone());
        format!(
            "Drag with the left mouse button to select the search area, '{}' cancels",
            stop_key
        )
    }

    /// Publish the selector's area and describe how the selection ended
    fn finish_selection(&mut self, outcome: SelectionOutcome) -> String {
        self.set_tracking(false);
        self.state_manager.set_search_area(self.selector.search_area());

        match outcome {
            SelectionOutcome::Committed(region) => format!("Searching {}", region),
            _ => format!(
                "Selection must be larger than {}px each way, still searching {}",
                self.selector.min_size(),
                self.selector.search_area()
            ),
        }
    }

    /// React to desktop-wide input. Returns a line to print, if any.
    pub fn handle_global(&mut self, event: GlobalEvent) -> Option<String> {
        match event {
            GlobalEvent::KeyPressed(key) => {
                let stop_key = self.state_manager.read(|s| s.settings.stop_key.clone());
                if parse_key(&stop_key) != Some(key) {
                    return None;
                }

                if self.is_selecting() {
                    self.selector.cancel_selection();
                    self.set_tracking(false);
                    Some(format!(
                        "Selection cancelled, still searching {}",
                        self.selector.search_area()
                    ))
                } else if self.state_manager.read(|s| s.is_running()) {
                    tracing::info!("Stop key '{}' pressed", stop_key);
                    Some(self.stop())
                } else {
                    None
                }
            }
            GlobalEvent::PointerDown(point) => {
                self.selector.pointer_down(point);
                None
            }
            GlobalEvent::PointerMoved(point) => {
                if let Some(preview) = self.selector.pointer_move(point) {
                    tracing::trace!("Selection preview {}", preview);
                }
                None
            }
            GlobalEvent::PointerUp(point) => {
                if !self.is_selecting() {
                    return None;
                }
                let outcome = self.selector.pointer_up(point);
                Some(self.finish_selection(outcome))
            }
        }
    }

    fn status(&self) -> String {
        let state = self.state_manager.snapshot();
        let settings = &state.settings;
        format!(
            "State: {}\nArea: {}\nTemplates: {} in {}\nThreshold: {:.2}, mode: {}, post-click {}s, idle {}s, stop key: {}\nCycles: {}, clicks: {}, last match: {}",
            state.run_state,
            state.search_area,
            state.template_count,
            state.image_folder,
            settings.threshold,
            settings.move_mode,
            settings.post_click_delay,
            settings.idle_delay,
            settings.stop_key,
            state.cycles,
            state.clicks,
            state.last_match.as_deref().unwrap_or("none")
        )
    }

    /// Stop the loop, wait for it to go idle and save the settings
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            if self.state_manager.read(|s| s.run_state) == RunState::Idle {
                handle.join().await;
            } else {
                handle.shutdown().await;
            }
        }

        self.config_manager
            .save_user_config(&self.state_manager.to_user_config())
            .context("Failed to save settings on exit")
    }

    /// Read commands until 'quit', end of input or Ctrl+C
    pub async fn run(mut self) -> Result<()> {
        println!("{} v{} - type 'help' for commands", crate::APP_NAME, crate::VERSION);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut events = self.state_manager.subscribe();
        let mut global_events = self.global_events.take();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read from stdin")? else {
                        tracing::info!("Console input closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(command) => {
                            tracing::debug!("Console command: {:?}", command);
                            let reply = self.execute(command);
                            println!("{}", reply.message);
                            if reply.quit {
                                break;
                            }
                        }
                        Err(e) => println!("{}", e),
                    }
                }
                event = events.recv() => match event {
                    Ok(StateChange::Clicked { template, total }) => {
                        println!("Clicked '{}' ({} so far)", template, total);
                    }
                    Ok(StateChange::RunStateChanged { to: RunState::Idle, .. }) => println!("Stopped"),
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!("Console skipped {} state events", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
                global = next_global(&mut global_events) => match global {
                    Some(event) => {
                        if let Some(message) = self.handle_global(event) {
                            println!("{}", message);
                        }
                    }
                    None => {
                        tracing::warn!("Global input hook stopped, stop key and drag selection are unavailable");
                        if self.is_selecting() {
                            self.selector.cancel_selection();
                        }
                        global_events = None;
                        self.global = None;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    println!("Interrupted");
                    break;
                }
            }
        }

        self.shutdown().await
    }
}

async fn next_global(
    events: &mut Option<mpsc::UnboundedReceiver<GlobalEvent>>,
) -> Option<GlobalEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
