//! Services module - the capture → match → act pipeline.
//!
//! Everything here is free of console code and can be driven from tests
//! with synthetic frames and a fake pointer.
//!
//! # Components
//!
//! - [`TemplateStore`]: scans the image folder and holds the active
//!   [`TemplateSet`], swapped as a whole on reload.
//! - [`RegionSelector`]: turns a drag gesture into a [`SearchRegion`](crate::models::SearchRegion).
//! - [`ScreenCapture`]: grayscale frames of the search area; [`XcapCapture`]
//!   is the `xcap` implementation.
//! - [`Matcher`]: best template location and score through a [`Scorer`],
//!   [`ZnccScorer`] by default.
//! - [`MouseController`]: moves the pointer onto a match and clicks through
//!   an [`InputBackend`]; [`EnigoBackend`] drives the real pointer.
//! - [`GlobalInput`]: desktop-wide `rdev` hook feeding the stop key and
//!   drag selection as [`GlobalEvent`]s.
//! - [`ClickerService`]: the loop tying the above together, started with
//!   [`ClickerService::spawn`] and stopped through its [`ClickerHandle`].
//!
//! # Threading
//!
//! The loop is a tokio task. Each cycle's capture, matching and pointer
//! movement are blocking and run under `spawn_blocking`; only the delay
//! between cycles is raced against the stop signal. Matching spreads its
//! search over the `rayon` pool.

pub mod capture;
pub mod clicker;
pub mod hotkeys;
pub mod matcher;
pub mod mouse;
pub mod region;
pub mod templates;

pub use capture::{CaptureError, ScreenCapture, XcapCapture};
pub use clicker::{ClickerHandle, ClickerService, CycleOutcome};
pub use hotkeys::{GlobalEvent, GlobalInput};
pub use matcher::{MatchError, MatchResult, Matcher, Scan, Scorer, ZnccScorer};
pub use mouse::{EnigoBackend, InputBackend, InputError, MouseController, Movement};
pub use region::{RegionSelector, SelectionOutcome, SelectorState};
pub use templates::{LoadError, Template, TemplateSet, TemplateStore};
