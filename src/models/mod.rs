//! Data models for the image clicker.
//!
//! - [`AppState`]: shared runtime state (run state, search area, settings snapshot, counters)
//! - [`RunState`]: the `Idle → Running → Stopping → Idle` lifecycle of the loop
//! - [`UserConfig`]: settings file contents (`image_clicker.yaml`)
//! - [`SearchArea`] / [`SearchRegion`] / [`Point`]: screen geometry

pub mod app_state;
pub mod config;
pub mod geometry;

pub use app_state::{AppState, RunState};
pub use config::{ClickerSettings, Language, MoveMode, PathSettings, UserConfig};
pub use geometry::{Point, SearchArea, SearchRegion};
