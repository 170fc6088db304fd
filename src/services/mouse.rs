use crate::models::{ClickerSettings, MoveMode, Point};
use crate::services::matcher::MatchResult;
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Time between two intermediate pointer positions in smooth mode.
pub const SMOOTH_STEP_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on intermediate positions for one smooth movement.
pub const MAX_SMOOTH_STEPS: u32 = 1000;

/// Errors raised by the pointer backend
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to connect to the input subsystem: {0}")]
    Connection(#[from] enigo::NewConError),

    #[error("Pointer input failed: {0}")]
    Dispatch(#[from] enigo::InputError),
}

/// Minimal pointer interface the controller drives.
#[cfg_attr(test, mockall::automock)]
pub trait InputBackend: Send {
    fn cursor_position(&mut self) -> Result<Point, InputError>;
    fn move_to(&mut self, point: Point) -> Result<(), InputError>;
    fn click(&mut self) -> Result<(), InputError>;
}

impl<B: InputBackend + ?Sized> InputBackend for Box<B> {
    fn cursor_position(&mut self) -> Result<Point, InputError> {
        (**self).cursor_position()
    }

    fn move_to(&mut self, point: Point) -> Result<(), InputError> {
        (**self).move_to(point)
    }

    fn click(&mut self) -> Result<(), InputError> {
        (**self).click()
    }
}

/// Operating system pointer via `enigo`.
pub struct EnigoBackend {
    enigo: Enigo,
}

impl EnigoBackend {
    pub fn new() -> Result<Self, InputError> {
        let enigo = Enigo::new(&Settings::default())?;
        Ok(Self { enigo })
    }
}

impl InputBackend for EnigoBackend {
    fn cursor_position(&mut self) -> Result<Point, InputError> {
        let (x, y) = self.enigo.location()?;
        Ok(Point::new(x, y))
    }

    fn move_to(&mut self, point: Point) -> Result<(), InputError> {
        self.enigo.move_mouse(point.x, point.y, Coordinate::Abs)?;
        Ok(())
    }

    fn click(&mut self) -> Result<(), InputError> {
        self.enigo.button(Button::Left, Direction::Click)?;
        Ok(())
    }
}

/// How to get the pointer onto the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Jump straight to the target, wait `click_delay`, click.
    Instant { click_delay: Duration },

    /// Glide along a straight line over `duration`, then click.
    Smooth { duration: Duration },
}

impl Movement {
    pub fn from_settings(settings: &ClickerSettings) -> Self {
        match settings.move_mode {
            MoveMode::Instant => Movement::Instant {
                click_delay: settings.instant_delay(),
            },
            MoveMode::Smooth => Movement::Smooth {
                duration: settings.smooth_duration(),
            },
        }
    }
}

/// Absolute screen point at the centre of a match.
pub fn click_target(found: &MatchResult, region_offset: Point) -> Point {
    Point::new(
        region_offset.x + found.location.x + (found.width / 2) as i32,
        region_offset.y + found.location.y + (found.height / 2) as i32,
    )
}

/// Number of intermediate positions for a smooth movement of `duration`.
pub fn smooth_steps(duration: Duration) -> u32 {
    let steps = duration.as_millis() / SMOOTH_STEP_INTERVAL.as_millis();
    steps.clamp(1, MAX_SMOOTH_STEPS as u128) as u32
}

/// Linear path from `start` to `target` in `steps` points, excluding `start`.
///
/// The last point is always exactly `target`. When `start == target` the
/// path is the single point `target`.
pub fn interpolate_path(start: Point, target: Point, steps: u32) -> Vec<Point> {
    if start == target || steps <= 1 {
        return vec![target];
    }

    let dx = (target.x - start.x) as f64;
    let dy = (target.y - start.y) as f64;

    (1..=steps)
        .map(|i| {
            if i == steps {
                target
            } else {
                let t = i as f64 / steps as f64;
                Point::new(
                    start.x + (dx * t).round() as i32,
                    start.y + (dy * t).round() as i32,
                )
            }
        })
        .collect()
}

/// Moves the pointer onto matches and clicks them.
pub struct MouseController<B: InputBackend> {
    backend: B,
}

impl<B: InputBackend> MouseController<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Click the centre of `found`, translated by the search region offset.
    ///
    /// Blocks for the whole movement; a smooth movement cannot be interrupted.
    /// Returns the clicked point.
    pub fn act(
        &mut self,
        found: &MatchResult,
        region_offset: Point,
        movement: Movement,
    ) -> Result<Point, InputError> {
        let target = click_target(found, region_offset);

        match movement {
            Movement::Instant { click_delay } => {
                self.backend.move_to(target)?;
                if !click_delay.is_zero() {
                    thread::sleep(click_delay);
                }
            }
            Movement::Smooth { duration } => {
                let start = match self.backend.cursor_position() {
                    Ok(start) => start,
                    Err(e) => {
                        tracing::warn!("Cannot read pointer position, jumping to target: {}", e);
                        target
                    }
                };

                let path = interpolate_path(start, target, smooth_steps(duration));
                let pause = duration / path.len() as u32;
                for point in path {
                    self.backend.move_to(point)?;
                    if !pause.is_zero() {
                        thread::sleep(pause);
                    }
                }
            }
        }

        self.backend.click()?;
        tracing::debug!("Clicked at {}", target);
        Ok(target)
    }
}
