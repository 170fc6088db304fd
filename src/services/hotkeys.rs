//! Desktop-wide keyboard and mouse hooks.
//!
//! The console only sees typed lines, so the stop key and the drag used to
//! select a search region come from a global `rdev` hook instead.

use crate::models::Point;
use rdev::{Button, EventType, Key};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tokio::sync::mpsc;

/// Input seen anywhere on the desktop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalEvent {
    KeyPressed(Key),
    PointerDown(Point),
    PointerMoved(Point),
    PointerUp(Point),
}

const LETTERS: [Key; 26] = [
    Key::KeyA,
    Key::KeyB,
    Key::KeyC,
    Key::KeyD,
    Key::KeyE,
    Key::KeyF,
    Key::KeyG,
    Key::KeyH,
    Key::KeyI,
    Key::KeyJ,
    Key::KeyK,
    Key::KeyL,
    Key::KeyM,
    Key::KeyN,
    Key::KeyO,
    Key::KeyP,
    Key::KeyQ,
    Key::KeyR,
    Key::KeyS,
    Key::KeyT,
    Key::KeyU,
    Key::KeyV,
    Key::KeyW,
    Key::KeyX,
    Key::KeyY,
    Key::KeyZ,
];

const DIGITS: [Key; 10] = [
    Key::Num0,
    Key::Num1,
    Key::Num2,
    Key::Num3,
    Key::Num4,
    Key::Num5,
    Key::Num6,
    Key::Num7,
    Key::Num8,
    Key::Num9,
];

/// Key for a stop-key name such as `esc`, `F8`, `page_up` or `q`.
///
/// Names are case-insensitive. Returns `None` for names with no key.
pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.trim().to_ascii_lowercase();
    let key = match name.as_str() {
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" | "ins" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        "pause" => Key::Pause,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => return single_char_key(other),
    };
    Some(key)
}

fn single_char_key(name: &str) -> Option<Key> {
    let mut chars = name.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    match c {
        'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
        '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
        _ => None,
    }
}

/// Turn a raw hook event into a [`GlobalEvent`].
///
/// `pointer` keeps the last known position because button events carry
/// none. Pointer events are only produced while `tracking` is set; key
/// presses always are.
pub fn translate(event: &EventType, pointer: &mut Point, tracking: bool) -> Option<GlobalEvent> {
    match event {
        EventType::KeyPress(key) => Some(GlobalEvent::KeyPressed(*key)),
        EventType::MouseMove { x, y } => {
            *pointer = Point::new(x.round() as i32, y.round() as i32);
            tracking.then_some(GlobalEvent::PointerMoved(*pointer))
        }
        EventType::ButtonPress(Button::Left) if tracking => {
            Some(GlobalEvent::PointerDown(*pointer))
        }
        EventType::ButtonRelease(Button::Left) if tracking => {
            Some(GlobalEvent::PointerUp(*pointer))
        }
        _ => None,
    }
}

/// Handle on the global hook.
///
/// The hook thread lives for the rest of the process; `rdev` has no way to
/// remove it. Cloning shares the tracking flag.
#[derive(Debug, Clone, Default)]
pub struct GlobalInput {
    tracking: Arc<AtomicBool>,
}

impl GlobalInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the hook thread and return its event stream.
    ///
    /// The stream ends if the platform refuses the hook, e.g. without
    /// accessibility permission.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<GlobalEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracking = Arc::clone(&self.tracking);

        let spawned = thread::Builder::new()
            .name("global-input".to_string())
            .spawn(move || {
                let mut pointer = Point::ORIGIN;
                let result = rdev::listen(move |event| {
                    let tracking = tracking.load(Ordering::Relaxed);
                    if let Some(event) = translate(&event.event_type, &mut pointer, tracking) {
                        let _ = tx.send(event);
                    }
                });
                if let Err(error) = result {
                    tracing::warn!("Global input hook unavailable: {:?}", error);
                }
            });

        match spawned {
            Ok(_) => tracing::info!("Global input hook started"),
            Err(e) => tracing::warn!("Failed to start global input thread: {}", e),
        }
        rx
    }

    /// Forward pointer events while a drag selection is in progress.
    pub fn set_tracking(&self, on: bool) {
        self.tracking.store(on, Ordering::Relaxed);
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Relaxed)
    }
}
