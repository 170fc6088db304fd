// UI module - console front-end
//
// This module contains:
// - Command: parsed console commands and their errors
// - ConsoleController: applies commands to the state, the selector and the loop

pub mod commands;
pub mod controller;

pub use commands::{Command, CommandError, DelayKind};
pub use controller::{ConsoleController, Reply};
