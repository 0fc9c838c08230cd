//! Application-level orchestration.
//!
//! This module turns session actions into engine requests and reports their
//! outcomes back to presentation layers as events. The TUI and headless CLI
//! both go through here so they share one execution path.

mod actions;
mod controller;
mod navigator;

pub(crate) use actions::execute;
pub(crate) use controller::{run_controller, SessionEvent, UiCommand};
pub(crate) use navigator::{Navigator, SaveToDir};
