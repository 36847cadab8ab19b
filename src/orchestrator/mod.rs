//! Application-level orchestration.
//!
//! The controller owns the record stores, forwards UI commands to them, drives the price
//! ticker and applies the post-mutation sync policy. Presentation layers only talk to it
//! through channels.

mod controller;
mod sync;

pub(crate) use controller::{run_controller, spawn_stores, UiCommand};
