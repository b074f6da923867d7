//! Unit tests for opskit
//!
//! These tests use a scripted command runner and run fast without spawning
//! remote tools.

mod architecture;
mod step_runner_service;
