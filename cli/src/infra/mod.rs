//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! resource scope and its temp arena, the agent and tunnel sessions, and the
//! config and stack boundaries.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod agent;
pub mod apt;
pub mod command_runner;
pub mod config;
pub mod fs;
pub mod scope;
pub mod signals;
pub mod ssh_config;
pub mod stack;
pub mod tunnel;
