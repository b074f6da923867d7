//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod env;
pub mod error;
pub mod plan;
pub mod ssh;
pub mod stack;
pub mod steps;
pub mod tap;

pub use config::OpsConfig;
pub use env::EnvPatch;
pub use error::{AgentError, ConfigError, ScriptError, StackError, StepError, TunnelError};
pub use plan::{Plan, PlanTest};
