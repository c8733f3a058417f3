//! Task orchestrator command-line tool.
//!
//! Wires `task_core`'s domain model and `task_store`'s persistence layer
//! together behind a single-binary CLI. `engine` is the facade every
//! subcommand in `main.rs` drives; `config`/`setup`/`telemetry` are the
//! process-level plumbing around it.

pub mod config;
pub mod engine;
pub mod facades;
pub mod setup;
pub mod telemetry;

pub use config::ProcessConfig;
pub use engine::TaskCore;
pub use facades::{Orchestrator, Worker};
pub use setup::{create_store, initialize_app, Application};
pub use telemetry::{init_telemetry, LogFormat};
