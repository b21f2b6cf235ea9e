//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Shared primitives for the testbus workspace."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Configuration loading and logging setup consumed by every testbus crate.

pub mod config;
pub mod logging;

pub use config::{HarnessConfig, LoadedHarnessConfig, LoggingConfig, DEFAULT_EVENTS_ADDRESS};
pub use logging::{init_test_tracing, init_tracing, LogFormat};
