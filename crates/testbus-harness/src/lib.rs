//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Context-affine test harness and runner-side helpers."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Test code running inside an execution context reports to an external
//! runner through a [`Harness`]. The runner drives execution by publishing
//! `start_test` events; the harness answers with assertion, trace, exception,
//! and completion events on the same channel address.
//!
//! A harness is bound to the context and thread that created it. All of its
//! methods are expected to be called from that context; the registry is only
//! ever touched from there, so its lock is uncontended.

pub mod dispatch;
pub mod emitter;
pub mod error;
pub mod harness;
pub mod metrics;
pub mod random;
pub mod recorder;

pub use dispatch::TestEntry;
pub use error::{AssertionFailure, HarnessError, TestResult};
pub use harness::{Harness, HarnessBuilder};
pub use metrics::HarnessMetrics;
pub use recorder::{EventRecorder, Tally};
