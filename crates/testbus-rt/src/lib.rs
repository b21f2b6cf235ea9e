//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Execution context identity and event loop runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Execution contexts for test code.
//!
//! An [`EventLoop`] owns one worker thread and runs queued tasks one at a
//! time, to completion. Code running on that thread can ask which context it
//! belongs to through a [`ContextProvider`].

pub mod context;
pub mod event_loop;

pub use context::{current_context, ContextId, ContextProvider, RuntimeContexts};
pub use event_loop::{EventLoop, LoopHandle};

/// Errors raised by the event loop runtime.
#[derive(Debug, thiserror::Error)]
pub enum RtError {
    /// The worker thread could not be started.
    #[error("failed to spawn event loop worker: {0}")]
    Spawn(#[from] std::io::Error),
    /// The loop has shut down and no longer accepts tasks.
    #[error("event loop {0} is stopped")]
    Stopped(ContextId),
    /// A blocking call was made from the loop's own worker thread.
    #[error("blocking call on event loop {0} issued from its own worker thread")]
    Reentrant(ContextId),
    /// The task panicked before producing a result.
    #[error("task on event loop {0} panicked")]
    TaskPanicked(ContextId),
}

/// Shared result type for runtime operations.
pub type Result<T> = std::result::Result<T, RtError>;
