//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Execution context identity and event loop runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::event_loop::LoopHandle;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a fresh identifier.
    pub fn next() -> Self {
        Self(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, mostly for logging.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// Answers "which execution context is the calling code running on?".
pub trait ContextProvider: Send + Sync {
    /// Context of the caller, or `None` when running outside any context.
    fn current_context(&self) -> Option<ContextId>;
}

/// Provider backed by the [`EventLoop`](crate::EventLoop) worker threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeContexts;

impl ContextProvider for RuntimeContexts {
    fn current_context(&self) -> Option<ContextId> {
        current_context()
    }
}

/// Context of the calling thread, if it is an event loop worker.
pub fn current_context() -> Option<ContextId> {
    LoopHandle::current().map(|handle| handle.id())
}
