//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Harness construction and context affinity guard."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread::ThreadId;

use indexmap::IndexMap;
use parking_lot::Mutex;
use testbus_common::{HarnessConfig, DEFAULT_EVENTS_ADDRESS};
use testbus_msg::{EventChannel, SubscriptionId};
use testbus_rt::{ContextId, ContextProvider, LoopHandle};
use tracing::debug;

use crate::error::{HarnessError, TestResult};
use crate::metrics::HarnessMetrics;

/// Context and thread captured when the harness was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Owner {
    pub(crate) context: ContextId,
    pub(crate) thread: ThreadId,
}

pub(crate) struct Inner {
    pub(crate) channel: Arc<dyn EventChannel>,
    pub(crate) contexts: Arc<dyn ContextProvider>,
    pub(crate) address: String,
    pub(crate) owner: Option<Owner>,
    /// Loop the harness was built on; matched `start_test` deliveries run there.
    pub(crate) home: Option<LoopHandle>,
    pub(crate) registry: Mutex<IndexMap<String, SubscriptionId>>,
    pub(crate) metrics: Option<HarnessMetrics>,
}

/// Test utility bound to the execution context that created it.
///
/// Cloning is cheap and every clone shares the same registry, so handlers may
/// capture a clone to call assertions. Handlers registered on the channel keep
/// such clones alive; call [`Harness::unregister_all`] when the test module is
/// torn down.
#[derive(Clone)]
pub struct Harness {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("channel", &self.inner.channel.name())
            .field("address", &self.inner.address)
            .field("owner", &self.inner.owner)
            .field("registered", &self.inner.registry.lock().len())
            .finish()
    }
}

/// Builder for [`Harness`].
pub struct HarnessBuilder {
    channel: Arc<dyn EventChannel>,
    contexts: Arc<dyn ContextProvider>,
    address: String,
    metrics: Option<HarnessMetrics>,
}

impl HarnessBuilder {
    /// Channel address used for outbound events and inbound `start_test`.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn metrics(mut self, metrics: HarnessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the harness, capturing the calling context and thread.
    pub fn build(self) -> Harness {
        let owner = self.contexts.current_context().map(|context| Owner {
            context,
            thread: std::thread::current().id(),
        });
        debug!(
            channel = self.channel.name(),
            address = %self.address,
            context = ?owner.map(|o| o.context),
            "harness created"
        );
        Harness {
            inner: Arc::new(Inner {
                channel: self.channel,
                contexts: self.contexts,
                address: self.address,
                owner,
                home: LoopHandle::current(),
                registry: Mutex::new(IndexMap::new()),
                metrics: self.metrics,
            }),
        }
    }
}

impl Harness {
    /// Harness on the default events address, bound to the calling context.
    pub fn new(channel: Arc<dyn EventChannel>, contexts: Arc<dyn ContextProvider>) -> Self {
        Self::builder(channel, contexts).build()
    }

    /// Harness whose address comes from configuration.
    pub fn with_config(
        channel: Arc<dyn EventChannel>,
        contexts: Arc<dyn ContextProvider>,
        config: &HarnessConfig,
    ) -> Self {
        Self::builder(channel, contexts)
            .address(config.events_address.clone())
            .build()
    }

    pub fn builder(
        channel: Arc<dyn EventChannel>,
        contexts: Arc<dyn ContextProvider>,
    ) -> HarnessBuilder {
        HarnessBuilder {
            channel,
            contexts,
            address: DEFAULT_EVENTS_ADDRESS.to_owned(),
            metrics: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Context captured at construction; `None` when built outside any context.
    pub fn owning_context(&self) -> Option<ContextId> {
        self.inner.owner.map(|owner| owner.context)
    }

    /// Thread captured at construction. Only tracked when a context was bound.
    pub fn owning_thread(&self) -> Option<ThreadId> {
        self.inner.owner.map(|owner| owner.thread)
    }

    /// Verify the caller runs on the thread and context this harness was built on.
    ///
    /// A mismatch is reported as a failed assertion naming the expected and
    /// actual identities. Calling this on a harness built outside any context
    /// is a programming error and yields [`HarnessError::IllegalUse`] without
    /// emitting anything.
    #[track_caller]
    pub fn check_context(&self) -> TestResult {
        let Some(owner) = self.inner.owner else {
            return Err(HarnessError::IllegalUse(
                "check_context called on a harness created outside any execution context",
            ));
        };

        let thread = std::thread::current().id();
        self.assert_with(
            thread == owner.thread,
            format!("Expected:{:?} Actual:{:?}", owner.thread, thread),
        )?;

        let context = self.inner.contexts.current_context();
        let actual = context.map_or_else(|| "none".to_owned(), |c| c.to_string());
        self.assert_with(
            context == Some(owner.context),
            format!("Expected:{} Actual:{}", owner.context, actual),
        )?;
        Ok(())
    }
}
