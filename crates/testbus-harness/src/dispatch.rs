//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Test registry and start_test dispatcher."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use testbus_msg::{codec, log_event, DeliveryHandler, EventDirection};
use tracing::{debug, error, trace, warn};

use crate::error::{HarnessError, TestResult};
use crate::harness::Harness;

type TestBody = Arc<dyn Fn() -> TestResult + Send + Sync>;

/// A named test body, registered with [`Harness::register_tests`].
#[derive(Clone)]
pub struct TestEntry {
    name: String,
    body: TestBody,
}

impl TestEntry {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> TestResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for TestEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEntry").field("name", &self.name).finish()
    }
}

impl Harness {
    /// Run `handler` every time a `start_test` naming `name` arrives.
    ///
    /// Registering a name again replaces the earlier handler and removes its
    /// channel subscription. When the harness was built on an event loop the
    /// handler always runs on that loop, whichever thread registered it.
    pub fn register<F>(&self, name: impl Into<String>, handler: F) -> Result<(), HarnessError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_start(name.into(), handler)
    }

    /// Register every entry. Errors and panics from a test body are logged
    /// at the dispatch boundary and never reach the channel.
    pub fn register_tests<I>(&self, entries: I) -> Result<(), HarnessError>
    where
        I: IntoIterator<Item = TestEntry>,
    {
        for entry in entries {
            debug!(test = entry.name(), "registering test");
            let TestEntry { name, body } = entry;
            let test = name.clone();
            let metrics = self.inner.metrics.clone();
            self.subscribe_start(name, move || {
                let failure = match catch_unwind(AssertUnwindSafe(|| body())) {
                    Ok(Ok(())) => return,
                    Ok(Err(err)) => err.to_string(),
                    Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
                };
                error!(test = %test, error = %failure, "Failed to invoke test");
                if let Some(metrics) = &metrics {
                    metrics.observe_dispatch_failure();
                }
            })?;
        }
        Ok(())
    }

    /// Remove every registration and its channel subscription.
    pub fn unregister_all(&self) {
        let entries = std::mem::take(&mut *self.inner.registry.lock());
        for (name, id) in entries {
            if !self.inner.channel.unsubscribe(&self.inner.address, id) {
                debug!(test = %name, subscription = %id, "subscription already gone");
            }
        }
    }

    /// Registered test names, in registration order.
    pub fn registered(&self) -> Vec<String> {
        self.inner.registry.lock().keys().cloned().collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.registry.lock().contains_key(name)
    }

    fn subscribe_start<F>(&self, name: String, run: F) -> Result<(), HarnessError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let address = self.inner.address.clone();
        let metrics = self.inner.metrics.clone();
        let home = self.inner.home.clone();
        let run = Arc::new(run);
        let test = name.clone();
        let delivery: DeliveryHandler = Arc::new(move |payload: &Bytes| {
            let event = match codec::decode(payload) {
                Ok(event) => event,
                Err(err) => {
                    trace!(address = %address, error = %err, "ignoring undecodable payload");
                    return;
                }
            };
            if !event.starts(&test) {
                return;
            }
            log_event(EventDirection::Inbound, &address, &event);
            if let Some(metrics) = &metrics {
                metrics.observe_dispatch();
            }
            match &home {
                Some(home) if !home.is_current() => {
                    let run = run.clone();
                    if let Err(err) = home.execute(move || run()) {
                        warn!(test = %test, error = %err, "owning loop is gone; test not started");
                    }
                }
                _ => run(),
            }
        });

        let id = self
            .inner
            .channel
            .subscribe(&self.inner.address, delivery)?;
        let previous = self.inner.registry.lock().insert(name.clone(), id);
        if let Some(previous) = previous {
            self.inner.channel.unsubscribe(&self.inner.address, previous);
            debug!(test = %name, "replaced existing registration");
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
