//! ---
//! tb_section: "02-event-protocol"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Addressable event channel abstraction and in-memory backend."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use testbus_rt::LoopHandle;

use crate::{MessagingError, Result};

/// Callback invoked with the raw payload of every message delivered to a subscription.
pub type DeliveryHandler = Arc<dyn Fn(&Bytes) + Send + Sync>;

/// Identifies one subscription on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Shared, addressable delivery path for test events.
pub trait EventChannel: Send + Sync {
    /// Publish a payload to every subscriber of `address`.
    fn publish(&self, address: &str, payload: Bytes) -> Result<()>;
    /// Register a handler for messages sent to `address`.
    fn subscribe(&self, address: &str, handler: DeliveryHandler) -> Result<SubscriptionId>;
    /// Remove a subscription. Returns `false` when it was not registered.
    fn unsubscribe(&self, address: &str, id: SubscriptionId) -> bool;
    /// Human-readable channel name for logging.
    fn name(&self) -> &'static str;
}

struct Subscription {
    id: SubscriptionId,
    handler: DeliveryHandler,
    context: Option<LoopHandle>,
    active: Arc<AtomicBool>,
}

/// Payloads kept per address by [`InMemoryChannel::new`].
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

struct State {
    next_id: u64,
    closed: bool,
    subscriptions: HashMap<String, Vec<Subscription>>,
    journal: HashMap<String, VecDeque<Bytes>>,
    journal_capacity: usize,
}

impl State {
    fn with_capacity(journal_capacity: usize) -> Self {
        Self {
            next_id: 0,
            closed: false,
            subscriptions: HashMap::new(),
            journal: HashMap::new(),
            journal_capacity,
        }
    }

    fn record(&mut self, address: &str, payload: &Bytes) {
        if self.journal_capacity == 0 {
            return;
        }
        let queue = self.journal.entry(address.to_owned()).or_default();
        while queue.len() >= self.journal_capacity {
            queue.pop_front();
        }
        queue.push_back(payload.clone());
    }
}

impl Default for State {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_JOURNAL_CAPACITY)
    }
}

/// In-process channel.
///
/// A subscription made from an event loop thread is bound to that loop:
/// deliveries are queued onto it and run on a later turn. Subscriptions made
/// anywhere else are called inline by the publisher. The most recent payloads
/// published to each address are journaled in publish order; older entries
/// are evicted once the journal capacity is reached.
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    state: Arc<Mutex<State>>,
}

impl InMemoryChannel {
    /// Create an empty, open channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel keeping at most `capacity` payloads per address. Zero disables
    /// journaling; delivery is unaffected.
    pub fn with_journal_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::with_capacity(capacity))),
        }
    }

    /// Journaled payloads for `address`, oldest first.
    pub fn published(&self, address: &str) -> Vec<Bytes> {
        let guard = self.state.lock();
        guard
            .journal
            .get(address)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Take and clear the journal for `address`.
    pub fn drain(&self, address: &str) -> Vec<Bytes> {
        let mut guard = self.state.lock();
        guard
            .journal
            .get_mut(address)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Number of live subscriptions on `address`.
    pub fn subscriber_count(&self, address: &str) -> usize {
        let guard = self.state.lock();
        guard.subscriptions.get(address).map_or(0, Vec::len)
    }

    /// Reject every later publish with [`MessagingError::Closed`].
    pub fn close(&self) {
        self.state.lock().closed = true;
    }
}

impl EventChannel for InMemoryChannel {
    fn publish(&self, address: &str, payload: Bytes) -> Result<()> {
        let targets: Vec<_> = {
            let mut guard = self.state.lock();
            if guard.closed {
                return Err(MessagingError::Closed(self.name()));
            }
            guard.record(address, &payload);
            guard
                .subscriptions
                .get(address)
                .map(|subs| {
                    subs.iter()
                        .map(|sub| {
                            (sub.handler.clone(), sub.context.clone(), sub.active.clone())
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        tracing::trace!(address, subscribers = targets.len(), "publishing payload");

        for (handler, context, active) in targets {
            match context {
                Some(context) => {
                    let payload = payload.clone();
                    let queued = context.execute(move || {
                        if active.load(Ordering::Acquire) {
                            handler(&payload);
                        }
                    });
                    if let Err(err) = queued {
                        tracing::warn!(
                            address,
                            context = context.name(),
                            error = %err,
                            "subscriber context is gone; delivery skipped"
                        );
                    }
                }
                None => {
                    if active.load(Ordering::Acquire) {
                        handler(&payload);
                    }
                }
            }
        }
        Ok(())
    }

    fn subscribe(&self, address: &str, handler: DeliveryHandler) -> Result<SubscriptionId> {
        let mut guard = self.state.lock();
        guard.next_id += 1;
        let id = SubscriptionId(guard.next_id);
        guard
            .subscriptions
            .entry(address.to_owned())
            .or_default()
            .push(Subscription {
                id,
                handler,
                context: LoopHandle::current(),
                active: Arc::new(AtomicBool::new(true)),
            });
        Ok(id)
    }

    fn unsubscribe(&self, address: &str, id: SubscriptionId) -> bool {
        let mut guard = self.state.lock();
        let Some(subs) = guard.subscriptions.get_mut(address) else {
            return false;
        };
        let Some(index) = subs.iter().position(|sub| sub.id == id) else {
            return false;
        };
        let removed = subs.remove(index);
        removed.active.store(false, Ordering::Release);
        if subs.is_empty() {
            guard.subscriptions.remove(address);
        }
        true
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
