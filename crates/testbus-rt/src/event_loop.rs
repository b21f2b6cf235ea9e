//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Execution context identity and event loop runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::{ContextId, Result, RtError};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Run(Task),
    Stop,
}

thread_local! {
    static CURRENT: RefCell<Option<LoopHandle>> = const { RefCell::new(None) };
}

/// Cloneable handle used to queue work onto an [`EventLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    id: ContextId,
    name: Arc<str>,
    sender: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl LoopHandle {
    /// Handle of the loop whose worker thread is calling, if any.
    pub fn current() -> Option<LoopHandle> {
        CURRENT.with(|current| current.borrow().clone())
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a task. It runs on a later turn of the loop, after every task
    /// queued before it.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Command::Run(Box::new(task)))
            .map_err(|_| RtError::Stopped(self.id))
    }

    /// True when the calling thread is this loop's worker.
    pub fn is_current(&self) -> bool {
        CURRENT.with(|current| {
            current
                .borrow()
                .as_ref()
                .is_some_and(|handle| handle.id == self.id)
        })
    }
}

/// Single-threaded execution context backed by a dedicated worker thread.
///
/// Tasks run one at a time and never interleave. A task that panics is logged
/// and the loop moves on to the next one.
pub struct EventLoop {
    handle: LoopHandle,
    thread: ThreadId,
    worker: Option<JoinHandle<()>>,
}

impl EventLoop {
    /// Start a new loop on a thread named `name`.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name: String = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = LoopHandle {
            id: ContextId::next(),
            name: Arc::from(name.as_str()),
            sender,
        };

        let worker_handle = handle.clone();
        let worker = std::thread::Builder::new()
            .name(name)
            .spawn(move || run_worker(worker_handle, receiver))?;
        let thread = worker.thread().id();
        debug!(context = %handle.id, name = %handle.name, "event loop started");

        Ok(Self {
            handle,
            thread,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> ContextId {
        self.handle.id
    }

    /// Identifier of the worker thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Queue a task without waiting for it.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.execute(task)
    }

    /// Run `task` on the loop and block until it returns.
    pub fn run<F, R>(&self, task: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.handle.is_current() {
            return Err(RtError::Reentrant(self.handle.id));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.handle.execute(move || {
            let _ = tx.send(task());
        })?;
        rx.recv().map_err(|_| RtError::TaskPanicked(self.handle.id))
    }

    /// Wait until every task queued before this call has run.
    pub fn flush(&self) -> Result<()> {
        self.run(|| ())
    }

    /// Stop accepting work, let queued tasks finish, and join the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.handle.sender.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!(context = %self.handle.id, "event loop worker terminated abnormally");
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(handle: LoopHandle, mut receiver: mpsc::UnboundedReceiver<Command>) {
    let id = handle.id;
    CURRENT.with(|current| *current.borrow_mut() = Some(handle));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(context = %id, error = %err, "failed to build event loop runtime");
            return;
        }
    };

    runtime.block_on(async move {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Run(task) => {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(context = %id, "task panicked on event loop");
                    }
                }
                Command::Stop => break,
            }
        }
        receiver.close();
    });

    // Drop our own sender clone so outstanding handles observe the stop.
    CURRENT.with(|current| current.borrow_mut().take());
    debug!(context = %id, "event loop stopped");
}
