// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deferred release of native handles.
//!
//! Every object wrapping a native handle registers its release action here
//! when it is created. The returned [`Registration`] travels with the object;
//! dropping it queues the action on a dedicated reclamation thread. Explicit
//! disposal through `release_handle` remains the fast path, so release
//! actions must be idempotent.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

const RECLAIMER_THREAD_NAME: &str = "nativekey-reclaimer";

/// Work run once the owning object is dropped.
pub type ReleaseAction = Box<dyn FnOnce() + Send + 'static>;

lazy_static! {
    static ref GLOBAL_RECLAIMER: Reclaimer = Reclaimer::new();
}

enum Message {
    Release(ReleaseAction),
    Flush(mpsc::Sender<()>),
}

struct ReclaimerInner {
    sender: Mutex<Option<mpsc::Sender<Message>>>,
    registered: AtomicU64,
    completed: AtomicU64,
}

/// Handle to a reclamation thread.
///
/// Cloning is cheap; clones share the same thread and queue.
#[derive(Clone)]
pub struct Reclaimer {
    inner: Arc<ReclaimerInner>,
}

impl Reclaimer {
    /// Process-wide reclaimer used by [`crate::Context::open`].
    pub fn global() -> &'static Reclaimer {
        &GLOBAL_RECLAIMER
    }

    /// Spawns an independent reclamation thread.
    ///
    /// If the thread cannot be spawned the reclaimer still works: release
    /// actions run inline on the thread that drops their [`Registration`].
    pub fn new() -> Self {
        let inner = Arc::new(ReclaimerInner {
            sender: Mutex::new(None),
            registered: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        });

        let (sender, receiver) = mpsc::channel();
        let worker_inner = Arc::downgrade(&inner);
        let spawned = std::thread::Builder::new()
            .name(RECLAIMER_THREAD_NAME.to_owned())
            .spawn(move || {
                for message in receiver {
                    match message {
                        Message::Release(action) => {
                            run_action(action);
                            if let Some(inner) = worker_inner.upgrade() {
                                inner.completed.fetch_add(1, Ordering::AcqRel);
                            }
                        }
                        Message::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                tracing::debug!("Reclamation thread exiting");
            });

        match spawned {
            Ok(_) => *inner.sender.lock() = Some(sender),
            Err(err) => {
                tracing::warn!(?err, "Failed to spawn reclamation thread, releasing inline");
            }
        }

        Self { inner }
    }

    /// Associates `action` with the lifetime of the returned [`Registration`].
    ///
    /// Never blocks and never fails.
    pub fn register<F>(&self, action: F) -> Registration
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.registered.fetch_add(1, Ordering::AcqRel);
        Registration {
            action: Mutex::new(Some(Box::new(action))),
            reclaimer: self.clone(),
        }
    }

    /// Blocks until every action queued before this call has run.
    ///
    /// Must not be called from inside a release action.
    pub fn flush(&self) {
        let Some(sender) = self.sender() else {
            return;
        };

        let (done, wait) = mpsc::channel();
        if sender.send(Message::Flush(done)).is_ok() {
            let _ = wait.recv();
        }
    }

    /// Stops the reclamation thread after it drains its queue.
    ///
    /// Registrations dropped afterwards release inline.
    pub fn shutdown(&self) {
        self.flush();
        if self.inner.sender.lock().take().is_some() {
            tracing::debug!("Reclaimer shut down");
        }
    }

    /// Number of release actions registered so far.
    pub fn registered(&self) -> u64 {
        self.inner.registered.load(Ordering::Acquire)
    }

    /// Number of release actions that have run.
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    fn sender(&self) -> Option<mpsc::Sender<Message>> {
        self.inner.sender.lock().clone()
    }

    fn dispatch(&self, action: ReleaseAction) {
        // Sender is cloned out so an inline action never runs under the lock.
        let action = match self.sender() {
            Some(sender) => match sender.send(Message::Release(action)) {
                Ok(()) => return,
                Err(mpsc::SendError(Message::Release(action))) => action,
                Err(mpsc::SendError(Message::Flush(_))) => return,
            },
            None => action,
        };

        tracing::warn!("Reclamation thread unavailable, releasing inline");
        run_action(action);
        self.inner.completed.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reclaimer")
            .field("registered", &self.registered())
            .field("completed", &self.completed())
            .finish()
    }
}

fn run_action(action: ReleaseAction) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(action)) {
        let reason = panic
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");
        tracing::error!(reason, "Release action panicked");
    }
}

/// Ties a release action to the lifetime of its owner.
///
/// Dropping the registration queues the action exactly once.
pub struct Registration {
    action: Mutex<Option<ReleaseAction>>,
    reclaimer: Reclaimer,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(action) = self.action.get_mut().take() {
            self.reclaimer.dispatch(action);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").finish_non_exhaustive()
    }
}
