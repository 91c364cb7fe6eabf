//! Cooperative cancellation for long-running inference calls.
//!
//! A [`CancelHandle`] owns the trigger; any number of [`CancellationSignal`]s
//! observe it. [`CancelOnDrop`] fires the trigger when the owning request
//! future is dropped, which is how a disconnected HTTP client stops the
//! generation call it started.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{Error, Result};

/// Observer side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that is never triggered.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless cancellation arrives first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled("cancelled before start".to_string()));
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled("caller went away".to_string())),
            res = fut => res,
        }
    }
}

/// Trigger side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels its handle when dropped unless disarmed first.
#[derive(Debug)]
pub struct CancelOnDrop {
    handle: CancelHandle,
    armed: bool,
}

impl CancelOnDrop {
    pub fn new(handle: CancelHandle) -> Self {
        Self {
            handle,
            armed: true,
        }
    }

    /// Call once the guarded work completed normally.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.handle.cancel();
        }
    }
}
