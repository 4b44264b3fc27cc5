//! Run context and cancellation plumbing.
//!
//! A [`RunContext`] is built once per run and handed by reference to the
//! engine, every stage and every quirk handler. Cancellation rides on a tokio
//! watch channel: the driver keeps the [`CancelHandle`], everything else sees a
//! [`CancelToken`].

use std::sync::Arc;
use tokio::sync::watch;

use crate::device::Device;
use crate::events::EventBus;

/// Sender half of the cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    cancel_tx: watch::Sender<bool>,
}

/// Receiver half of the cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancel_rx: watch::Receiver<bool>,
}

/// Create a linked handle/token pair in the not-cancelled state.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    (CancelHandle { cancel_tx }, CancelToken { cancel_rx })
}

impl CancelHandle {
    /// Signal cancellation to every token. Idempotent.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            cancel_rx: self.cancel_tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that can never be cancelled.
    pub fn never() -> Self {
        let (tx, cancel_rx) = watch::channel(false);
        // A closed channel holding `false` never resolves `cancelled()`.
        drop(tx);
        CancelToken { cancel_rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves once cancellation is signalled. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped while not cancelled
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Everything a stage may need from the run that is executing it.
#[derive(Clone)]
pub struct RunContext {
    cancel: CancelToken,
    device: Option<Arc<Device>>,
    dry_run: bool,
    bus: Arc<EventBus>,
}

impl RunContext {
    pub fn new(cancel: CancelToken, bus: Arc<EventBus>) -> Self {
        RunContext {
            cancel,
            device: None,
            dry_run: false,
            bus,
        }
    }

    pub fn with_device(mut self, device: Option<Device>) -> Self {
        self.device = device.map(Arc::new);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The detected device, or None when detection failed.
    pub fn device(&self) -> Option<&Device> {
        self.device.as_deref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}
