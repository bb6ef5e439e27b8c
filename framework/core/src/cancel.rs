use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Handle used to request cooperative cancellation of a single run.
///
/// The orchestrator keeps one handle per in-flight run. Calling [CancelHandle::cancel] does not
/// stop anything by itself; the run's worker observes the signal through its
/// [CancelListener] at the next safe boundary and winds the run down from there.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn cancel(&self) {
        if let Err(e) = self.sender.send(()) {
            // Will fail if nobody is listening for the cancellation signal, which means the
            // worker has already finished. Nothing to do in that case.
            log::debug!("Cancellation signal had no listener: {e:?}");
        }
    }

    pub fn new_listener(&self) -> CancelListener {
        CancelListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct CancelListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    observed: bool,
}

impl CancelListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            observed: false,
        }
    }

    /// Point in time check whether cancellation has been requested. Once this returns true it
    /// will keep returning true; the worker should stop producing new work and finalise.
    pub fn is_cancelled(&mut self) -> bool {
        if self.observed {
            return true;
        }

        let cancelled = match self.receiver.try_lock() {
            Ok(mut guard) => {
                match guard.try_recv() {
                    Ok(_) => true,
                    Err(tokio::sync::broadcast::error::TryRecvError::Closed) => true,
                    // If the receiver is empty or lagged then cancellation has not been requested.
                    Err(_) => false,
                }
            }
            Err(_) => false,
        };

        self.observed = cancelled;
        cancelled
    }
}
