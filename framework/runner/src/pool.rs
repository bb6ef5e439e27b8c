use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of named worker threads fed by a shared job queue.
///
/// Submissions beyond the pool's capacity queue on the channel until a worker frees up, so the
/// number of concurrently executing runs is bounded without rejecting work. A job that panics
/// takes down neither its worker thread nor the pool.
pub(crate) struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "worker pool needs at least one worker");

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..capacity)
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                std::thread::Builder::new()
                    .name(format!("sim-worker-{i}"))
                    .spawn(move || worker_loop(receiver))
                    .expect("Failed to spawn simulation worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub(crate) fn submit(&self, job: Job) {
        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                log::error!("Worker pool is shut down, dropping submitted job");
            }
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        // The lock is held only while waiting for a job, not while running one.
        let job = receiver.lock().recv();

        match job {
            Ok(job) => {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
                if outcome.is_err() {
                    log::error!("A run worker panicked; the pool slot has been recovered");
                }
            }
            // Channel closed, the pool is shutting down.
            Err(_) => break,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker drain the queue and exit.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Error joining simulation worker thread");
            }
        }
    }
}
