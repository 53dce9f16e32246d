//! Named task threads with cooperative shutdown.
//!
//! Each `Worker` owns exactly one thread. Dropping the worker (or calling
//! [`Worker::stop`]) disconnects the shutdown channel, which every blocking
//! wait inside the task observes immediately, and then joins the thread.
use crossbeam_channel as xch;
use std::thread::JoinHandle;
use std::time::Duration;

/// Task-side view of the shutdown signal.
#[derive(Clone)]
pub struct Shutdown {
    rx: xch::Receiver<()>,
}

impl Shutdown {
    /// Sleep for up to `d`. Returns `true` when shutdown was requested.
    pub fn wait(&self, d: Duration) -> bool {
        !matches!(self.rx.recv_timeout(d), Err(xch::RecvTimeoutError::Timeout))
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(xch::TryRecvError::Empty))
    }

    /// For use in `select!` alongside other channels.
    pub fn receiver(&self) -> &xch::Receiver<()> {
        &self.rx
    }
}

pub struct Worker {
    name: String,
    stop_tx: Option<xch::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<F>(name: &str, task: F) -> std::io::Result<Self>
    where
        F: FnOnce(Shutdown) + Send + 'static,
    {
        let (stop_tx, rx) = xch::bounded::<()>(0);
        let shutdown = Shutdown { rx };
        let join_handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                task(shutdown);
            })?;
        tracing::debug!(task = name, "task started");
        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Ask the task to stop without waiting for it.
    pub fn signal(&mut self) {
        self.stop_tx.take();
    }

    /// Signal and join.
    pub fn stop(&mut self) {
        self.signal();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(task = %self.name, "task joined"),
                Err(e) => tracing::warn!(task = %self.name, ?e, "task panicked during shutdown"),
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn drop_stops_a_waiting_task() {
        let ticks = Arc::new(AtomicU32::new(0));
        let t = ticks.clone();
        let worker = Worker::spawn("ticker", move |shutdown| {
            while !shutdown.wait(Duration::from_millis(5)) {
                t.fetch_add(1, Ordering::Relaxed);
            }
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        drop(worker);
        let after = ticks.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::Relaxed), after);
    }

    #[test]
    fn shutdown_not_requested_while_running() {
        let (tx, rx) = xch::bounded(1);
        let mut worker = Worker::spawn("waiter", move |shutdown| {
            let _ = tx.send(shutdown.is_requested());
            shutdown.wait(Duration::from_secs(5));
        })
        .unwrap();
        assert!(!rx.recv().unwrap());
        worker.stop();
        assert!(worker.is_finished());
    }
}
