//! Coordination context that owns the catalog
//!
//! A single dedicated thread owns the `Catalog`. Background workers and callers
//! never touch it directly; they queue closures that run on that thread in
//! FIFO order, so catalog mutation and observer dispatch stay single-threaded.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, warn};
use std::thread::{self, JoinHandle};

use crate::catalog::Catalog;

type Task = Box<dyn FnOnce(&mut Catalog) + Send>;

enum Message {
    Run(Task),
    Shutdown,
}

/// Cloneable handle for queueing work onto the coordination context
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: Sender<Message>,
}

impl CoordinatorHandle {
    /// Queue `task` to run on the coordination thread. Returns false if the
    /// coordinator has already shut down; the task is dropped in that case.
    pub fn dispatch<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut Catalog) + Send + 'static,
    {
        self.tx.send(Message::Run(Box::new(task))).is_ok()
    }

    /// Run `task` on the coordination thread and wait for its result.
    ///
    /// Must not be called from the coordination thread itself (including from
    /// observer callbacks), since it would wait on its own queue.
    pub fn call<F, R>(&self, task: F) -> Option<R>
    where
        F: FnOnce(&mut Catalog) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded(1);
        let queued = self.dispatch(move |catalog| {
            let _ = reply_tx.send(task(catalog));
        });
        if !queued {
            return None;
        }
        reply_rx.recv().ok()
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("queued", &self.tx.len())
            .finish()
    }
}

/// Owner of the coordination thread
pub struct Coordinator {
    handle: CoordinatorHandle,
    thread: Option<JoinHandle<Catalog>>,
}

impl Coordinator {
    /// Move `catalog` onto a new coordination thread
    pub fn spawn(catalog: Catalog) -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("catalog-coordinator".to_string())
            .spawn(move || run(catalog, rx))?;

        Ok(Self {
            handle: CoordinatorHandle { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Stop after the work queued so far and hand the catalog back
    pub fn shutdown(mut self) -> Option<Catalog> {
        self.stop()
    }

    fn stop(&mut self) -> Option<Catalog> {
        let thread = self.thread.take()?;
        let _ = self.handle.tx.send(Message::Shutdown);
        match thread.join() {
            Ok(catalog) => Some(catalog),
            Err(_) => {
                warn!("Catalog coordinator thread panicked");
                None
            }
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut catalog: Catalog, rx: Receiver<Message>) -> Catalog {
    debug!("Catalog coordinator started");
    while let Ok(message) = rx.recv() {
        match message {
            Message::Run(task) => task(&mut catalog),
            Message::Shutdown => break,
        }
    }
    debug!("Catalog coordinator stopped");
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;
    use crate::models::SortOrder;

    #[test]
    fn test_call_returns_value() {
        let coordinator = Coordinator::spawn(Catalog::default()).unwrap();
        let handle = coordinator.handle();

        handle.dispatch(|catalog| {
            catalog.insert(vec![record("a", 1)], true);
        });
        assert_eq!(handle.call(|catalog| catalog.len()), Some(1));
    }

    #[test]
    fn test_tasks_run_in_order_on_one_thread() {
        let coordinator = Coordinator::spawn(Catalog::new(SortOrder::Name)).unwrap();
        let handle = coordinator.handle();
        let caller = thread::current().id();

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for j in 0..10 {
                        handle.dispatch(move |catalog| {
                            catalog.insert(vec![record(&format!("{}-{}", i, j), j)], false);
                        });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let (len, thread_id) = handle
            .call(|catalog| (catalog.len(), thread::current().id()))
            .unwrap();
        assert_eq!(len, 40);
        assert_ne!(thread_id, caller);
    }

    #[test]
    fn test_shutdown_returns_catalog() {
        let coordinator = Coordinator::spawn(Catalog::default()).unwrap();
        let handle = coordinator.handle();
        handle.dispatch(|catalog| {
            catalog.insert(vec![record("kept", 1)], true);
        });

        let catalog = coordinator.shutdown().unwrap();
        assert_eq!(catalog.len(), 1);

        assert!(!handle.dispatch(|_| {}));
        assert_eq!(handle.call(|catalog| catalog.len()), None);
    }
}
