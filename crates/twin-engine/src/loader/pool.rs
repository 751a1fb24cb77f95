use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};

use super::{EmbeddedAssets, LoadError, ResourceUri};

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of worker threads (at least one).
    pub workers: usize,
    /// Assets reachable through `res:` URIs.
    pub assets: EmbeddedAssets,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .clamp(1, 4);
        Self {
            workers,
            assets: EmbeddedAssets::default(),
        }
    }
}

/// Result of a background load, tagged with the generation it was requested under.
#[derive(Debug)]
pub struct Completion<T> {
    pub generation: u64,
    pub source: String,
    pub result: Result<T, LoadError>,
}

pub(crate) type Job = Box<dyn FnOnce(&EmbeddedAssets) + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Cloneable submission side of the loader.
#[derive(Clone)]
pub struct LoaderHandle {
    jobs: Sender<Message>,
}

impl std::fmt::Debug for LoaderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderHandle").finish_non_exhaustive()
    }
}

impl LoaderHandle {
    /// Queues `decode` for `source` and returns immediately.
    ///
    /// The completion is sent to `reply` from a worker thread. If the loader
    /// has shut down, a `LoaderClosed` completion is sent right away.
    pub fn submit<T, F>(&self, source: &str, generation: u64, reply: Sender<Completion<T>>, decode: F)
    where
        T: Send + 'static,
        F: FnOnce(&ResourceUri, &EmbeddedAssets) -> Result<T, LoadError> + Send + 'static,
    {
        let uri = ResourceUri::parse(source);
        let owned = source.to_owned();
        let closed_reply = reply.clone();

        log::debug!("load requested: '{source}' (generation {generation})");

        let job: Job = Box::new(move |assets| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| decode(&uri, assets)))
                .unwrap_or_else(|payload| Err(LoadError::Panicked(panic_message(payload.as_ref()))));

            if let Err(err) = &result {
                log::debug!("load of '{owned}' failed on worker: {err}");
            }
            // The resource may be gone by now; nobody is left to care.
            let _ = reply.send(Completion {
                generation,
                source: owned,
                result,
            });
        });

        if self.jobs.send(Message::Run(job)).is_err() {
            let _ = closed_reply.send(Completion {
                generation,
                source: source.to_owned(),
                result: Err(LoadError::LoaderClosed),
            });
        }
    }
}

/// Worker pool owning the loader threads.
///
/// Dropping the pool lets queued jobs finish, then stops and joins the
/// workers. There is no cancellation: a decode that never returns blocks
/// the join.
pub struct AsyncLoader {
    jobs: Sender<Message>,
    workers: Vec<JoinHandle<()>>,
}

impl AsyncLoader {
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let (tx, rx) = unbounded::<Message>();
        let count = config.workers.max(1);

        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let rx = rx.clone();
            let assets = config.assets.clone();
            let worker = std::thread::Builder::new()
                .name(format!("twin-loader-{index}"))
                .spawn(move || worker_loop(rx, assets))
                .with_context(|| format!("failed to spawn loader worker {index}"))?;
            workers.push(worker);
        }

        log::info!("async loader started with {count} worker(s)");
        Ok(Self { jobs: tx, workers })
    }

    pub fn handle(&self) -> LoaderHandle {
        LoaderHandle {
            jobs: self.jobs.clone(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for AsyncLoader {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.jobs.send(Message::Stop);
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("loader worker terminated abnormally");
            }
        }
        log::debug!("async loader stopped");
    }
}

fn worker_loop(rx: Receiver<Message>, assets: EmbeddedAssets) {
    for message in rx.iter() {
        match message {
            Message::Run(job) => job(&assets),
            Message::Stop => break,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Handle whose jobs are not executed by any worker; tests pop and run them
/// in whatever order they need.
#[cfg(test)]
pub(crate) fn detached_handle() -> (LoaderHandle, Receiver<Job>) {
    let (tx, rx) = unbounded::<Message>();
    let (job_tx, job_rx) = unbounded::<Job>();
    std::thread::spawn(move || {
        for message in rx.iter() {
            if let Message::Run(job) = message {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
        }
    });
    (LoaderHandle { jobs: tx }, job_rx)
}
