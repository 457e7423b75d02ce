//! Simple thread pool for processing batches of independent jobs.

use crossbeam::channel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to complete jobs: a worker thread panicked")]
    WorkerPanicked,

    #[error("failed to enqueue jobs: closed sender channel")]
    ClosedSenderChannel,

    #[error("failed to collect job results: no output for job {0}")]
    MissingOutput(usize),
}
use PoolError::*;
pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Copy, Clone, Debug)]
enum ToWorker {
    Stop,
    Work(usize),
}

/// A simple thread pool to run batches of indexed jobs in parallel.
///
/// Workload between threads is automatically balanced by means of a
/// single-producer, multiple-consumer channel. Unlike a persistent pool,
/// workers are scoped to a single batch, so jobs may borrow from the caller.
/// Outputs are returned in job order, regardless of the order in which jobs
/// finished.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkerPool {
    nthreads: usize,
}

impl Default for WorkerPool {
    fn default() -> Self { Self::serial() }
}

impl WorkerPool {
    /// Create a new thread pool of `nthreads` threads.
    ///
    /// A pool of zero or one threads runs every job on the calling thread.
    pub fn new(nthreads: usize) -> Self { Self { nthreads: nthreads.max(1) } }

    /// Create a new thread pool with the number of threads equal to the number
    /// of logical CPU cores available in the current system.
    pub fn new_cpus() -> Self { Self::new(num_cpus::get()) }

    /// Create a new thread pool with the number of threads equal to the number
    /// of physical CPU cores available in the current system.
    pub fn new_physical() -> Self { Self::new(num_cpus::get_physical()) }

    /// Create a new pool that runs every job on the calling thread.
    pub fn serial() -> Self { Self::new(1) }

    /// Return the number of threads.
    pub fn nthreads(&self) -> usize { self.nthreads }

    /// Run `f(k)` for every `k` in `0..n`, distributing jobs across all
    /// threads, and return the outputs in order of `k`.
    ///
    /// This method will block until all jobs have been completed.
    ///
    /// Fails if a worker panics.
    pub fn map_indexed<T, F>(&self, n: usize, f: F) -> PoolResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        if self.nthreads == 1 || n <= 1 {
            return Ok((0..n).map(f).collect());
        }
        let nworkers = self.nthreads.min(n);
        let (tx_in, rx_in) = channel::unbounded();
        let (tx_out, rx_out) = channel::unbounded();
        for k in 0..n {
            tx_in.send(ToWorker::Work(k)).map_err(|_| ClosedSenderChannel)?;
        }
        for _ in 0..nworkers {
            tx_in.send(ToWorker::Stop).map_err(|_| ClosedSenderChannel)?;
        }
        let f = &f;
        let scoped = crossbeam::scope(|s| {
            for _ in 0..nworkers {
                let worker_receiver = rx_in.clone();
                let worker_sender = tx_out.clone();
                s.spawn(move |_| loop {
                    match worker_receiver.recv() {
                        Ok(ToWorker::Work(k)) => {
                            if worker_sender.send((k, f(k))).is_err() { break; }
                        },
                        Ok(ToWorker::Stop) | Err(_) => { break; },
                    }
                });
            }
        });
        drop(tx_out);
        scoped.map_err(|_| WorkerPanicked)?;
        let mut output: Vec<Option<T>> = (0..n).map(|_| None).collect();
        for (k, t) in rx_out.try_iter() {
            output[k] = Some(t);
        }
        output.into_iter().enumerate()
            .map(|(k, t)| t.ok_or(MissingOutput(k)))
            .collect()
    }
}
