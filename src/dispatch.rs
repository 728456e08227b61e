//! Ordered, fire-and-forget change dispatch.
//!
//! Each store owns one dispatch thread and a fixed pool of delivery workers.
//! Mutations enqueue their change record while still holding the item lock,
//! so the dispatch queue is in version order. The dispatch thread snapshots
//! the active change streams for every record and hands the record to the
//! worker that owns each matching stream. A stream always maps to the same
//! worker, so it observes versions in increasing order; handlers never run on
//! the mutating thread.
//!
//! Every record carries the reset epoch it was written in. Records from an
//! earlier epoch are dropped instead of dispatched.

use crate::gate::ReadyCallback;
use crate::streams::{ChangeSink, StreamSet};
use crate::types::ChangeRecord;
use crossbeam_channel::{unbounded, Receiver, SendError, Sender};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, trace, warn};

/// Names and sizes the threads a store starts.
#[derive(Clone, Debug)]
pub(crate) struct ThreadSpawner {
    prefix: String,
    stack_size: Option<usize>,
}

impl ThreadSpawner {
    pub fn new(prefix: &str, store: &str, stack_size: Option<usize>) -> Self {
        Self {
            prefix: format!("{}-{}", prefix, store),
            stack_size,
        }
    }

    pub fn spawn<F>(&self, suffix: &str, f: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.prefix, suffix));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(f)
    }
}

/// Work item for the dispatch thread.
enum Job {
    Change { epoch: u64, record: ChangeRecord },
    Ready(Vec<ReadyCallback>),
}

/// One pending handler call.
struct Delivery {
    sink: Arc<ChangeSink>,
    record: ChangeRecord,
}

/// Fixed set of delivery workers. Streams are sharded by id.
struct DeliveryPool {
    workers: Vec<Sender<Delivery>>,
}

impl DeliveryPool {
    fn start(spawner: &ThreadSpawner, size: usize) -> io::Result<Self> {
        let mut workers = Vec::with_capacity(size.max(1));
        for n in 0..size.max(1) {
            let (sender, receiver) = unbounded();
            spawner.spawn(&format!("delivery-{}", n), move || run_worker(receiver))?;
            workers.push(sender);
        }
        Ok(Self { workers })
    }

    fn worker_for(&self, sink: &ChangeSink) -> usize {
        (sink.id().0 % self.workers.len() as u64) as usize
    }

    fn submit(&self, sink: Arc<ChangeSink>, record: ChangeRecord) -> bool {
        let worker = self.worker_for(&sink);
        self.workers[worker].send(Delivery { sink, record }).is_ok()
    }
}

/// Worker loop. A panicking handler is logged and does not take the worker,
/// or the other streams sharded onto it, down with it.
fn run_worker(receiver: Receiver<Delivery>) {
    for Delivery { sink, record } in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(|| sink.run(record))).is_err() {
            error!(stream = %sink.id(), "change handler panicked");
        }
    }
}

/// Sending half of a store's dispatch queue, plus the reset epoch.
///
/// The dispatch thread exits once this is dropped and the queue drains; the
/// workers follow when the dispatch thread drops the pool.
pub(crate) struct Dispatcher {
    sender: Sender<Job>,
    epoch: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn start(
        spawner: &ThreadSpawner,
        workers: usize,
        streams: Arc<StreamSet<ChangeSink>>,
    ) -> io::Result<Self> {
        let pool = DeliveryPool::start(spawner, workers)?;
        let epoch = Arc::new(AtomicU64::new(0));
        let (sender, receiver) = unbounded();

        let current = Arc::clone(&epoch);
        spawner.spawn("dispatch", move || run_dispatch(receiver, streams, current, pool))?;
        Ok(Self { sender, epoch })
    }

    /// Queue a record for fan-out. Never blocks.
    ///
    /// Must be called under the item lock so the stamped epoch and the queue
    /// position agree with the mutation.
    pub fn schedule(&self, record: ChangeRecord) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if let Err(SendError(Job::Change { record, .. })) =
            self.sender.send(Job::Change { epoch, record })
        {
            warn!(item = %record.id, version = %record.version, "dispatch thread gone; change dropped");
        }
    }

    /// Invalidate every record queued so far. Called by reset with the item
    /// and change-stream locks held.
    pub fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Run released readiness callbacks on the dispatch thread.
    pub fn release(&self, callbacks: Vec<ReadyCallback>) {
        if callbacks.is_empty() {
            return;
        }
        if let Err(SendError(Job::Ready(callbacks))) = self.sender.send(Job::Ready(callbacks)) {
            warn!(count = callbacks.len(), "dispatch thread gone; running ready callbacks inline");
            for callback in callbacks {
                callback();
            }
        }
    }
}

fn run_dispatch(
    receiver: Receiver<Job>,
    streams: Arc<StreamSet<ChangeSink>>,
    epoch: Arc<AtomicU64>,
    pool: DeliveryPool,
) {
    for job in receiver.iter() {
        match job {
            Job::Change { epoch: stamped, record } => {
                // Snapshot before the epoch check: a snapshot taken after a
                // reset always sees the advanced epoch.
                let sinks = streams.snapshot();
                if stamped != epoch.load(Ordering::SeqCst) {
                    trace!(item = %record.id, version = %record.version, "stale change dropped");
                    continue;
                }

                let mut queued = 0usize;
                for sink in sinks {
                    if sink.filter().matches(&record) && pool.submit(sink, record.clone()) {
                        queued += 1;
                    }
                }
                trace!(item = %record.id, version = %record.version, queued, "change dispatched");
            }
            Job::Ready(callbacks) => {
                for callback in callbacks {
                    callback();
                }
            }
        }
    }
}
