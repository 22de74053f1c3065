//! Worker-thread pool and process-wide server state.
//!
//! Each worker owns one cooperative event loop (a current-thread runtime
//! driving a `LocalSet`); a connection is handed to exactly one worker and
//! never touched from outside that worker's loop. The pool grows whenever
//! no existing worker has spare capacity and shrinks back down to the
//! configured floor after workers sit empty for the thread timeout.
//!
//! The thread list and the live-client counter live behind a single lock.
//! Assignment increments both counts under that lock before the job is
//! sent, and a worker retires only after re-checking its count under the
//! same lock, so a connection can never be assigned to a dead worker.

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::config::Limits;
use crate::http::connection::{Connection, Dispatcher};

enum Job {
    Conn(std::net::TcpStream, String),
    Shutdown,
}

pub struct Worker {
    id: usize,
    /// Connections currently assigned to this worker.
    clients: AtomicUsize,
    tx: UnboundedSender<Job>,
    /// Pokes the worker loop to re-evaluate its idle-close timer.
    wake: Notify,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

#[derive(Default)]
struct PoolInner {
    workers: Vec<Arc<Worker>>,
    clients: usize,
    next_worker_id: usize,
}

pub struct ServerState {
    pub limits: Limits,
    started: SystemTime,
    inner: Mutex<PoolInner>,
}

impl ServerState {
    pub fn new(limits: Limits) -> Arc<Self> {
        Arc::new(Self {
            limits,
            started: SystemTime::now(),
            inner: Mutex::new(PoolInner::default()),
        })
    }

    /// Pre-spawns the standing floor of worker threads.
    pub fn start(self: &Arc<Self>, dispatcher: &Arc<dyn Dispatcher>) -> Result<()> {
        for _ in 0..self.limits.thread_floor {
            let mut inner = self.inner.lock();
            let worker = self.spawn_worker(&mut inner, dispatcher)?;
            inner.workers.push(worker);
        }
        Ok(())
    }

    /// Admits and assigns an accepted connection.
    ///
    /// Scans for the first worker below the per-thread cap, creating a new
    /// worker when none qualifies; the cap bounds per-worker load, not the
    /// pool size. Fails when the server is at max clients or the worker
    /// thread cannot be created, in which case the caller drops the socket.
    pub fn assign(
        self: &Arc<Self>,
        stream: std::net::TcpStream,
        peer: String,
        dispatcher: &Arc<dyn Dispatcher>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();

        if self.limits.max_clients > 0 && inner.clients >= self.limits.max_clients {
            return Err(anyhow!("too many clients"));
        }

        let worker = inner
            .workers
            .iter()
            .find(|w| w.clients.load(Ordering::Relaxed) < self.limits.clients_per_thread)
            .cloned();

        let worker = match worker {
            Some(worker) => worker,
            None => {
                let worker = self.spawn_worker(&mut inner, dispatcher)?;
                inner.workers.push(worker.clone());
                worker
            }
        };

        inner.clients += 1;
        worker.clients.fetch_add(1, Ordering::Relaxed);
        drop(inner);

        // The worker is alive: it only retires with its count at zero,
        // checked under the lock we just held.
        let _ = worker.tx.send(Job::Conn(stream, peer));
        worker.wake.notify_one();

        Ok(())
    }

    fn spawn_worker(
        self: &Arc<Self>,
        inner: &mut PoolInner,
        dispatcher: &Arc<dyn Dispatcher>,
    ) -> Result<Arc<Worker>> {
        let id = inner.next_worker_id;
        inner.next_worker_id += 1;

        let (tx, rx) = unbounded_channel();

        let worker = Arc::new(Worker {
            id,
            clients: AtomicUsize::new(0),
            tx,
            wake: Notify::new(),
            handle: Mutex::new(None),
        });

        let handle = std::thread::Builder::new()
            .name(format!("folio-worker-{id}"))
            .spawn({
                let state = self.clone();
                let worker = worker.clone();
                let dispatcher = dispatcher.clone();
                move || worker_main(state, worker, dispatcher, rx)
            })
            .context("Failed to spawn worker thread")?;

        *worker.handle.lock() = Some(handle);
        tracing::debug!(worker = id, "Worker thread created");

        Ok(worker)
    }

    /// Returns a connection slot after its task finished.
    fn release(&self, worker: &Worker) {
        let mut inner = self.inner.lock();
        inner.clients = inner.clients.saturating_sub(1);
        worker.clients.fetch_sub(1, Ordering::Relaxed);
        drop(inner);

        worker.wake.notify_one();
    }

    /// Removes an idle worker from the pool if the floor still allows it.
    /// Called by the worker itself when its idle-close timer fires.
    fn try_retire(&self, worker: &Worker) -> bool {
        let mut inner = self.inner.lock();

        if worker.clients.load(Ordering::Relaxed) != 0
            || inner.workers.len() <= self.limits.thread_floor
        {
            return false;
        }

        inner.workers.retain(|w| w.id != worker.id);
        drop(inner);

        // The thread is exiting on its own; nothing left to join.
        let _ = worker.handle.lock().take();
        tracing::debug!(worker = worker.id, "Worker retired");
        true
    }

    /// Drops a worker that failed before its loop could run, returning any
    /// connections it was already accounted for.
    fn drop_worker(&self, worker: &Worker) {
        let mut inner = self.inner.lock();
        inner.workers.retain(|w| w.id != worker.id);
        inner.clients = inner
            .clients
            .saturating_sub(worker.clients.load(Ordering::Relaxed));
    }

    /// Stops every worker and joins their threads. Connections still
    /// attached to a worker are forcibly closed with it.
    pub fn shutdown(&self) {
        let workers: Vec<Arc<Worker>> = self.inner.lock().workers.drain(..).collect();

        for worker in &workers {
            let _ = worker.tx.send(Job::Shutdown);
            worker.wake.notify_one();
        }

        for worker in workers {
            let handle = worker.handle.lock().take();
            if let Some(handle) = handle {
                let _ = handle.join();
            }
        }
    }

    pub fn thread_count(&self) -> usize {
        self.inner.lock().workers.len()
    }

    pub fn client_count(&self) -> usize {
        self.inner.lock().clients
    }

    pub fn started(&self) -> SystemTime {
        self.started
    }
}

fn worker_main(
    state: Arc<ServerState>,
    worker: Arc<Worker>,
    dispatcher: Arc<dyn Dispatcher>,
    rx: UnboundedReceiver<Job>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(worker = worker.id, error = %e, "Failed to build worker runtime");
            state.drop_worker(&worker);
            return;
        }
    };

    // Dropping the LocalSet when the loop exits tears down any
    // connections still attached to this worker.
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, worker_loop(state, worker, dispatcher, rx));
}

async fn worker_loop(
    state: Arc<ServerState>,
    worker: Arc<Worker>,
    dispatcher: Arc<dyn Dispatcher>,
    mut rx: UnboundedReceiver<Job>,
) {
    loop {
        let idle_eligible = worker.clients.load(Ordering::Relaxed) == 0
            && state.thread_count() > state.limits.thread_floor;

        tokio::select! {
            job = rx.recv() => match job {
                Some(Job::Conn(stream, peer)) => {
                    spawn_connection(&state, &worker, &dispatcher, stream, peer);
                }
                Some(Job::Shutdown) | None => break,
            },

            _ = worker.wake.notified() => {}

            _ = tokio::time::sleep(state.limits.thread_timeout()), if idle_eligible => {
                if state.try_retire(&worker) {
                    break;
                }
            }
        }
    }
}

fn spawn_connection(
    state: &Arc<ServerState>,
    worker: &Arc<Worker>,
    dispatcher: &Arc<dyn Dispatcher>,
    stream: std::net::TcpStream,
    peer: String,
) {
    let stream = match tokio::net::TcpStream::from_std(stream) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "Failed to register connection");
            state.release(worker);
            return;
        }
    };

    let state = state.clone();
    let worker = worker.clone();
    let dispatcher = dispatcher.clone();

    tokio::task::spawn_local(async move {
        let mut conn = Connection::new(stream, peer.clone(), state.limits.clone(), dispatcher);

        if let Err(e) = conn.run().await {
            tracing::debug!(peer = %peer, error = %e, "Client exits");
        }

        drop(conn);
        state.release(&worker);
    });
}
