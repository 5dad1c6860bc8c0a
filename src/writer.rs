use crate::backend::{Backend, BoxError};
use crate::multi::LogWriter;
use crate::record::{Field, Level, LogRecord};
use crate::sql;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Upper bound on one batch's persistence time, shared across the whole
/// batch. Once it expires, remaining records in the batch are abandoned.
const PERSIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`DbWriter`]. Immutable after construction.
///
/// **Fields**
/// - `table`: target table name, provisioned idempotently at startup.
/// - `capacity`: number of buffered records that triggers an immediate
///   flush.
/// - `flush_interval`: maximum time between flushes even when the buffer
///   stays below `capacity`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub table: String,
    pub capacity: usize,
    pub flush_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            table: "logs".to_string(),
            capacity: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Errors surfaced by [`DbWriter`]. Per-record persistence failures are
/// deliberately absent: they are swallowed so producers never observe
/// backend errors through the logging API.
#[derive(thiserror::Error, Debug)]
pub enum WriterError {
    #[error("backend unreachable: {0}")]
    Unreachable(#[source] BoxError),

    #[error("table provisioning failed: {0}")]
    Provision(#[source] BoxError),

    #[error("backend release failed: {0}")]
    Release(#[source] BoxError),

    #[error("writer is closed")]
    Closed,
}

/// State shared between producers, the timer loop and in-flight flush
/// tasks.
struct Inner {
    backend: Arc<dyn Backend>,
    insert: String,
    capacity: usize,
    buffer: Mutex<Vec<LogRecord>>,
    handle: Handle,
    /// Dispatched batches whose persistence has not finished yet. Close
    /// waits for this to reach zero before releasing the backend.
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Inner {
    fn lock_buffer(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append under lock; when the capacity threshold is crossed the
    /// buffer is swapped for a fresh one under the same lock and the
    /// drained batch is dispatched before returning. The lock is never
    /// held across backend I/O.
    fn append(self: &Arc<Self>, record: LogRecord) {
        let batch = {
            let mut buf = self.lock_buffer();
            buf.push(record);
            if buf.len() >= self.capacity {
                mem::replace(&mut *buf, Vec::with_capacity(self.capacity))
            } else {
                Vec::new()
            }
        };
        self.dispatch(batch);
    }

    /// Swap the buffer contents out under lock. No-op on an empty buffer.
    fn drain(&self) -> Vec<LogRecord> {
        let mut buf = self.lock_buffer();
        if buf.is_empty() {
            Vec::new()
        } else {
            mem::replace(&mut *buf, Vec::with_capacity(self.capacity))
        }
    }

    /// Hand a drained batch to an independent task so neither producers
    /// nor the timer loop wait on backend latency.
    fn dispatch(self: &Arc<Self>, batch: Vec<LogRecord>) {
        if batch.is_empty() {
            return;
        }
        let inner = Arc::clone(self);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.handle.spawn(async move {
            inner.persist(batch).await;
            if inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.idle.notify_waiters();
            }
        });
    }

    /// Wait until every dispatched batch has finished persisting.
    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn flush(self: &Arc<Self>) {
        let batch = self.drain();
        self.dispatch(batch);
    }

    /// Write a batch record by record, in append order. A single record's
    /// failure is swallowed and the rest of the batch continues; the whole
    /// batch shares one time bound so a stalled backend cannot block
    /// indefinitely.
    async fn persist(&self, batch: Vec<LogRecord>) {
        if batch.is_empty() {
            return;
        }
        let _ = timeout(PERSIST_TIMEOUT, async {
            for record in &batch {
                let params = sql::bind_params(record);
                let _ = self.backend.execute(&self.insert, &params).await;
            }
        })
        .await;
    }
}

/// Buffered asynchronous writer that persists log records to a
/// [`Backend`] in batches.
///
/// Records accumulate in a lock-guarded buffer and are flushed either
/// when the capacity threshold is reached or on a periodic timer,
/// whichever comes first. Each flush persists off the producer path, so
/// log calls never wait on backend I/O. [`DbWriter::close`] stops the
/// timer, persists everything still buffered and releases the backend.
pub struct DbWriter {
    inner: Arc<Inner>,
    table: String,
    closed: AtomicBool,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DbWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbWriter")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl DbWriter {
    /// Construct a writer: probe the backend, provision the table and its
    /// indexes, then start the periodic flush loop.
    ///
    /// Both the reachability probe and provisioning are eager and fatal;
    /// on failure no writer instance is produced. Must be called within a
    /// Tokio runtime, whose handle is captured for flush dispatch.
    pub async fn new(backend: Arc<dyn Backend>, config: WriterConfig) -> Result<Self, WriterError> {
        let WriterConfig {
            table,
            capacity,
            flush_interval,
        } = config;

        // Clamp degenerate values instead of failing construction.
        let capacity = if capacity == 0 {
            tracing::warn!("capacity 0 clamped to 1");
            1
        } else {
            capacity
        };
        let flush_interval = if flush_interval < Duration::from_millis(10) {
            tracing::warn!("flush interval below 10ms clamped");
            Duration::from_millis(10)
        } else {
            flush_interval
        };

        backend.ping().await.map_err(WriterError::Unreachable)?;

        backend
            .execute(&sql::create_table_statement(&table), &[])
            .await
            .map_err(WriterError::Provision)?;
        for stmt in sql::index_statements(&table) {
            backend
                .execute(&stmt, &[])
                .await
                .map_err(WriterError::Provision)?;
        }

        let inner = Arc::new(Inner {
            backend,
            insert: sql::insert_statement(&table),
            capacity,
            buffer: Mutex::new(Vec::with_capacity(capacity)),
            handle: Handle::current(),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        });

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let loop_inner = Arc::clone(&inner);
        let flush_task = tokio::spawn(async move {
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick completes immediately; consume it so
            // the first periodic flush happens one full interval in.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => loop_inner.flush(),
                    _ = &mut shutdown_rx => return,
                }
            }
        });

        Ok(DbWriter {
            inner,
            table,
            closed: AtomicBool::new(false),
            shutdown: Mutex::new(Some(shutdown_tx)),
            flush_task: Mutex::new(Some(flush_task)),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Append one already-built record. Never blocks on I/O; records
    /// appended after [`close`](DbWriter::close) are discarded.
    pub fn append(&self, record: LogRecord) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.inner.append(record);
    }

    /// Force an immediate drain and persist, outside the timer cadence.
    /// Unlike the background flushes this awaits the persistence step.
    pub async fn flush_now(&self) -> Result<(), WriterError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WriterError::Closed);
        }
        let batch = self.inner.drain();
        self.inner.persist(batch).await;
        Ok(())
    }

    /// Proxy to the backend's reachability probe.
    pub async fn health_check(&self) -> Result<(), WriterError> {
        self.inner
            .backend
            .ping()
            .await
            .map_err(WriterError::Unreachable)
    }

    /// Shut the writer down: stop the timer loop, persist everything still
    /// buffered (awaited, not fire-and-forget), then release the backend.
    ///
    /// The transition happens exactly once; later calls return
    /// [`WriterError::Closed`]. The return value is the outcome of the
    /// backend release.
    pub async fn close(&self) -> Result<(), WriterError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(WriterError::Closed);
        }

        let shutdown = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = shutdown {
            let _ = tx.send(());
        }
        let task = self
            .flush_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }

        // Let batches dispatched before close finish, then drain what is
        // left and persist it inline.
        self.inner.wait_idle().await;
        let batch = self.inner.drain();
        self.inner.persist(batch).await;

        self.inner
            .backend
            .close()
            .await
            .map_err(WriterError::Release)
    }
}

impl Drop for DbWriter {
    /// A writer dropped without [`close`](DbWriter::close) must not leave
    /// the timer task running and pinning the backend forever. Buffered
    /// records are lost on this path; only `close` guarantees delivery.
    fn drop(&mut self) {
        let task = self
            .flush_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[async_trait]
impl LogWriter for DbWriter {
    fn log(&self, level: Level, content: String, fields: Vec<Field>) {
        self.append(LogRecord::build(level, content, fields));
    }

    async fn flush(&self) -> Result<(), BoxError> {
        self.flush_now().await.map_err(Into::into)
    }

    async fn close(&self) -> Result<(), BoxError> {
        DbWriter::close(self).await.map_err(Into::into)
    }
}
