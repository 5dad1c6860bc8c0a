use crate::backend::BoxError;
use crate::record::{field, Field, Level};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

/// Common surface shared by every log writer (database, console, fan-out).
///
/// `log` is fire-and-forget and must never block on I/O; `close` releases
/// whatever the writer holds and is called once at shutdown.
#[async_trait]
pub trait LogWriter: Send + Sync {
    fn log(&self, level: Level, content: String, fields: Vec<Field>);

    /// Force buffered records out to the destination, if the writer
    /// buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BoxError>;
}

/// Convenience methods layered over [`LogWriter`], kept separate so the
/// base trait stays object-safe.
pub trait LogWriterExt: LogWriter {
    fn info(&self, content: impl Display, fields: Vec<Field>) {
        self.log(Level::Info, content.to_string(), fields);
    }

    fn error(&self, content: impl Display, fields: Vec<Field>) {
        self.log(Level::Error, content.to_string(), fields);
    }

    fn debug(&self, content: impl Display, fields: Vec<Field>) {
        self.log(Level::Debug, content.to_string(), fields);
    }

    fn warn(&self, content: impl Display, fields: Vec<Field>) {
        self.log(Level::Warn, content.to_string(), fields);
    }

    /// Start a two-step log call: capture level and content now, attach
    /// fields later, enqueue on [`EventBuilder::emit`].
    fn event(&self, level: Level, content: impl Display) -> EventBuilder<'_, Self> {
        EventBuilder {
            writer: self,
            level,
            content: content.to_string(),
            fields: Vec::new(),
        }
    }
}

impl<W: LogWriter + ?Sized> LogWriterExt for W {}

/// Intermediate value of the chained call pattern
/// (`writer.event(..).field(..).emit()`). Not shared across threads;
/// nothing is enqueued until `emit`.
#[must_use = "an event does nothing until emit() is called"]
pub struct EventBuilder<'a, W: LogWriter + ?Sized> {
    writer: &'a W,
    level: Level,
    content: String,
    fields: Vec<Field>,
}

impl<W: LogWriter + ?Sized> EventBuilder<'_, W> {
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.fields.push(field(key, value));
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Terminal call: build the record and hand it to the writer.
    pub fn emit(self) {
        self.writer.log(self.level, self.content, self.fields);
    }
}

/// Fan-out writer that replicates every call across multiple independent
/// writers, sequentially and in registration order.
pub struct MultiWriter {
    writers: Vec<Arc<dyn LogWriter>>,
}

impl MultiWriter {
    pub fn new(writers: Vec<Arc<dyn LogWriter>>) -> Self {
        MultiWriter { writers }
    }
}

#[async_trait]
impl LogWriter for MultiWriter {
    fn log(&self, level: Level, content: String, fields: Vec<Field>) {
        for writer in &self.writers {
            writer.log(level.clone(), content.clone(), fields.clone());
        }
    }

    async fn flush(&self) -> Result<(), BoxError> {
        let mut failures = Vec::new();
        for writer in &self.writers {
            if let Err(e) = writer.flush().await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("errors flushing writers: {}", failures.join("; ")).into())
        }
    }

    /// Close every writer even when an earlier one fails; collected
    /// failures are reported as a single error.
    async fn close(&self) -> Result<(), BoxError> {
        let mut failures = Vec::new();
        for writer in &self.writers {
            if let Err(e) = writer.close().await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("errors closing writers: {}", failures.join("; ")).into())
        }
    }
}
