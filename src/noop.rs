use crate::backend::{Backend, BoxError, SqlValue};
use async_trait::async_trait;

/// A backend that accepts everything and stores nothing.
///
/// Useful for measuring the overhead of the writer itself without any
/// external I/O, and for unit tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopBackend;

#[async_trait]
impl Backend for NoopBackend {
    async fn execute(&self, _statement: &str, _params: &[SqlValue]) -> Result<(), BoxError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BoxError> {
        Ok(())
    }
}
