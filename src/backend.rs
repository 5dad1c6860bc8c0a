use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::error::Error;

/// Boxed error type used at the backend boundary.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Backend-agnostic parameter value bound to a statement placeholder.
///
/// Keeps the writer core decoupled from any concrete driver; backend
/// implementations map these onto their native parameter types.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    BigInt(i64),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::BigInt(i)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(ts: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(ts)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Asynchronous persistence backend used by the writer.
///
/// Implementations are responsible for transporting statements to a
/// concrete store (Postgres, a test double, etc). The writer calls
/// `execute` from background tasks and never awaits it on the producer
/// path.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute one statement with positional parameters.
    ///
    /// **Returns**
    /// - `Ok(())` if the statement was accepted by the store.
    /// - `Err(..)` on any backend failure. During batch persistence the
    ///   writer swallows these per record; during construction they are
    ///   fatal.
    async fn execute(&self, statement: &str, params: &[SqlValue]) -> Result<(), BoxError>;

    /// Probe backend reachability.
    async fn ping(&self) -> Result<(), BoxError>;

    /// Release the underlying connection. Called exactly once, at the end
    /// of the writer shutdown sequence.
    async fn close(&self) -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_conversion_maps_none_to_null() {
        let none: Option<&str> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Null);
        assert_eq!(
            SqlValue::from(Some("t-1")),
            SqlValue::Text("t-1".to_string())
        );
    }
}
