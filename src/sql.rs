//! SQL text construction for the log table.
//!
//! Provisioning is idempotent (`IF NOT EXISTS` everywhere) so repeated
//! writer construction against the same table is safe.

use crate::backend::SqlValue;
use crate::record::LogRecord;
use serde_json::Value;

/// Idempotent creation of the primary log table.
pub fn create_table_statement(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         id BIGSERIAL PRIMARY KEY, \
         timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
         level VARCHAR(20) NOT NULL, \
         content TEXT, \
         log_type VARCHAR(20), \
         duration VARCHAR(50), \
         trace VARCHAR(100), \
         span VARCHAR(100), \
         user_id BIGINT, \
         fields JSONB)"
    )
}

/// Idempotent secondary lookup indexes on the columns queries filter by.
pub fn index_statements(table: &str) -> Vec<String> {
    ["timestamp", "level", "trace", "user_id", "log_type"]
        .iter()
        .map(|col| format!("CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table}({col})"))
        .collect()
}

/// Positional insert covering every persisted column.
pub fn insert_statement(table: &str) -> String {
    format!(
        "INSERT INTO {table} \
         (timestamp, level, content, log_type, duration, trace, span, user_id, fields) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
    )
}

/// Bind a record's values in insert column order.
///
/// The residual field map is encoded as JSON; an absent map persists as a
/// JSON `null` rather than failing the record.
pub fn bind_params(record: &LogRecord) -> Vec<SqlValue> {
    let fields = match &record.fields {
        Some(map) => serde_json::to_value(map).unwrap_or(Value::Null),
        None => Value::Null,
    };
    vec![
        SqlValue::Timestamp(record.timestamp),
        SqlValue::Text(record.level.as_str().to_string()),
        SqlValue::Text(record.content.clone()),
        SqlValue::from(record.log_type.clone()),
        SqlValue::from(record.duration.clone()),
        SqlValue::from(record.trace.clone()),
        SqlValue::from(record.span.clone()),
        SqlValue::from(record.user_id),
        SqlValue::Json(fields),
    ]
}
