use std::sync::Arc;
use std::time::Duration;

use batched_log_writer::console::ConsoleWriter;
use batched_log_writer::multi::{LogWriter, LogWriterExt, MultiWriter};
use batched_log_writer::noop::NoopBackend;
use batched_log_writer::record::field;
use batched_log_writer::writer::{DbWriter, WriterConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Fan out across a console writer and a buffered database writer.
    // `NoopBackend` stands in for a real database here; swap in
    // `PgBackend::connect(..)` with the `postgres` feature enabled.
    let db = DbWriter::new(
        Arc::new(NoopBackend),
        WriterConfig {
            table: "logs".to_string(),
            capacity: 100,
            flush_interval: Duration::from_secs(1),
        },
    )
    .await?;

    let multi = MultiWriter::new(vec![
        Arc::new(ConsoleWriter::new()) as Arc<dyn LogWriter>,
        Arc::new(db),
    ]);

    multi.info("cache warmed", vec![field("entries", 4096)]);
    multi.warn(
        "replica lagging",
        vec![field("duration", "740ms"), field("replica", "eu-2")],
    );
    multi.error("upstream timeout", vec![field("trace", "t-51c")]);

    multi.close().await?;
    Ok(())
}
