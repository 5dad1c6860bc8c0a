pub mod backend;
pub mod record;
pub mod sql;
pub mod writer;

pub mod console;
pub mod multi;
pub mod noop;

#[cfg(feature = "postgres")]
pub mod postgres;
