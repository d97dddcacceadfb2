//! Tabulations and serialisations of validated counting histories.

pub mod aggregate;
pub mod errors;
pub mod sink;

pub use self::aggregate::{base_count, count_records, Participation};
pub use self::errors::find_errors;
pub use self::sink::{write_thread_csv, SinkError, ThreadLogger};
