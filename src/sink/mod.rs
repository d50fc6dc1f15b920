//! Transactional sink
//!
//! The coordinator ties the output channel and the recovery index together
//! and exposes the batch lifecycle to the host pipeline:
//!
//! ```ignore
//! let mut sink = TransactionalSink::initialize(options)?;
//! sink.begin(txid)?;
//! sink.apply(&records)?;
//! sink.commit(txid)?;
//! sink.close()?;
//! ```
//!
//! One sink owns one stream partition. Sinks for different partitions share
//! nothing and can run on separate threads.

mod coordinator;
mod options;

pub use coordinator::{ApplySummary, SinkState, TransactionalSink};
pub use options::{parse_output_uri, SinkOptions};

pub(crate) use coordinator::data_dir;
