//! Recovery index subsystem
//!
//! Holds the single "last started attempt" record for an output stream:
//! the txid that most recently began and the byte offset of the data file
//! right before that attempt's first write. It is persisted synchronously at
//! every `begin`, independent of commit, and read once at initialization.
//!
//! Only the most recent attempt can be replayed; there is no history.

mod index;
mod record;

pub use index::{RecoveryIndex, INDEX_FILE_PREFIX};
pub use record::{decode, encode, RecoveryRecord, INDEX_FORMAT_VERSION};
