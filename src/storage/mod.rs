//!  Storage is organized through [record_store::JsonRecordStore].
//!  The basic idea is:
//!   - There is a directory with all the records.
//!   - Each day gets its own file holding one json record per document path.
//!   - Flushing merges buffered time-bucket entries with the stored record
//!     for the same (date, path) key instead of appending blindly.

pub mod entities;
pub mod merge;
pub mod record_store;
pub mod snapshot;
