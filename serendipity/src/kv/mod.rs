//! Local key-value persistence.
//!
//! The preference store writes its collection through [`KeyValueStore`];
//! the concrete backend is chosen by the caller.

mod file;
mod memory;
mod traits;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use traits::{BoxFuture, KeyValueStore, KvError};
