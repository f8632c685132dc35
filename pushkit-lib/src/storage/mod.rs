//! Shared durable storage.
//!
//! The Key & Topic Store and the Subscription Store both sit on a
//! [`SharedStore`]: a namespaced key-value store that the main process writes
//! and the notification extension reads from another process.
//!
//! # Backends
//!
//! - [`FileStore`]: records under `<root>/<namespace>/`, atomic replace via
//!   temp file and rename
//! - [`InMemoryStore`]: single address space, used in tests
//!
//! # Example
//!
//! ```
//! use pushkit_lib::storage::{InMemoryStore, SharedStore};
//!
//! let store = InMemoryStore::new("group.com.pushkit.sdk");
//! store.write("clientId", b"abc").unwrap();
//!
//! let reader = store.reader();
//! assert_eq!(reader.read("clientId").unwrap(), Some(b"abc".to_vec()));
//! assert!(reader.write("clientId", b"x").is_err());
//! ```

mod file;
mod memory;
mod traits;

pub use file::{FileStore, RECORD_FORMAT_VERSION};
pub use memory::InMemoryStore;
pub use traits::{SharedStore, SharedStoreExt, StorageError, StorageErrorCode, StorageResult};
