// TodoStore - Task list state container with pluggable key-value persistence

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use error::{PersistenceWarning, TaskError, ValidationError};
pub use filter::TaskFilter;
pub use models::{Task, TaskCounts, TaskId};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, SqliteStorage};
pub use store::{DEFAULT_STORAGE_KEY, StoreEvent, TaskStore};
