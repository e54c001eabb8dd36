mod file;
mod memory;
mod store;

pub use file::{FileStore, FileStoreBuilder};
pub use memory::MemoryStore;
pub use store::SnapshotStore;
