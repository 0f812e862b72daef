pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub mod prelude {
    pub use crate::memory::MemoryCheckpointStore;
    pub use crate::sqlite::SqliteCheckpointStore;
    pub use crate::store::CheckpointStore;
    pub use crate::types::{Checkpoint, CheckpointMetadata, CheckpointSource};
}
