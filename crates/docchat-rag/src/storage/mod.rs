//! Persistence: SQLite database, document registry, source files and
//! per-document locks

mod database;
mod locks;
mod registry;
mod sources;

pub use database::{Database, FragmentRecord, IndexMeta};
pub use locks::{DocumentGuard, DocumentLocks};
pub use registry::DocumentRegistry;
pub use sources::SourceStore;
