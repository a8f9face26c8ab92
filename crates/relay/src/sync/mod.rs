//! Sync engine, bulk importer and pacing

pub mod engine;
pub mod import;
pub mod timing;

pub use engine::{SyncEngine, SyncOptions, SyncPath, SyncReport};
pub use import::{BulkImporter, ImportReport, ImportTarget};
pub use timing::{Pacer, RecordingPacer, Shutdown, ShutdownRequest, ThreadPacer};
