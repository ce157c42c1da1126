//! Storage implementations for PromptScaffold.
//!
//! Local: [`FileStore`] implements `promptscaffold_core::KeyValueStore`.
//! Remote: [`DriveStore`] implements `promptscaffold_core::RemoteStore`.

pub mod drive;
pub mod file_store;

pub use drive::DriveStore;
pub use file_store::FileStore;
