//! Cobalt Store
//!
//! The durable, crash-safe observation queue (`FileObservationStore`) and a
//! small single-message snapshot store (`ConsistentProtoStore`), both built
//! on an injected `FileSystem` capability rather than `std::fs` directly.

pub mod error;
pub mod file_store;
pub mod fs;
pub mod holder;
pub mod naming;
pub mod proto_store;
pub mod record;

pub use error::StoreError;
pub use file_store::{FileObservationStore, FileObservationStoreConfig};
pub use fs::{FileSystem, PosixFileSystem};
pub use holder::EnvelopeHolder;
pub use proto_store::ConsistentProtoStore;
