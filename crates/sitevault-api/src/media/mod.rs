//! Media range proxy
//!
//! - repository: gallery row lookup
//! - storage: signed URL issuance against the hosted object store
//! - proxy: HEAD sizing, window resolution and ranged relay

pub mod proxy;
pub mod repository;
pub mod storage;

pub use proxy::{MediaError, MediaProxy, ProxiedMedia};
pub use repository::{MediaObject, MediaRepository, PgMediaRepository};
pub use storage::{HostedStorage, ObjectStorage, StorageError};
