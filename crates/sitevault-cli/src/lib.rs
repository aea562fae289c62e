//! SiteVault CLI library
//!
//! Session cache and API client used by the `sitevault` binary.

pub mod client;
pub mod session;

pub use client::{ApiClient, ClientError, MediaDownload};
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionContext, SessionError, SessionStore,
    SessionUser,
};
