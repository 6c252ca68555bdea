//! # chanlog store
//!
//! Object storage for chanlog. Provides a trait-based interface over
//! content-addressed immutable objects and fork-preserving versioned objects,
//! with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`ObjectStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`VersionedObject`] - One version of a versioned object
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chanlog_core::IdentityHash;
//! use chanlog_store::{ObjectStore, SqliteStore};
//!
//! async fn example() -> chanlog_store::Result<()> {
//!     let store = SqliteStore::open("chanlog.db")?;
//!
//!     let hash = store.put_immutable(b"hello").await?;
//!     assert!(store.has_immutable(&hash).await?);
//!
//!     let identity = IdentityHash::from_bytes([1; 32]);
//!     let v1 = store.put_versioned(&identity, b"first", &[]).await?;
//!     let v2 = store.put_versioned(&identity, b"second", &[v1]).await?;
//!     assert_eq!(store.leaves(&identity).await?, vec![v2]);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent writes**: Storing the same bytes twice yields the same hash
//! - **No overwrites**: Versioned writes always add a version, never replace one
//! - **Forks are data**: Concurrent writers leave sibling leaves, not errors

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ObjectStore, StoreExt, VersionedObject};
