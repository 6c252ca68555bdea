//! # chanlog
//!
//! Fork-tolerant channel logs over a content-addressed object store.
//!
//! ## Overview
//!
//! A channel is a named, optionally owned, append-only log. Every post
//! becomes an immutable entry linked to the one before it, and every change
//! to a channel's head writes a new version instead of overwriting the old
//! one. Writers never block each other:
//!
//! - **Append**: Posts build on the current head optimistically
//! - **Fork**: Two posts against the same head leave two sibling versions
//! - **Merge**: Deterministically reconciles a fork into one timestamp-ordered chain
//! - **Query**: Lazy, chronological k-way iteration across any set of channels
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chanlog::{ChannelManager, ManagerConfig};
//! use chanlog::core::{Payload, Query};
//! use chanlog::store::SqliteStore;
//!
//! async fn example() -> chanlog::Result<()> {
//!     let store = Arc::new(SqliteStore::open("channels.db")?);
//!     let manager = ChannelManager::new(store, ManagerConfig::default());
//!
//!     manager
//!         .post_to_channel("temps", &Payload::bytes("Temperature", b"21.5".to_vec()), None)
//!         .await?;
//!
//!     let newest = manager.get_objects(Query::new().channel("temps").count(10)).await?;
//!     println!("{} readings", newest.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `chanlog::core` - Objects, ids, canonical encoding and queries
//! - `chanlog::store` - The object store trait and its backends

pub mod append;
pub mod chain;
pub mod clock;
pub mod error;
pub mod events;
pub mod manager;
pub mod merge;
pub mod query;
pub mod registry;

pub use chanlog_core as core;
pub use chanlog_store as store;

pub use append::AppendEngine;
pub use chain::{ChainNode, ChainWalker};
pub use clock::Clock;
pub use error::{ChannelError, Result};
pub use events::{ChannelUpdated, EventBus, UpdateCause, UpdateStream};
pub use manager::{ChannelInfo, ChannelManager, ManagerConfig};
pub use merge::{Divergence, MergeEngine};
pub use query::{ObjectStream, QueryEngine};
pub use registry::Registry;

pub use chanlog_core::{
    ChannelKey, ChannelObject, EntryId, HeadVersion, ObjectData, Order, OwnerFilter, OwnerId,
    Payload, Query, VersionId,
};
