//! # chanlog testkit
//!
//! Testing utilities for chanlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Canonical bytes of every hashed object kind
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A manager over a fresh store plus helpers for forks and series
//!
//! ## Golden Vectors
//!
//! ```rust
//! use chanlog_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use chanlog_testkit::generators::ForkParams;
//!
//! proptest! {
//!     #[test]
//!     fn merge_keeps_every_post(params: ForkParams) {
//!         // build the fork, merge both ways, compare
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use chanlog_testkit::fixtures::ChannelFixture;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fixture = ChannelFixture::new();
//! let base = fixture.post_series("temps", None, &[1, 2]).await.unwrap().unwrap();
//! let (left, right) = fixture.fork(&base, 1, 1).await.unwrap();
//! fixture.manager.merge_channels(&left.version, &right.version).await.unwrap();
//! # });
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{owners, random_payloads, series_payload, ChannelFixture, Reading};
pub use generators::{ForkParams, PostParams};
pub use vectors::{all_vectors, encode_vector, export_json, verify_all_vectors, GoldenVector};
