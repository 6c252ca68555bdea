//! Shared helpers for channel integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chanlog::core::{ChannelObject, Payload};
use chanlog::store::MemoryStore;
use chanlog::{ChannelManager, ManagerConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub reading: i64,
}

impl ChannelObject for Temperature {
    const TYPE_NAME: &'static str = "Temperature";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
}

impl ChannelObject for Note {
    const TYPE_NAME: &'static str = "Note";
}

/// Route engine logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn memory_manager() -> ChannelManager<MemoryStore> {
    init_tracing();
    ChannelManager::new(Arc::new(MemoryStore::new()), ManagerConfig::default())
}

pub fn text(s: &str) -> Payload {
    Payload::bytes("text", s.as_bytes().to_vec())
}

pub fn text_of(payload: &Payload) -> String {
    match &payload.body {
        chanlog::core::Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => panic!("unexpected body {other:?}"),
    }
}
