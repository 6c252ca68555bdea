//! Channels over the persistent store.

mod common;

use std::sync::Arc;

use chanlog::core::{OwnerId, Query};
use chanlog::store::SqliteStore;
use chanlog::{ChannelManager, ManagerConfig};
use common::{init_tracing, text, text_of, Temperature};

fn open(path: &std::path::Path) -> anyhow::Result<ChannelManager<SqliteStore>> {
    init_tracing();
    let store = SqliteStore::open(path)?;
    Ok(ChannelManager::new(Arc::new(store), ManagerConfig::default()))
}

#[tokio::test]
async fn channels_survive_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("channels.db");
    let owner = OwnerId::derive("sensor-7");

    let head = {
        let manager = open(&path)?;
        for reading in 1..=3 {
            manager
                .post_object("temps", &Temperature { reading }, Some(owner))
                .await?;
        }
        manager.post_to_channel("log", &text("boot"), None).await?
    };

    let manager = open(&path)?;
    assert!(manager.has_channel("temps", Some(owner)).await?);
    assert_eq!(manager.channels(&Query::new()).await?.len(), 2);

    let readings: Vec<i64> = manager
        .get_objects_with_type::<Temperature>(Query::new().owner(owner))
        .await?
        .into_iter()
        .map(|o| o.data.reading)
        .collect();
    assert_eq!(readings, vec![3, 2, 1]);

    let current = manager.current_head("log", None).await?.unwrap();
    assert_eq!(current, head);

    let next = manager.post_to_channel("log", &text("again"), None).await?;
    let log = manager.get_objects(Query::new().channel("log")).await?;
    assert_eq!(log.len(), 2);
    assert_eq!(text_of(&log[0].data), "again");
    assert!(log[0].timestamp > log[1].timestamp);
    assert_eq!(manager.leaves("log", None).await?, vec![next.version]);
    Ok(())
}

#[tokio::test]
async fn forks_and_merges_persist() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("forks.db");

    let (left, right) = {
        let manager = open(&path)?;
        let base = manager.post_to_channel("doc", &text("base"), None).await?;
        let left = manager.append_to_version(&base.version, &text("left")).await?;
        let right = manager.append_to_version(&base.version, &text("right")).await?;
        (left, right)
    };

    let manager = open(&path)?;
    assert_eq!(
        manager.leaves("doc", None).await?,
        vec![left.version, right.version]
    );

    let merged = manager.merge_channels(&left.version, &right.version).await?;
    assert_eq!(manager.leaves("doc", None).await?, vec![merged.version]);

    let texts: Vec<String> = manager
        .get_objects(Query::new().channel("doc").ascending())
        .await?
        .iter()
        .map(|o| text_of(&o.data))
        .collect();
    assert_eq!(texts, vec!["base", "left", "right"]);
    Ok(())
}
