//! K-way iteration over many channels.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::TryStreamExt;
use tokio::runtime::Runtime;

use chanlog::core::Query;
use chanlog_testkit::{random_payloads, ChannelFixture};

const ENTRIES_PER_CHANNEL: usize = 200;

fn populated(rt: &Runtime, channels: usize) -> ChannelFixture {
    rt.block_on(async {
        let fixture = ChannelFixture::new();
        let payloads = random_payloads(channels * ENTRIES_PER_CHANNEL, 64);
        for (i, payload) in payloads.iter().enumerate() {
            let channel = format!("bench-{}", i % channels);
            fixture
                .manager
                .post_to_channel_at(&channel, payload, None, i as i64)
                .await
                .expect("populate channel");
        }
        fixture
    })
}

fn bench_newest(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("newest_100");

    for channels in [1, 8, 32] {
        let fixture = populated(&rt, channels);
        group.bench_with_input(BenchmarkId::from_parameter(channels), &channels, |b, _| {
            b.iter(|| {
                rt.block_on(fixture.manager.get_objects(Query::new().count(100)))
                    .expect("query")
            })
        });
    }
    group.finish();
}

fn bench_full_scan(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("full_scan");
    group.sample_size(20);

    for channels in [1, 8] {
        let fixture = populated(&rt, channels);
        for (name, query) in [
            ("descending", Query::new()),
            ("ascending", Query::new().ascending()),
        ] {
            group.bench_with_input(BenchmarkId::new(name, channels), &query, |b, query| {
                b.iter(|| {
                    rt.block_on(async {
                        fixture
                            .manager
                            .object_iterator(query.clone())
                            .try_fold(0usize, |n, _| async move { Ok(n + 1) })
                            .await
                            .expect("scan")
                    })
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_newest, bench_full_scan);
criterion_main!(benches);
