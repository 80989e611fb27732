//! Normalize and rank a synthetic pair sweep.
//!
//! Run with: `cargo bench --bench leaderboard`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use topgear::data::{ItemSource, MetadataMap, RawResultRow, TrinketCandidate};
use topgear::topgear::{RankingSession, ReferenceMode};

/// Every pair of `items` ids in both orders plus a handful of legacy names.
fn sweep(items: u32) -> (Vec<RawResultRow>, Vec<TrinketCandidate>) {
    let ids: Vec<u32> = (0..items).map(|i| 200_000 + i * 7).collect();
    let mut rows = Vec::new();
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            let score = 80_000.0 + f64::from((a * 31 + b * 17) % 20_000);
            rows.push(RawResultRow::new(format!("T_{a}_VS_{b}"), score));
            rows.push(RawResultRow::new(format!("T_{b}_VS_{a}"), score - 50.0));
            rows.push(RawResultRow::new(
                format!("T_trinket1_Item_{a}__trinket2_Item_{b}"),
                score - 25.0,
            ));
        }
    }
    rows.push(RawResultRow::new("unparseable set", 1.0));

    let candidates = ids
        .iter()
        .enumerate()
        .map(|(index, &id)| {
            let slot = if index % 2 == 0 { "trinket1" } else { "trinket2" };
            TrinketCandidate {
                name: format!("{slot}_Item_{id}"),
                slot: slot.to_string(),
                item_id: Some(id),
                override_config: format!("{slot}=,id={id}"),
                source: if index < 2 {
                    ItemSource::Equipped
                } else {
                    ItemSource::Bags
                },
                unique_equipped: false,
            }
        })
        .collect();
    (rows, candidates)
}

fn bench_leaderboard(c: &mut Criterion) {
    let (rows, candidates) = sweep(40);
    let metadata = MetadataMap::new();

    let mut group = c.benchmark_group("leaderboard");
    group.sample_size(30);

    group.bench_function("prepare", |b| {
        b.iter(|| {
            black_box(RankingSession::prepare(
                &rows,
                Some(85_000.0),
                &candidates,
                &metadata,
            ))
        });
    });

    let session = RankingSession::prepare(&rows, Some(85_000.0), &candidates, &metadata);
    group.bench_function("rank_equipped", |b| {
        b.iter(|| black_box(session.rank(ReferenceMode::Equipped)));
    });
    group.bench_function("rank_top", |b| {
        b.iter(|| black_box(session.rank(ReferenceMode::Top)));
    });

    group.finish();
}

criterion_group!(benches, bench_leaderboard);
criterion_main!(benches);
