use criterion::{black_box, criterion_group, criterion_main, Criterion};
use miniseed_index::aggregator::SectionAggregator;
use miniseed_index::record::Record;
use miniseed_index::tolerance::DefaultTolerances;

fn make_records(count: usize, sample_rate: f64, samples_per_record: u32) -> Vec<Record> {
    let mut records = Vec::with_capacity(count);
    let mut offset = 0u64;
    let mut start_ns = 0i64;
    let period_ns = (1_000_000_000.0 / sample_rate) as i64;
    for _ in 0..count {
        let length = 512u32;
        records.push(Record {
            offset,
            length,
            source_id: "XX_STA01__BHZ".to_string(),
            pub_version: 1,
            quality: b'D',
            format_version: 2,
            start_ns,
            sample_count: samples_per_record,
            sample_rate,
            raw: vec![0u8; length as usize],
        });
        offset += length as u64;
        start_ns += period_ns * samples_per_record as i64;
    }
    records
}

fn bench_aggregate_contiguous(c: &mut Criterion) {
    let tolerances = DefaultTolerances::new(None, 1e-4);
    let records = make_records(10_000, 100.0, 500);
    c.bench_function("aggregate_10k_contiguous_records", |b| {
        b.iter(|| {
            let mut aggregator = SectionAggregator::new(&tolerances, 3600 * 1_000_000_000, 0);
            for record in &records {
                aggregator.push(black_box(record)).unwrap();
            }
            black_box(aggregator.finish().unwrap())
        })
    });
}

criterion_group!(benches, bench_aggregate_contiguous);
criterion_main!(benches);
