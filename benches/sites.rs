use criterion::{Criterion, criterion_group, criterion_main};

use aria::channels::SubstitutionModel;
use aria::sites::SiteEstimator;
use aria::slicer::RegionSequence;

/// Deterministic CDS-like sequence of the requested length.
fn synthetic_cds(len: usize) -> Vec<u8> {
    const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
    (0..len).map(|i| BASES[(i * 7 + i / 3) % 4]).collect()
}

fn region(len: usize) -> RegionSequence {
    RegionSequence {
        transcript: "BENCH".to_string(),
        start: 0,
        end: len as u64,
        sequence: synthetic_cds(len),
    }
}

fn bench_estimate_region(c: &mut Criterion) {
    let estimator = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
    let cds = region(30_000);

    c.bench_function("estimate_region ssb192 (30 kb CDS)", |b| {
        b.iter(|| {
            let sites = estimator.estimate_region(&cds);
            assert!(sites.nonsyn_total() > 0.0);
        });
    });
}

fn bench_estimate_all_ssb7(c: &mut Criterion) {
    let estimator = SiteEstimator::new(SubstitutionModel::Ssb7).unwrap();
    let regions: Vec<RegionSequence> = (0..100)
        .map(|i| {
            let mut r = region(1_500);
            r.transcript = format!("T{i:03}");
            r
        })
        .collect();

    c.bench_function("estimate_all ssb7 (100 x 1.5 kb)", |b| {
        b.iter(|| {
            let per_transcript = estimator.estimate_all(&regions);
            assert_eq!(per_transcript.len(), 100);
        });
    });
}

criterion_group!(benches, bench_estimate_region, bench_estimate_all_ssb7);
criterion_main!(benches);
