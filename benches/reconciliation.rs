use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mzreconcile::cascade::{ChargeResolutionCascade, DechargeResult, FeatureGroups};
use mzreconcile::identity::IdentityMapper;
use mzreconcile::ions::{FeatureIonBuilder, IonSet};
use mzreconcile::model::{
    masstrace_intensity_key, ConsensusMap, FeatureMap, FeatureRecord, FileId, HullPoint,
    HullRecord, Polarity, RawFeature, SampleFile, ScanEvent, SpectrumHeader, SpectrumId,
};
use mzreconcile::spectra::InMemorySpectra;
use mzreconcile::xic::XicTraceGenerator;

/// Detector map with `n` two-isotope features spread over 30 minutes
fn feature_map(n: usize) -> FeatureMap {
    let features = (0..n)
        .map(|i| {
            let mz = 150.0 + i as f64 * 0.37;
            let rt = 30.0 + (i % 1700) as f64;
            FeatureRecord {
                id: i as u64,
                rt_seconds: rt,
                mz,
                charge: (i % 3) as i32,
                hulls: (0..2)
                    .map(|iso| HullRecord {
                        index: Some(iso),
                        points: vec![
                            HullPoint {
                                rt_seconds: rt - 6.0,
                                mz: mz + iso as f64 * 1.00336,
                            },
                            HullPoint {
                                rt_seconds: rt + 6.0,
                                mz: mz + iso as f64 * 1.00336,
                            },
                        ],
                    })
                    .collect(),
                user_params: HashMap::from([
                    (masstrace_intensity_key(0), "10000".to_string()),
                    (masstrace_intensity_key(1), "2500".to_string()),
                ]),
            }
        })
        .collect();
    FeatureMap {
        name: "bench".to_string(),
        features,
    }
}

fn prepare(n: usize) -> (Vec<RawFeature>, FeatureGroups) {
    let map = feature_map(n);
    let consensus = ConsensusMap::from_single_feature_map(&map);
    let samples = [SampleFile::new(FileId(1), "bench.mzML", Polarity::Positive)];
    let identity = IdentityMapper::new().build(&consensus.maps, &samples).unwrap();
    let features = FeatureIonBuilder::new().import(FileId(1), &map).features;
    let groups = FeatureGroups::build(&consensus, &identity, &features).unwrap();
    (features, groups)
}

fn ion_set(n: usize) -> IonSet {
    let (features, groups) = prepare(n);
    let resolved = ChargeResolutionCascade::new()
        .resolve(&features, &groups, &DechargeResult::empty())
        .unwrap();
    FeatureIonBuilder::new().build(&features, &groups, &resolved).unwrap()
}

/// MS1 scans every 0.5 s with `peaks` sorted centroids each
fn spectra(scans: usize, peaks: usize) -> InMemorySpectra {
    let mut store = InMemorySpectra::new();
    for i in 0..scans {
        let header = SpectrumHeader {
            id: SpectrumId(0),
            file: FileId(1),
            retention_time: i as f64 / 120.0,
            scan_event: ScanEvent {
                ms_level: 1,
                ..Default::default()
            },
            precursor: None,
        };
        let mz: Vec<f64> = (0..peaks).map(|j| 150.0 + j as f64 * 1.7).collect();
        let intensity = vec![1000.0f32; peaks];
        store.push(header, mz, intensity).unwrap();
    }
    store
}

fn bench_charge_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("charge_resolution");

    for n in [1_000, 10_000, 50_000] {
        let (features, groups) = prepare(n);
        let decharged = DechargeResult::empty();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let cascade = ChargeResolutionCascade::new();
            b.iter(|| {
                let resolved = cascade
                    .resolve(black_box(&features), &groups, &decharged)
                    .unwrap();
                black_box(resolved);
            });
        });
    }

    group.finish();
}

fn bench_xic_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("xic_generation");
    group.sample_size(20);

    for (ions, scans) in [(100, 1_000), (1_000, 1_000), (1_000, 4_000)] {
        let set = ion_set(ions);
        let store = spectra(scans, 500);
        group.throughput(Throughput::Elements((ions * scans) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}ions_{}scans", ions, scans)),
            &scans,
            |b, _| {
                b.iter(|| {
                    let traces = XicTraceGenerator::new(5.0, 1000)
                        .generate(&store, FileId(1), black_box(&set))
                        .unwrap();
                    black_box(traces);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_charge_resolution, bench_xic_generation);
criterion_main!(benches);
