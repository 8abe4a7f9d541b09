//! End-to-end reconciliation runs over in-memory tool results and spectra.

use std::collections::HashMap;

use mzreconcile::cascade::EvidenceTier;
use mzreconcile::config::ReconcileConfig;
use mzreconcile::model::{
    masstrace_intensity_key, AdductAnnotation, CompoundKey, ConsensusGroup, ConsensusId,
    ConsensusMap, DechargeOutcome, FeatureMap, FeatureRecord, FileId, GroupMember, HullPoint,
    HullRecord, MapDescriptor, MapIndex, Polarity, Precursor, SampleFile, ScanEvent,
    SpectrumHeader, SpectrumId, UNKNOWN_ADDUCT,
};
use mzreconcile::output::ResultWriter;
use mzreconcile::pipeline::{Pipeline, PipelineError, PipelineInput, PipelineOutput, RunSummary};
use mzreconcile::spectra::InMemorySpectra;
use mzreconcile::tools::{
    DechargeSettings, Decharger, DetectionSettings, FeatureDetector, FeatureLinker,
    LinkingSettings, RecordedDecharger, ToolExecutionError,
};
use mzreconcile::xic::MassWindow;

/// Detector returning prepared maps
struct MapDetector(HashMap<FileId, FeatureMap>);

impl FeatureDetector for MapDetector {
    fn detect(
        &mut self,
        sample: &SampleFile,
        _settings: &DetectionSettings,
    ) -> Result<FeatureMap, ToolExecutionError> {
        self.0
            .get(&sample.id)
            .cloned()
            .ok_or_else(|| ToolExecutionError::MissingResult {
                tool: "test detector",
                input: sample.id.to_string(),
            })
    }
}

/// Linker returning fixed groups over the maps it is given
struct GroupLinker(Vec<ConsensusGroup>);

impl FeatureLinker for GroupLinker {
    fn link(
        &mut self,
        maps: &[FeatureMap],
        _settings: &LinkingSettings,
    ) -> Result<ConsensusMap, ToolExecutionError> {
        Ok(ConsensusMap {
            maps: maps
                .iter()
                .enumerate()
                .map(|(i, m)| MapDescriptor {
                    index: MapIndex(i),
                    name: m.name.clone(),
                })
                .collect(),
            groups: self.0.clone(),
        })
    }
}

/// Pass-through decharger remembering how many groups it was offered
#[derive(Default)]
struct CountingDecharger {
    offered: Vec<usize>,
}

impl Decharger for CountingDecharger {
    fn decharge(
        &mut self,
        consensus: &ConsensusMap,
        _max_charge: u32,
        _settings: &DechargeSettings,
    ) -> Result<DechargeOutcome, ToolExecutionError> {
        self.offered.push(consensus.groups.len());
        Ok(DechargeOutcome {
            consensus: consensus.clone(),
            pairs: Vec::new(),
        })
    }
}

/// Feature with one isotope hull spanning `[left_s, right_s]` at `mz`
fn feature(id: u64, mz: f64, apex_s: f64, left_s: f64, right_s: f64, charge: i32) -> FeatureRecord {
    FeatureRecord {
        id,
        rt_seconds: apex_s,
        mz,
        charge,
        hulls: vec![HullRecord {
            index: Some(0),
            points: vec![
                HullPoint {
                    rt_seconds: left_s,
                    mz,
                },
                HullPoint {
                    rt_seconds: right_s,
                    mz,
                },
            ],
        }],
        user_params: HashMap::from([(masstrace_intensity_key(0), "1000".to_string())]),
    }
}

fn feature_map(features: Vec<FeatureRecord>) -> FeatureMap {
    FeatureMap {
        name: String::new(),
        features,
    }
}

fn sample(id: i32) -> SampleFile {
    SampleFile::new(FileId(id), format!("sample_{id}.mzML"), Polarity::Positive)
}

fn header(file: i32, rt: f64, ms_level: u8, precursor: Option<f64>) -> SpectrumHeader {
    SpectrumHeader {
        id: SpectrumId(0),
        file: FileId(file),
        retention_time: rt,
        scan_event: ScanEvent {
            ms_level,
            ..Default::default()
        },
        precursor: precursor.map(|mz| Precursor { mz, charge: None }),
    }
}

fn run(
    config: ReconcileConfig,
    samples: Vec<SampleFile>,
    detector: &mut MapDetector,
    linker: &mut GroupLinker,
    decharger: &mut dyn Decharger,
    spectra: &InMemorySpectra,
) -> Result<PipelineOutput, PipelineError> {
    Pipeline::new(config)?.run(PipelineInput {
        samples,
        detector,
        linker,
        decharger,
        spectra,
    })
}

#[test]
fn scenario_a_consensus_charge_upgrades_unreported_feature() {
    let mut detector = MapDetector(HashMap::from([
        (FileId(1), feature_map(vec![feature(1, 200.0, 300.0, 290.0, 310.0, 0)])),
        (FileId(2), feature_map(vec![feature(1, 200.0, 302.0, 292.0, 312.0, 1)])),
    ]));
    let mut linker = GroupLinker(vec![ConsensusGroup {
        id: ConsensusId(0),
        centroid_mz: 200.0,
        centroid_rt: 5.0,
        charge: Some(1),
        members: vec![
            GroupMember {
                map: MapIndex(0),
                feature_id: 1,
            },
            GroupMember {
                map: MapIndex(1),
                feature_id: 1,
            },
        ],
        annotation: None,
    }]);
    let mut decharger = CountingDecharger::default();

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1), sample(2)],
        &mut detector,
        &mut linker,
        &mut decharger,
        &InMemorySpectra::new(),
    )
    .unwrap();

    assert_eq!(output.ions.ions.len(), 2);
    for ion in &output.ions.ions {
        assert_eq!(ion.charge, 1);
        assert_eq!(ion.adduct, UNKNOWN_ADDUCT);
        assert_eq!(ion.consensus, ConsensusId(0));
    }
    assert!(output.compounds.is_empty());
    assert_eq!(output.summary.decharged_groups, 0);
    assert_eq!(
        output.summary.resolution_tiers.get(&EvidenceTier::Consensus),
        Some(&2)
    );
}

#[test]
fn groups_below_linked_threshold_are_never_decharged() {
    // three files, the group links two of them: below min(3, 3)
    let mut detector = MapDetector(HashMap::from([
        (FileId(1), feature_map(vec![feature(1, 200.0, 300.0, 290.0, 310.0, 0)])),
        (FileId(2), feature_map(vec![feature(1, 200.0, 302.0, 292.0, 312.0, 1)])),
        (FileId(3), feature_map(Vec::new())),
    ]));
    let mut linker = GroupLinker(vec![ConsensusGroup {
        id: ConsensusId(0),
        centroid_mz: 200.0,
        centroid_rt: 5.0,
        charge: Some(1),
        members: vec![
            GroupMember {
                map: MapIndex(0),
                feature_id: 1,
            },
            GroupMember {
                map: MapIndex(1),
                feature_id: 1,
            },
        ],
        annotation: None,
    }]);
    let mut decharger = CountingDecharger::default();

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1), sample(2), sample(3)],
        &mut detector,
        &mut linker,
        &mut decharger,
        &InMemorySpectra::new(),
    )
    .unwrap();

    assert!(decharger.offered.is_empty());
    assert_eq!(output.summary.decharge_iterations, 0);
    assert!(output.ions.ions.iter().all(|ion| ion.charge == 1));
}

/// Annotates every offered group and also returns an extra group it was never given
struct OverAnnotatingDecharger {
    extra: ConsensusGroup,
}

impl Decharger for OverAnnotatingDecharger {
    fn decharge(
        &mut self,
        consensus: &ConsensusMap,
        _max_charge: u32,
        _settings: &DechargeSettings,
    ) -> Result<DechargeOutcome, ToolExecutionError> {
        let annotation = |adduct: &str| AdductAnnotation {
            charge: 1,
            adduct: adduct.to_string(),
            compound: CompoundKey(1),
        };
        let mut out = consensus.clone();
        for group in &mut out.groups {
            group.annotation = Some(annotation("H+"));
        }
        let mut extra = self.extra.clone();
        extra.annotation = Some(annotation("Na+"));
        out.groups.push(extra);
        Ok(DechargeOutcome {
            consensus: out,
            pairs: Vec::new(),
        })
    }
}

#[test]
fn decharger_output_for_non_candidate_groups_is_ignored() {
    let member = |map: usize, feature_id: u64| GroupMember {
        map: MapIndex(map),
        feature_id,
    };
    let linked = |id: u64, members: Vec<GroupMember>| ConsensusGroup {
        id: ConsensusId(id),
        centroid_mz: 200.0,
        centroid_rt: 5.0,
        charge: Some(1),
        members,
        annotation: None,
    };
    let below = linked(0, vec![member(0, 1), member(1, 1)]);
    let full = linked(1, vec![member(0, 2), member(1, 2), member(2, 2)]);

    let mut detector = MapDetector(HashMap::from([
        (
            FileId(1),
            feature_map(vec![
                feature(1, 200.0, 300.0, 290.0, 310.0, 1),
                feature(2, 250.0, 400.0, 390.0, 410.0, 1),
            ]),
        ),
        (
            FileId(2),
            feature_map(vec![
                feature(1, 200.0, 302.0, 292.0, 312.0, 1),
                feature(2, 250.0, 402.0, 392.0, 412.0, 1),
            ]),
        ),
        (FileId(3), feature_map(vec![feature(2, 250.0, 401.0, 391.0, 411.0, 1)])),
    ]));
    let mut linker = GroupLinker(vec![below.clone(), full]);
    let mut decharger = OverAnnotatingDecharger { extra: below };

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1), sample(2), sample(3)],
        &mut detector,
        &mut linker,
        &mut decharger,
        &InMemorySpectra::new(),
    )
    .unwrap();

    assert_eq!(output.summary.decharged_groups, 1);
    for ion in &output.ions.ions {
        if ion.consensus == ConsensusId(0) {
            assert_eq!(ion.adduct, UNKNOWN_ADDUCT);
        } else {
            assert_eq!(ion.adduct, "H+");
        }
    }
    assert_eq!(output.compounds.len(), 1);
    assert_eq!(output.compounds[0].groups, vec![ConsensusId(1)]);
    assert_eq!(output.compounds[0].ions.len(), 3);
}

#[test]
fn scenario_b_single_file_is_decharged_into_compound() {
    let mut detector = MapDetector(HashMap::from([(
        FileId(1),
        feature_map(vec![feature(7, 181.0707, 300.0, 290.0, 310.0, 0)]),
    )]));
    let mut linker = GroupLinker(Vec::new());

    let annotated = ConsensusMap {
        maps: vec![MapDescriptor {
            index: MapIndex(0),
            name: "decharged".to_string(),
        }],
        groups: vec![ConsensusGroup {
            id: ConsensusId(7),
            centroid_mz: 181.0707,
            centroid_rt: 5.0,
            charge: Some(1),
            members: vec![GroupMember {
                map: MapIndex(0),
                feature_id: 7,
            }],
            annotation: Some(AdductAnnotation {
                charge: 1,
                adduct: "H+".to_string(),
                compound: CompoundKey(1),
            }),
        }],
    };
    let mut decharger = RecordedDecharger::new().with_outcome(
        1,
        DechargeOutcome {
            consensus: annotated,
            pairs: Vec::new(),
        },
    );

    let config = ReconcileConfig {
        min_linked_samples: 3,
        mass_max_diff: 0.001,
        ..Default::default()
    };
    let output = run(
        config,
        vec![sample(1)],
        &mut detector,
        &mut linker,
        &mut decharger,
        &InMemorySpectra::new(),
    )
    .unwrap();

    assert_eq!(output.summary.decharge_iterations, 3);
    assert_eq!(output.summary.decharged_groups, 1);

    let ion = &output.ions.ions[0];
    assert_eq!(ion.charge, 1);
    assert_eq!(ion.adduct, "H+");

    assert_eq!(output.compounds.len(), 1);
    assert_eq!(output.compounds[0].ions, vec![ion.id]);
    assert_eq!(output.compounds[0].groups, vec![ConsensusId(7)]);
}

#[test]
fn scenario_c_scan_without_signal_gives_zero_point() {
    let window = MassWindow::around(100.0, 5.0);
    assert!((window.low - 99.9995).abs() < 1e-9);
    assert!((window.high - 100.0005).abs() < 1e-9);

    let mut detector = MapDetector(HashMap::from([(
        FileId(1),
        feature_map(vec![feature(1, 100.0, 60.0, 54.0, 72.0, 1)]),
    )]));
    let mut spectra = InMemorySpectra::new();
    spectra
        .push(header(1, 1.0, 1, None), vec![100.0002], vec![50.0])
        .unwrap();
    spectra
        .push(header(1, 1.1, 1, None), vec![99.99, 100.001], vec![70.0, 80.0])
        .unwrap();
    spectra
        .push(header(1, 1.05, 2, Some(100.0)), vec![50.0], vec![10.0])
        .unwrap();

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &spectra,
    )
    .unwrap();

    assert_eq!(output.rasters.len(), 1);
    let raster = &output.rasters[0];
    assert_eq!(raster.times, vec![1.0, 1.1]);

    // one isotope trace plus the summed ion trace
    assert_eq!(output.traces.len(), 2);
    for trace in &output.traces {
        assert_eq!(trace.points.len(), raster.len());
        assert_eq!(trace.points[0].intensity, 50.0);
        assert_eq!(trace.points[1].time, 1.1);
        assert_eq!(trace.points[1].intensity, 0.0);
        assert!(trace.points[1].intensity.is_sign_positive());
    }
}

#[test]
fn scenario_d_ms2_outside_peak_span_is_excluded() {
    // apex 5.00 min, span [4.80, 5.20]
    let mut detector = MapDetector(HashMap::from([(
        FileId(1),
        feature_map(vec![feature(1, 300.0, 300.0, 288.0, 312.0, 1)]),
    )]));
    let mut spectra = InMemorySpectra::new();
    spectra.push(header(1, 4.9, 1, None), vec![300.0], vec![10.0]).unwrap();
    let survey = spectra.push(header(1, 5.0, 1, None), vec![300.0], vec![20.0]).unwrap();
    let inside = spectra
        .push(header(1, 5.05, 2, Some(300.0005)), vec![150.0], vec![5.0])
        .unwrap();
    spectra
        .push(header(1, 5.25, 2, Some(300.0)), vec![150.0], vec![5.0])
        .unwrap();

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &spectra,
    )
    .unwrap();

    assert_eq!(output.spectral_trees.len(), 1);
    let tree = &output.spectral_trees[0].tree;
    assert_eq!(tree.ms1, Some(survey));
    assert_eq!(tree.ms2, vec![inside]);

    let assigned: Vec<SpectrumId> = output.assigned_spectra.iter().map(|s| s.header.id).collect();
    assert_eq!(assigned, vec![survey, inside]);
}

#[test]
fn scenario_e_file_without_features_produces_empty_outputs() {
    let mut detector = MapDetector(HashMap::from([(FileId(1), feature_map(Vec::new()))]));
    let mut spectra = InMemorySpectra::new();
    spectra.push(header(1, 1.0, 1, None), vec![100.0], vec![1.0]).unwrap();

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &spectra,
    )
    .unwrap();

    assert!(output.ions.is_empty());
    assert!(output.compounds.is_empty());
    assert!(output.traces.is_empty());
    assert!(output.rasters.is_empty());
    assert!(output.spectral_trees.is_empty());
}

#[test]
fn missing_ms1_is_recorded_not_fatal() {
    let mut detector = MapDetector(HashMap::from([(
        FileId(1),
        feature_map(vec![feature(1, 300.0, 300.0, 288.0, 312.0, 1)]),
    )]));
    let mut spectra = InMemorySpectra::new();
    spectra
        .push(header(1, 5.0, 2, Some(300.0)), vec![150.0], vec![5.0])
        .unwrap();

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &spectra,
    )
    .unwrap();

    assert_eq!(output.ions.ions.len(), 1);
    assert!(output.traces.is_empty());
    assert!(output.spectral_trees.is_empty());
    assert_eq!(output.summary.missing_ms1, vec![FileId(1)]);
}

#[test]
fn detector_failure_aborts_the_run() {
    let mut detector = MapDetector(HashMap::new());
    let err = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &InMemorySpectra::new(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Tool(_)));
}

#[test]
fn empty_sample_list_is_rejected() {
    let err = run(
        ReconcileConfig::default(),
        Vec::new(),
        &mut MapDetector(HashMap::new()),
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &InMemorySpectra::new(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::NoSamples));
}

#[test]
fn malformed_features_are_listed_in_the_summary() {
    let mut broken = feature(2, 150.0, 300.0, 290.0, 310.0, 1);
    broken.user_params.clear();
    let mut detector = MapDetector(HashMap::from([(
        FileId(1),
        feature_map(vec![feature(1, 100.0, 300.0, 290.0, 310.0, 1), broken]),
    )]));

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &InMemorySpectra::new(),
    )
    .unwrap();

    assert_eq!(output.ions.ions.len(), 1);
    assert_eq!(output.summary.rejected_features.len(), 1);
    assert_eq!(output.summary.rejected_features[0].feature, 2);
}

#[test]
fn repeated_feature_id_is_dropped_without_aborting_the_run() {
    let mut detector = MapDetector(HashMap::from([(
        FileId(1),
        feature_map(vec![
            feature(1, 100.0, 300.0, 290.0, 310.0, 1),
            feature(2, 150.0, 300.0, 290.0, 310.0, 1),
            feature(1, 175.0, 320.0, 310.0, 330.0, 1),
        ]),
    )]));

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &InMemorySpectra::new(),
    )
    .unwrap();

    assert_eq!(output.ions.ions.len(), 2);
    assert_eq!(output.summary.rejected_features.len(), 1);
    assert_eq!(output.summary.rejected_features[0].feature, 1);
    assert!(output.ions.ions.iter().any(|ion| (ion.mass - 100.0).abs() < 1e-9));
}

#[test]
fn result_bundle_is_written() {
    let mut detector = MapDetector(HashMap::from([(
        FileId(1),
        feature_map(vec![feature(1, 100.0, 60.0, 54.0, 72.0, 1)]),
    )]));
    let mut spectra = InMemorySpectra::new();
    spectra.push(header(1, 1.0, 1, None), vec![100.0], vec![50.0]).unwrap();

    let output = run(
        ReconcileConfig::default(),
        vec![sample(1)],
        &mut detector,
        &mut GroupLinker(Vec::new()),
        &mut RecordedDecharger::new(),
        &spectra,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let bundle = ResultWriter::new(dir.path().join("out")).write(&output).unwrap();
    assert_eq!(bundle.traces.traces_written, 2);
    for file in &bundle.files {
        assert!(file.exists(), "{} missing", file.display());
    }

    let summary: RunSummary = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("out").join("run_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary.run_id, output.summary.run_id);
    assert_eq!(summary.traces, 2);
}
