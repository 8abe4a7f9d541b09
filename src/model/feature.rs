use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::FeatureRef;

/// User parameter prefix carrying the summed intensity of one mass trace
pub const MASSTRACE_INTENSITY_PREFIX: &str = "masstrace_intensity_";

/// Name of the user parameter holding the intensity of hull `index`
pub fn masstrace_intensity_key(index: usize) -> String {
    format!("{MASSTRACE_INTENSITY_PREFIX}{index}")
}

/// A point of an isotope trace hull, as written by the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HullPoint {
    /// Retention time in seconds
    pub rt_seconds: f64,
    /// m/z
    pub mz: f64,
}

/// One convex hull (isotope trace) of a detector feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HullRecord {
    /// Isotope index (`nr` attribute); `None` when the detector omitted it
    pub index: Option<usize>,
    /// Hull points in file order
    pub points: Vec<HullPoint>,
}

/// A feature exactly as reported by the external detector, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Detector-assigned id, unique within the file
    pub id: u64,
    /// Retention time in seconds
    pub rt_seconds: f64,
    /// Feature m/z
    pub mz: f64,
    /// Reported charge, 0 when unknown
    pub charge: i32,
    /// Isotope trace hulls in file order
    pub hulls: Vec<HullRecord>,
    /// Free-form user parameters (`userParam` name/value pairs)
    pub user_params: HashMap<String, String>,
}

impl FeatureRecord {
    /// Look up the summed intensity attribute of isotope `index`
    pub fn masstrace_intensity(&self, index: usize) -> Option<&str> {
        self.user_params
            .get(&masstrace_intensity_key(index))
            .map(String::as_str)
    }
}

/// All features produced by the detector for one exported file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMap {
    /// Display name of the map (carries the `[FileID_<n>]` token)
    pub name: String,
    /// Detected features
    pub features: Vec<FeatureRecord>,
}

/// One isotope peak of a validated raw feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotopePeak {
    /// Isotope index, 0 = monoisotopic
    pub isotope: usize,
    /// Summed intensity of the trace
    pub intensity: f64,
    /// Mean m/z over the hull points
    pub mass: f64,
    /// Earliest hull retention time (minutes)
    pub left_rt: f64,
    /// Latest hull retention time (minutes)
    pub right_rt: f64,
    /// Apex retention time (minutes), the owning feature's retention time
    pub apex_rt: f64,
}

/// A validated per-file detection, owned by its sample file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    /// Stable feature reference
    pub feature: FeatureRef,
    /// Feature mass (m/z of the monoisotopic trace as reported)
    pub mass: f64,
    /// Retention time in minutes
    pub retention_time: f64,
    /// Charge reported by the detector, 0 when unknown
    pub reported_charge: i32,
    /// Isotope peaks in hull order
    pub isotopes: Vec<IsotopePeak>,
}

impl RawFeature {
    /// Sum of isotope peak intensities
    pub fn area(&self) -> f64 {
        self.isotopes.iter().fold(0.0, |acc, p| acc + p.intensity)
    }
}
