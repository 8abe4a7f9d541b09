//! PSI-MS controlled vocabulary accessions read by the mzML loader.

pub const MS_LEVEL: &str = "MS:1000511";
pub const POSITIVE_SCAN: &str = "MS:1000130";
pub const NEGATIVE_SCAN: &str = "MS:1000129";
pub const SCAN_START_TIME: &str = "MS:1000016";
pub const FILTER_STRING: &str = "MS:1000512";
pub const SCAN_WINDOW_LOWER: &str = "MS:1000501";
pub const SCAN_WINDOW_UPPER: &str = "MS:1000500";

pub const SELECTED_ION_MZ: &str = "MS:1000744";
pub const CHARGE_STATE: &str = "MS:1000041";
pub const ISOLATION_LOWER_OFFSET: &str = "MS:1000828";
pub const ISOLATION_UPPER_OFFSET: &str = "MS:1000829";
pub const COLLISION_ENERGY: &str = "MS:1000045";

pub const FLOAT_32: &str = "MS:1000521";
pub const FLOAT_64: &str = "MS:1000523";
pub const ZLIB: &str = "MS:1000574";
pub const NO_COMPRESSION: &str = "MS:1000576";
pub const NUMPRESS: [&str; 3] = ["MS:1002312", "MS:1002313", "MS:1002314"];
pub const MZ_ARRAY: &str = "MS:1000514";
pub const INTENSITY_ARRAY: &str = "MS:1000515";

pub const UNIT_MINUTE: &str = "UO:0000031";
pub const UNIT_MILLISECOND: &str = "UO:0000028";

/// Activation method name for a dissociation accession
pub fn activation(accession: &str) -> Option<&'static str> {
    match accession {
        "MS:1000133" => Some("CID"),
        "MS:1000422" => Some("HCD"),
        "MS:1000598" => Some("ETD"),
        "MS:1000250" => Some("ECD"),
        _ => None,
    }
}

/// Mass analyzer name for an analyzer accession
pub fn mass_analyzer(accession: &str) -> Option<&'static str> {
    match accession {
        "MS:1000484" => Some("orbitrap"),
        "MS:1000081" => Some("quadrupole"),
        "MS:1000264" => Some("ion trap"),
        "MS:1000084" => Some("time-of-flight"),
        _ => None,
    }
}

/// Ionization source name for a source accession
pub fn ionization_source(accession: &str) -> Option<&'static str> {
    match accession {
        "MS:1000073" => Some("electrospray ionization"),
        "MS:1000398" => Some("nanoelectrospray"),
        "MS:1000070" => Some("atmospheric pressure chemical ionization"),
        _ => None,
    }
}

/// Scan start time in minutes; unit-less values are taken as seconds
pub fn retention_time_minutes(value: f64, unit_accession: Option<&str>) -> f64 {
    match unit_accession {
        Some(UNIT_MINUTE) => value,
        Some(UNIT_MILLISECOND) => value / 60_000.0,
        _ => value / 60.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_time_minutes() {
        assert_eq!(retention_time_minutes(2.5, Some(UNIT_MINUTE)), 2.5);
        assert_eq!(retention_time_minutes(90.0, Some("UO:0000010")), 1.5);
        assert_eq!(retention_time_minutes(120_000.0, Some(UNIT_MILLISECOND)), 2.0);
        assert_eq!(retention_time_minutes(30.0, None), 0.5);
    }
}
