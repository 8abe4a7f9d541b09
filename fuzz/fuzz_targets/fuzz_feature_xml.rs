#![no_main]

use libfuzzer_sys::fuzz_target;
use mzreconcile::io::FeatureXmlReader;
use mzreconcile::ions::raw_feature;
use mzreconcile::model::{FeatureRef, FileId};

fuzz_target!(|data: &[u8]| {
    // Malformed detector output must surface as an error, never a panic
    let Ok(map) = FeatureXmlReader::new(data).read_map("fuzz") else {
        return;
    };
    for record in &map.features {
        let _ = raw_feature(FeatureRef::new(FileId(1), record.id), record);
    }
});
