#![no_main]

use libfuzzer_sys::fuzz_target;
use mzreconcile::model::{FileId, Polarity};
use mzreconcile::spectra::MzmlSpectrumReader;

fuzz_target!(|data: &[u8]| {
    let reader = MzmlSpectrumReader::new(data, FileId(1), Polarity::Positive);
    if let Ok(spectra) = reader.read_all() {
        for spectrum in &spectra {
            assert_eq!(spectrum.mz.len(), spectrum.intensity.len());
        }
    }
});
