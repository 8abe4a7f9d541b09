//! Decoding of mzML binary data arrays.
//!
//! Arrays are stored as base64 text, optionally zlib compressed, holding
//! little-endian 32 or 64 bit floats.

use std::io::{Cursor, Read};

use base64::prelude::*;
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;

use super::cv;

/// Errors raised while decoding one array
#[derive(Debug, thiserror::Error)]
pub enum BinaryDecodeError {
    /// Text is not valid base64
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// zlib stream is corrupt or truncated
    #[error("Decompression error: {0}")]
    DecompressionError(#[from] std::io::Error),

    /// Byte count is not a multiple of the value width
    #[error("{bytes} bytes do not hold whole {width}-byte values")]
    TrailingBytes {
        /// Decoded byte count
        bytes: usize,
        /// Value width in bytes
        width: usize,
    },

    /// The array uses a compression scheme that is not supported
    #[error("Unsupported array compression {0}")]
    UnsupportedCompression(String),
}

/// Value width of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// 32-bit float
    Float32,
    /// 64-bit float
    #[default]
    Float64,
}

/// Meaning of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayKind {
    /// m/z values
    Mz,
    /// Intensities
    Intensity,
    /// Any other array, skipped
    #[default]
    Other,
}

/// Encoding parameters of one `binaryDataArray`, collected from its cvParams
#[derive(Debug, Clone, Default)]
pub struct ArrayEncoding {
    /// Value width
    pub precision: Precision,
    /// Whether the bytes are zlib compressed
    pub zlib: bool,
    /// Array meaning
    pub kind: ArrayKind,
    /// Unsupported compression accession, if seen
    pub unsupported: Option<String>,
}

impl ArrayEncoding {
    /// Apply one cvParam accession
    pub fn apply(&mut self, accession: &str) {
        match accession {
            cv::FLOAT_32 => self.precision = Precision::Float32,
            cv::FLOAT_64 => self.precision = Precision::Float64,
            cv::ZLIB => self.zlib = true,
            cv::NO_COMPRESSION => self.zlib = false,
            cv::MZ_ARRAY => self.kind = ArrayKind::Mz,
            cv::INTENSITY_ARRAY => self.kind = ArrayKind::Intensity,
            a if cv::NUMPRESS.contains(&a) => self.unsupported = Some(a.to_string()),
            _ => {}
        }
    }

    /// Decode base64 `text` into values
    pub fn decode(&self, text: &str) -> Result<Vec<f64>, BinaryDecodeError> {
        if let Some(accession) = &self.unsupported {
            return Err(BinaryDecodeError::UnsupportedCompression(accession.clone()));
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut bytes = BASE64_STANDARD.decode(text)?;
        if self.zlib {
            let mut inflated = Vec::with_capacity(bytes.len() * 4);
            ZlibDecoder::new(&bytes[..]).read_to_end(&mut inflated)?;
            bytes = inflated;
        }

        let width = match self.precision {
            Precision::Float32 => 4,
            Precision::Float64 => 8,
        };
        if bytes.len() % width != 0 {
            return Err(BinaryDecodeError::TrailingBytes {
                bytes: bytes.len(),
                width,
            });
        }

        let count = bytes.len() / width;
        let mut values = Vec::with_capacity(count);
        let mut cursor = Cursor::new(bytes);
        for _ in 0..count {
            values.push(match self.precision {
                Precision::Float32 => cursor.read_f32::<LittleEndian>()? as f64,
                Precision::Float64 => cursor.read_f64::<LittleEndian>()?,
            });
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoding(accessions: &[&str]) -> ArrayEncoding {
        let mut encoding = ArrayEncoding::default();
        for a in accessions {
            encoding.apply(a);
        }
        encoding
    }

    #[test]
    fn test_decode_float32() {
        let bytes: Vec<u8> = [100.0f32, 200.5]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let values = encoding(&[cv::FLOAT_32, cv::INTENSITY_ARRAY])
            .decode(&BASE64_STANDARD.encode(bytes))
            .unwrap();
        assert_eq!(values, vec![100.0, 200.5]);
    }

    #[test]
    fn test_decode_zlib_float64() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let bytes: Vec<u8> = [150.25f64, 300.5]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let text = BASE64_STANDARD.encode(encoder.finish().unwrap());

        let enc = encoding(&[cv::FLOAT_64, cv::ZLIB, cv::MZ_ARRAY]);
        assert_eq!(enc.kind, ArrayKind::Mz);
        assert_eq!(enc.decode(&text).unwrap(), vec![150.25, 300.5]);
    }

    #[test]
    fn test_rejects_numpress_and_trailing_bytes() {
        assert!(matches!(
            encoding(&["MS:1002312"]).decode("AAAA"),
            Err(BinaryDecodeError::UnsupportedCompression(_))
        ));
        let text = BASE64_STANDARD.encode([0u8; 5]);
        assert!(matches!(
            encoding(&[cv::FLOAT_32]).decode(&text),
            Err(BinaryDecodeError::TrailingBytes { bytes: 5, width: 4 })
        ));
        assert!(encoding(&[]).decode("  ").unwrap().is_empty());
    }
}
