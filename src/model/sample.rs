use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::FileId;

/// Scan polarity of an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Positive ion mode
    #[default]
    Positive,
    /// Negative ion mode
    Negative,
}

impl Polarity {
    /// Charge used when an ion's resolved charge is 0 but a sign is required
    pub fn default_charge(self) -> i32 {
        match self {
            Polarity::Positive => 1,
            Polarity::Negative => -1,
        }
    }

    /// Resolve a stored charge for consumers that need a non-zero value.
    ///
    /// The stored charge is left untouched; only the returned value is defaulted.
    pub fn effective_charge(self, charge: i32) -> i32 {
        if charge == 0 {
            self.default_charge()
        } else {
            charge
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Positive => write!(f, "positive"),
            Polarity::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "pos" | "+" => Ok(Polarity::Positive),
            "negative" | "neg" | "-" => Ok(Polarity::Negative),
            other => Err(format!("unknown polarity '{other}'")),
        }
    }
}

/// One acquisition file taking part in a run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleFile {
    /// Stable file identifier
    pub id: FileId,
    /// Physical path of the acquisition
    pub path: PathBuf,
    /// Acquisition polarity
    pub polarity: Polarity,
    /// Control file this sample is compared against, if any
    #[serde(default)]
    pub reference: Option<FileId>,
    /// Whether this file is itself a control file
    #[serde(default)]
    pub is_reference: bool,
}

impl SampleFile {
    /// Create a sample file without control assignment
    pub fn new(id: FileId, path: impl Into<PathBuf>, polarity: Polarity) -> Self {
        Self {
            id,
            path: path.into(),
            polarity,
            reference: None,
            is_reference: false,
        }
    }

    /// File name without directory, for log messages
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
