use crate::cascade::CascadeError;
use crate::config::ConfigError;
use crate::identity::IdentityMappingError;
use crate::spectral_tree::SpectralTreeError;
use crate::table::TableError;
use crate::tools::ToolExecutionError;
use crate::xic::XicError;

/// Errors that abort a reconciliation run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The run has no input samples
    #[error("No sample files given")]
    NoSamples,

    /// Invalid parameters
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Map positions could not be bound to files
    #[error("Identity mapping failed: {0}")]
    Identity(#[from] IdentityMappingError),

    /// An external tool failed
    #[error(transparent)]
    Tool(#[from] ToolExecutionError),

    /// Charge resolution failed
    #[error("Charge resolution failed: {0}")]
    Cascade(#[from] CascadeError),

    /// A per-run table was written twice or an id sequence ran out
    #[error(transparent)]
    Table(#[from] TableError),

    /// Trace generation failed
    #[error("XIC generation failed: {0}")]
    Xic(#[from] XicError),

    /// Spectral tree assignment failed for a reason other than missing MS1
    #[error("Spectral tree assignment failed: {0}")]
    SpectralTree(#[from] SpectralTreeError),
}
