//! Centralized error handling for cf_regrid
//!
//! Structural problems (bad engine selectors, mismatched grids or data shapes,
//! calls that a convention does not implement) are reported as errors. Lookups
//! that simply find nothing degrade to `None`/empty results instead and only log
//! a warning.

use std::fmt;

/// Main error type for cf_regrid operations
#[derive(Debug)]
pub enum CfRegridError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Invalid regrid or engine configuration
    Configuration { message: String },

    /// Engine selector that matches none of the known engines
    UnsupportedTool { tool: String },

    /// Source and destination grids have a different number of dimensions
    GridDimMismatch { src: usize, dst: usize },

    /// Data arrays whose shapes disagree with each other or with the grids
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// `apply` called before `compute_weights`
    WeightsNotComputed,

    /// `compute_weights` called twice on the same session
    WeightsAlreadyComputed,

    /// Classification method the selected convention does not provide
    NotImplemented { convention: String, method: String },

    /// Variable not found in a file or variable dictionary
    VariableNotFound { var: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error for everything else
    Generic(String),
}

impl CfRegridError {
    /// Shorthand for a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a shape mismatch
    pub fn shape_mismatch(context: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// True for the errors a caller can only fix by changing the regrid setup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::UnsupportedTool { .. }
                | Self::GridDimMismatch { .. }
                | Self::ShapeMismatch { .. }
        )
    }
}

impl fmt::Display for CfRegridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfRegridError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            CfRegridError::IoError(e) => write!(f, "I/O error: {}", e),
            CfRegridError::ArrayError(e) => write!(f, "Array error: {}", e),
            CfRegridError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            CfRegridError::UnsupportedTool { tool } => write!(
                f,
                "Unrecognized regrid tool '{}', valid choices are: 'libcf', 'esmf'",
                tool
            ),
            CfRegridError::GridDimMismatch { src, dst } => write!(
                f,
                "Mismatch in number of grid dimensions: len(srcGrid) = {} != len(dstGrid) = {}",
                src, dst
            ),
            CfRegridError::ShapeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "Shape mismatch in {}: expected {:?}, found {:?}",
                context, expected, found
            ),
            CfRegridError::WeightsNotComputed => {
                write!(f, "Weights must be computed before apply")
            }
            CfRegridError::WeightsAlreadyComputed => write!(
                f,
                "Weights were already computed for this session, create a new one to recompute"
            ),
            CfRegridError::NotImplemented { convention, method } => write!(
                f,
                "Method not yet implemented: {} for convention {}",
                method, convention
            ),
            CfRegridError::VariableNotFound { var } => write!(f, "Variable '{}' not found", var),
            CfRegridError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            CfRegridError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CfRegridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CfRegridError::NetCDFError(e) => Some(e),
            CfRegridError::IoError(e) => Some(e),
            CfRegridError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for CfRegridError {
    fn from(error: netcdf::Error) -> Self {
        CfRegridError::NetCDFError(error)
    }
}

impl From<std::io::Error> for CfRegridError {
    fn from(error: std::io::Error) -> Self {
        CfRegridError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for CfRegridError {
    fn from(error: ndarray::ShapeError) -> Self {
        CfRegridError::ArrayError(error)
    }
}

impl From<String> for CfRegridError {
    fn from(error: String) -> Self {
        CfRegridError::Generic(error)
    }
}

impl From<&str> for CfRegridError {
    fn from(error: &str) -> Self {
        CfRegridError::Generic(error.to_string())
    }
}

/// Result type alias for cf_regrid operations
pub type Result<T> = std::result::Result<T, CfRegridError>;
