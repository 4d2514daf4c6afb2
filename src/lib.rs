//! cf_regrid: CF metadata classification and generic regridding
//!
//! Two parts make up this crate. The convention classifier decides, for a
//! dataset described by NUG, COARDS or CF metadata, which variables are
//! coordinate axes, auxiliary coordinates, latitude or longitude axes and
//! bounds. The regrid façade computes interpolation weights once through a
//! pluggable engine and applies them to fields with any number of extra
//! dimensions, propagating missing values.
//!
//! ## Module Organization
//!
//! - [`conventions`]: NUG/COARDS/CF rules over variable metadata and dataset trees
//! - [`regrid`]: grids, the engine interface, the [`GenericRegrid`](regrid::GenericRegrid)
//!   session and the native engines
//! - [`netcdf_io`]: reading metadata and grids from NetCDF files, writing results
//! - [`metadata`]: convention reports for the command line tool
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use cf_regrid::prelude::*;
//! use ndarray::ArrayD;
//!
//! let src = GridSpec::rectilinear(&[-45.0, 0.0, 45.0], &[0.0, 90.0, 180.0, 270.0]);
//! let dst = GridSpec::rectilinear(&[-30.0, 30.0], &[45.0, 135.0, 225.0]);
//!
//! let mut session = GenericRegrid::<f64>::new(
//!     src, dst, RegridMethod::Linear, "esmf", &NativeBackend::new(), Options::new(),
//! ).unwrap();
//! session.compute_weights(&Options::new()).unwrap();
//!
//! let field = ArrayD::<f64>::ones(ndarray::IxDyn(&[3, 4]));
//! let mut out = ArrayD::<f64>::zeros(ndarray::IxDyn(&[2, 3]));
//! session.apply(field.view(), out.view_mut(), None, Some(1.0e20), &Options::new()).unwrap();
//! ```

pub mod conventions;
pub mod errors;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod regrid;

pub use errors::{CfRegridError, Result};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::conventions::{
        get_dataset_convention, AliasConfig, AxisLike, Convention, ConventionKind, DatasetNode,
        VariableDict, VariableMeta,
    };
    pub use crate::errors::{CfRegridError, Result};
    pub use crate::netcdf_io::NetCDFWriter;
    pub use crate::parallel::ParallelConfig;
    pub use crate::regrid::{
        EngineBackend, GenericRegrid, GridSpec, NativeBackend, Options, RegridEngine,
        RegridMethod,
    };
}
