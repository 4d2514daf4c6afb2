//! Generic regridding
//!
//! # Organization
//!
//! - [`grid`]: grid descriptions and periodicity guessing
//! - [`engine`]: the engine capability set and its configuration types
//! - [`generic`]: the [`GenericRegrid`] session façade
//! - [`native`]: pure Rust engines for rectilinear grids

pub mod engine;
pub mod generic;
pub mod grid;
pub mod native;

pub use engine::{
    ApplyContext, CoordSystem, Diagnostics, EngineBackend, EsmfSetup, LibCfSetup, Options,
    RegridEngine, RegridMethod, RegridTool, StaggerLocation,
};
pub use generic::{GenericRegrid, SessionState, MASK_EPS};
pub use grid::{guess_periodicity, GridSpec};
pub use native::NativeBackend;
