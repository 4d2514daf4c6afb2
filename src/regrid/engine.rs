//! Interpolation engine interface
//!
//! The façade never interpolates by itself. It talks to an engine through
//! [`RegridEngine`] and obtains engines from an [`EngineBackend`], which knows
//! how to build the two supported engine families.

use super::grid::GridSpec;
use crate::errors::{CfRegridError, Result};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;

/// Engine keyword options, passed through untouched unless consumed by name
pub type Options = HashMap<String, JsonValue>;

/// Engine-specific diagnostic fields, filled for the keys present
pub type Diagnostics = HashMap<String, ArrayD<f64>>;

/// Engine family selected by the regrid tool string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegridTool {
    /// Nodal interpolation engine ("libcf", "gsRegrid")
    LibCf,
    /// Structured-grid engine ("esmf", "esmp", ...)
    Esmf,
}

impl RegridTool {
    /// Select an engine by case-insensitive substring match
    ///
    /// # Errors
    ///
    /// Returns [`CfRegridError::UnsupportedTool`] when the selector names neither
    /// engine.
    pub fn from_selector(selector: &str) -> Result<Self> {
        let lower = selector.to_lowercase();
        if lower.contains("libcf") || lower.contains("gsreg") {
            Ok(Self::LibCf)
        } else if lower.contains("esm") {
            Ok(Self::Esmf)
        } else {
            Err(CfRegridError::UnsupportedTool {
                tool: selector.to_string(),
            })
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LibCf => "libcf",
            Self::Esmf => "esmf",
        }
    }
}

/// Interpolation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegridMethod {
    /// Bi/tri-linear nodal interpolation
    Linear,
    /// First-order conservative (area weighted) remapping
    Conservative,
    /// Patch recovery
    Patch,
}

impl RegridMethod {
    pub fn is_conservative(self) -> bool {
        self == Self::Conservative
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Conservative => "conservative",
            Self::Patch => "patch",
        }
    }
}

impl FromStr for RegridMethod {
    type Err = CfRegridError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        if lower.contains("conserv") {
            Ok(Self::Conservative)
        } else if lower.contains("linear") {
            Ok(Self::Linear)
        } else if lower.contains("patch") {
            Ok(Self::Patch)
        } else {
            Err(CfRegridError::configuration(format!(
                "unknown regrid method '{s}', valid choices are: 'linear', 'conservative', 'patch'"
            )))
        }
    }
}

/// Where field values sit within a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaggerLocation {
    #[default]
    Center,
    Corner,
}

impl FromStr for StaggerLocation {
    type Err = CfRegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "center" | "centre" => Ok(Self::Center),
            "corner" => Ok(Self::Corner),
            _ => Err(CfRegridError::configuration(format!(
                "unknown stagger location '{s}'"
            ))),
        }
    }
}

/// Coordinate system of the grid coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordSystem {
    /// Spherical, degrees
    #[default]
    Degrees,
    /// Spherical, radians
    Radians,
    /// Planar cartesian
    Cartesian,
}

impl CoordSystem {
    /// Longitude period, `None` for planar coordinates
    pub fn period(self) -> Option<f64> {
        match self {
            Self::Degrees => Some(360.0),
            Self::Radians => Some(std::f64::consts::TAU),
            Self::Cartesian => None,
        }
    }

    /// Convert a coordinate value to radians
    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            Self::Degrees => value.to_radians(),
            Self::Radians | Self::Cartesian => value,
        }
    }
}

impl FromStr for CoordSystem {
    type Err = CfRegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "deg" | "degree" | "degrees" | "sph_deg" => Ok(Self::Degrees),
            "rad" | "radian" | "radians" | "sph_rad" => Ok(Self::Radians),
            "cart" | "cartesian" => Ok(Self::Cartesian),
            _ => Err(CfRegridError::configuration(format!(
                "unknown coordinate system '{s}'"
            ))),
        }
    }
}

/// Everything the nodal ("libcf") engine is built from
#[derive(Debug, Clone)]
pub struct LibCfSetup {
    pub src: GridSpec,
    pub dst: GridSpec,
    /// Add a periodic column in longitude
    pub mk_cyclic: bool,
    /// Handle the cut of tripolar grids
    pub handle_cut: bool,
    /// Remaining keyword options
    pub options: Options,
}

/// Everything the structured ("esmf") engine is built from
#[derive(Debug, Clone)]
pub struct EsmfSetup {
    pub src: GridSpec,
    pub dst: GridSpec,
    pub method: RegridMethod,
    pub stagger: StaggerLocation,
    pub periodic: bool,
    pub coord_sys: CoordSystem,
    /// Remaining keyword options
    pub options: Options,
}

/// Per-call arguments threaded through to the engine
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    /// Rank that gathers distributed results, if any
    pub root_pe: Option<usize>,
    /// Data arrays are indexed globally rather than per process
    pub global_indexing: bool,
    pub options: &'a Options,
}

/// Capability set of an interpolation engine
pub trait RegridEngine<T> {
    /// Compute the interpolation weights
    fn compute_weights(&mut self, options: &Options) -> Result<()>;

    /// Interpolate one horizontal field from `src` into `dst`
    ///
    /// Destination nodes the engine cannot reach are left untouched.
    fn apply(
        &mut self,
        src: ArrayViewD<'_, T>,
        dst: ArrayViewMutD<'_, T>,
        ctx: &ApplyContext<'_>,
    ) -> Result<()>;

    /// Destination grid as seen by this process
    fn get_dst_grid(&self) -> Vec<ArrayD<f64>>;

    /// Fill the diagnostic fields whose keys are present in `diag`
    fn fill_in_diagnostic_data(&self, diag: &mut Diagnostics, root_pe: Option<usize>)
        -> Result<()>;
}

/// Factory for the two engine families
pub trait EngineBackend<T> {
    fn libcf(&self, setup: LibCfSetup) -> Result<Box<dyn RegridEngine<T>>>;

    fn esmf(&self, setup: EsmfSetup) -> Result<Box<dyn RegridEngine<T>>>;
}

/// Remove a boolean-like option (`true`/`false` or `0`/`1`)
///
/// # Errors
///
/// Returns a configuration error when the value is neither a bool nor a number.
pub fn take_bool_option(options: &mut Options, key: &str) -> Result<Option<bool>> {
    match options.remove(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Bool(b)) => Ok(Some(b)),
        Some(JsonValue::Number(n)) => Ok(Some(n.as_f64().is_some_and(|v| v != 0.0))),
        Some(other) => Err(CfRegridError::configuration(format!(
            "option '{key}' expects a boolean or 0/1, got {other}"
        ))),
    }
}

/// Remove a string option and parse it
///
/// # Errors
///
/// Returns a configuration error for non-string values or unparsable strings.
pub fn take_parsed_option<V>(options: &mut Options, key: &str) -> Result<Option<V>>
where
    V: FromStr<Err = CfRegridError>,
{
    match options.remove(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => s.parse().map(Some),
        Some(other) => Err(CfRegridError::configuration(format!(
            "option '{key}' expects a string, got {other}"
        ))),
    }
}
