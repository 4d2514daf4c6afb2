//! Generic regrid façade
//!
//! [`GenericRegrid`] hides which engine does the work. It computes weights once
//! and then applies them to any number of fields, taking care of missing values
//! and of the extra (time, level, ensemble, ...) dimensions in front of the
//! horizontal ones.

use super::engine::{
    take_bool_option, take_parsed_option, ApplyContext, CoordSystem, Diagnostics, EngineBackend,
    EsmfSetup, LibCfSetup, Options, RegridEngine, RegridMethod, RegridTool, StaggerLocation,
};
use super::grid::{guess_periodicity, GridSpec};
use crate::errors::{CfRegridError, Result};
use ndarray::{indices, ArrayD, ArrayViewD, ArrayViewMutD, Axis, Dimension, IxDyn, Zip};
use num_traits::{Float, NumCast};
use tracing::{debug, info, warn};

/// Used to locate fully masked cells after conservative interpolation
pub const MASK_EPS: f64 = 10.0 * 1.19209e-07;

/// Lifecycle of a regrid session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Engine selected, weights not computed yet
    Created,
    /// Weights computed, ready to apply
    WeightsComputed,
}

/// Regrid session over one source/destination grid pair
pub struct GenericRegrid<T> {
    n_grid_dims: usize,
    method: RegridMethod,
    tool: RegridTool,
    src_shape: Vec<usize>,
    dst_shape: Vec<usize>,
    engine: Box<dyn RegridEngine<T>>,
    state: SessionState,
}

impl<T: Float + 'static> GenericRegrid<T> {
    /// Select an engine and hand it the grids
    ///
    /// `tool` is matched case-insensitively: anything containing "libcf" or
    /// "gsreg" picks the nodal engine, anything containing "esm" the structured
    /// one. For the structured engine the `staggerLoc`, `periodicity` and
    /// `coordSys` options are consumed here; when `periodicity` is absent it is
    /// guessed from the source bounds.
    ///
    /// # Errors
    ///
    /// Fails when the grids differ in dimensionality, when a grid is
    /// inconsistent, when the tool is unknown or when the engine rejects the
    /// setup.
    pub fn new(
        src: GridSpec,
        dst: GridSpec,
        method: RegridMethod,
        tool: &str,
        backend: &dyn EngineBackend<T>,
        mut options: Options,
    ) -> Result<Self> {
        if src.ndim() != dst.ndim() {
            return Err(CfRegridError::GridDimMismatch {
                src: src.ndim(),
                dst: dst.ndim(),
            });
        }
        let selected = RegridTool::from_selector(tool)?;
        src.validate("source")?;
        dst.validate("destination")?;

        let n_grid_dims = src.ndim();
        let src_shape = src.shape().to_vec();

        let engine = match selected {
            RegridTool::LibCf => {
                if method != RegridMethod::Linear {
                    warn!(
                        method = method.as_str(),
                        "libcf engine only interpolates linearly"
                    );
                }
                let mk_cyclic = take_bool_option(&mut options, "mkCyclic")?.unwrap_or(false);
                let handle_cut = take_bool_option(&mut options, "handleCut")?.unwrap_or(false);
                backend.libcf(LibCfSetup {
                    src,
                    dst,
                    mk_cyclic,
                    handle_cut,
                    options,
                })?
            }
            RegridTool::Esmf => {
                let stagger: StaggerLocation =
                    take_parsed_option(&mut options, "staggerLoc")?.unwrap_or_default();
                let periodic = match take_bool_option(&mut options, "periodicity")? {
                    Some(periodic) => periodic,
                    None => guess_periodicity(src.bounds.as_deref()),
                };
                let coord_sys: CoordSystem =
                    take_parsed_option(&mut options, "coordSys")?.unwrap_or_default();
                debug!(?stagger, periodic, ?coord_sys, "structured engine setup");
                backend.esmf(EsmfSetup {
                    src,
                    dst,
                    method,
                    stagger,
                    periodic,
                    coord_sys,
                    options,
                })?
            }
        };

        let dst_shape = engine
            .get_dst_grid()
            .first()
            .map(|c| c.shape().to_vec())
            .unwrap_or_default();

        info!(
            tool = selected.as_str(),
            method = method.as_str(),
            ?src_shape,
            ?dst_shape,
            "regrid session created"
        );

        Ok(Self {
            n_grid_dims,
            method,
            tool: selected,
            src_shape,
            dst_shape,
            engine,
            state: SessionState::Created,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn method(&self) -> RegridMethod {
        self.method
    }

    pub fn tool(&self) -> RegridTool {
        self.tool
    }

    /// Number of horizontal dimensions
    pub fn n_grid_dims(&self) -> usize {
        self.n_grid_dims
    }

    /// Compute the interpolation weights; must precede [`apply`](Self::apply)
    ///
    /// # Errors
    ///
    /// Fails when weights were already computed for this session or when the
    /// engine fails.
    pub fn compute_weights(&mut self, options: &Options) -> Result<()> {
        if self.state == SessionState::WeightsComputed {
            return Err(CfRegridError::WeightsAlreadyComputed);
        }
        self.engine.compute_weights(options)?;
        self.state = SessionState::WeightsComputed;
        info!(tool = self.tool.as_str(), "weights computed");
        Ok(())
    }

    /// Regrid `src` into `dst`
    ///
    /// The trailing dimensions of both arrays are the horizontal ones; leading
    /// dimensions must match and are iterated in row-major order, one plane at
    /// a time. With a `missing_value`, source nodes equal to it are excluded
    /// and destination cells fed by them are set to it: for conservative
    /// interpolation a cell is missing when more than `1 - MASK_EPS` of it is
    /// covered by missing data, otherwise any missing contribution suffices.
    ///
    /// Nothing is written to `dst` unless all shapes check out.
    ///
    /// # Errors
    ///
    /// Fails when weights were not computed, when shapes disagree, or when the
    /// engine fails.
    pub fn apply(
        &mut self,
        src: ArrayViewD<'_, T>,
        mut dst: ArrayViewMutD<'_, T>,
        root_pe: Option<usize>,
        missing_value: Option<T>,
        options: &Options,
    ) -> Result<()> {
        if self.state != SessionState::WeightsComputed {
            return Err(CfRegridError::WeightsNotComputed);
        }
        let leading = self.check_shapes(src.shape(), dst.shape())?;
        let ctx = ApplyContext {
            root_pe,
            global_indexing: true,
            options,
        };

        if leading.is_empty() {
            return self.apply_plane(src, dst, missing_value, &ctx);
        }

        debug!(?leading, "iterating over non-horizontal axes");
        for index in indices(IxDyn(&leading)) {
            let src_plane = leading_plane(src.view(), index.slice());
            let dst_plane = leading_plane_mut(dst.view_mut(), index.slice());
            self.apply_plane(src_plane, dst_plane, missing_value, &ctx)?;
        }
        Ok(())
    }

    /// Destination grid as decomposed by the engine
    pub fn get_dst_grid(&self) -> Vec<ArrayD<f64>> {
        self.engine.get_dst_grid()
    }

    /// Let the engine fill diagnostic fields such as interpolation fractions
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn fill_in_diagnostic_data(
        &self,
        diag: &mut Diagnostics,
        root_pe: Option<usize>,
    ) -> Result<()> {
        self.engine.fill_in_diagnostic_data(diag, root_pe)
    }

    /// Validate data shapes, returning the leading (non-horizontal) shape
    fn check_shapes(&self, src: &[usize], dst: &[usize]) -> Result<Vec<usize>> {
        let n = self.n_grid_dims;
        if src.len() < n {
            return Err(CfRegridError::shape_mismatch(
                "source data",
                &self.src_shape,
                src,
            ));
        }
        if dst.len() < n {
            return Err(CfRegridError::shape_mismatch(
                "destination data",
                &self.dst_shape,
                dst,
            ));
        }
        let (src_lead, src_horiz) = src.split_at(src.len() - n);
        let (dst_lead, dst_horiz) = dst.split_at(dst.len() - n);
        if src_lead != dst_lead {
            return Err(CfRegridError::shape_mismatch(
                "non-horizontal axes",
                src_lead,
                dst_lead,
            ));
        }
        if src_horiz != self.src_shape.as_slice() {
            return Err(CfRegridError::shape_mismatch(
                "source horizontal axes",
                &self.src_shape,
                src_horiz,
            ));
        }
        if dst_horiz != self.dst_shape.as_slice() {
            return Err(CfRegridError::shape_mismatch(
                "destination horizontal axes",
                &self.dst_shape,
                dst_horiz,
            ));
        }
        Ok(src_lead.to_vec())
    }

    fn apply_plane(
        &mut self,
        src: ArrayViewD<'_, T>,
        mut dst: ArrayViewMutD<'_, T>,
        missing_value: Option<T>,
        ctx: &ApplyContext<'_>,
    ) -> Result<()> {
        let Some(missing) = missing_value else {
            return self.engine.apply(src, dst, ctx);
        };

        let src_mask = src.mapv(|v| if v == missing { T::one() } else { T::zero() });
        // Zero the missing nodes, their contribution comes back through the mask
        let indata = src.mapv(|v| if v == missing { T::zero() } else { v });

        let mut dst_mask = ArrayD::<T>::zeros(dst.raw_dim());
        self.engine.apply(src_mask.view(), dst_mask.view_mut(), ctx)?;
        let conservative = self.method.is_conservative();
        let threshold = T::one() - <T as NumCast>::from(MASK_EPS).unwrap_or_else(T::zero);
        let is_masked = |m: T| {
            if conservative {
                m > threshold
            } else {
                m > T::zero()
            }
        };

        dst.fill(missing);
        self.engine.apply(indata.view(), dst.view_mut(), ctx)?;

        Zip::from(&mut dst).and(&dst_mask).for_each(|d, &m| {
            if is_masked(m) {
                *d = missing;
            }
        });
        Ok(())
    }
}

fn leading_plane<'a, T>(view: ArrayViewD<'a, T>, index: &[usize]) -> ArrayViewD<'a, T> {
    index
        .iter()
        .fold(view, |plane, &i| plane.index_axis_move(Axis(0), i))
}

fn leading_plane_mut<'a, T>(view: ArrayViewMutD<'a, T>, index: &[usize]) -> ArrayViewMutD<'a, T> {
    index
        .iter()
        .fold(view, |plane, &i| plane.index_axis_move(Axis(0), i))
}
