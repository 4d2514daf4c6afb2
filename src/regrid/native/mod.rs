//! Pure Rust interpolation engines
//!
//! [`NativeBackend`] builds engines for both families on 2-D rectilinear
//! latitude/longitude grids: nodal bilinear interpolation stands in for the
//! "libcf" engine, bilinear or first-order conservative remapping for the
//! "esmf" one. Weights are computed once, on the rayon pool, and kept as
//! sparse rows.

mod bilinear;
mod conservative;

use super::engine::{
    ApplyContext, CoordSystem, Diagnostics, EngineBackend, EsmfSetup, LibCfSetup, Options,
    RegridEngine, RegridMethod, StaggerLocation,
};
use super::grid::GridSpec;
use crate::errors::{CfRegridError, Result};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Ix2, IxDyn};
use num_traits::{Float, NumCast};
use std::marker::PhantomData;
use tracing::{debug, info};

pub use conservative::CellAreas;

const RECTILINEAR_TOL: f64 = 1.0e-9;

/// Engine factory backed by the native interpolation code
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl<T> EngineBackend<T> for NativeBackend
where
    T: Float + Send + Sync + 'static,
{
    fn libcf(&self, setup: LibCfSetup) -> Result<Box<dyn RegridEngine<T>>> {
        Ok(Box::new(NodalLinearEngine::<T>::new(setup)?))
    }

    fn esmf(&self, setup: EsmfSetup) -> Result<Box<dyn RegridEngine<T>>> {
        Ok(Box::new(StructuredEngine::<T>::new(setup)?))
    }
}

/// Latitude and longitude axes of a rectilinear grid, with optional cell edges
#[derive(Debug, Clone, PartialEq)]
pub struct RectilinearAxes {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub lat_edges: Option<Vec<f64>>,
    pub lon_edges: Option<Vec<f64>>,
    /// Row-major node validity
    pub valid: Vec<bool>,
}

impl RectilinearAxes {
    /// Extract the 1-D axes of a 2-D grid
    ///
    /// # Errors
    ///
    /// Fails unless the grid is 2-D, latitude varies along the first axis only,
    /// longitude along the second only, and each axis has at least two nodes.
    pub fn from_grid(grid: &GridSpec, label: &str) -> Result<Self> {
        if grid.ndim() != 2 {
            return Err(CfRegridError::configuration(format!(
                "native engines need a 2-D {label} grid, got {} dimensions",
                grid.ndim()
            )));
        }
        let lats = grid.coords[0].view().into_dimensionality::<Ix2>()?;
        let lons = grid.coords[1].view().into_dimensionality::<Ix2>()?;
        let (nlat, nlon) = lats.dim();
        if nlat < 2 || nlon < 2 {
            return Err(CfRegridError::configuration(format!(
                "{label} grid must have at least two nodes along each axis, got {nlat}x{nlon}"
            )));
        }

        let lat: Vec<f64> = lats.column(0).to_vec();
        let lon: Vec<f64> = lons.row(0).to_vec();
        let rectilinear = lats
            .indexed_iter()
            .all(|((i, _), &v)| (v - lat[i]).abs() <= RECTILINEAR_TOL)
            && lons
                .indexed_iter()
                .all(|((_, j), &v)| (v - lon[j]).abs() <= RECTILINEAR_TOL);
        if !rectilinear {
            return Err(CfRegridError::configuration(format!(
                "{label} grid is curvilinear, native engines only handle rectilinear grids"
            )));
        }

        let (lat_edges, lon_edges) = match &grid.bounds {
            Some(bounds) => {
                let lat_b = bounds[0].view().into_dimensionality::<Ix2>()?;
                let lon_b = bounds[1].view().into_dimensionality::<Ix2>()?;
                (Some(lat_b.column(0).to_vec()), Some(lon_b.row(0).to_vec()))
            }
            None => (None, None),
        };

        let valid = match &grid.mask {
            Some(mask) => mask.iter().copied().collect(),
            None => vec![true; nlat * nlon],
        };

        Ok(Self {
            lat,
            lon,
            lat_edges,
            lon_edges,
            valid,
        })
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.lat.len(), self.lon.len()]
    }

    pub fn num_nodes(&self) -> usize {
        self.lat.len() * self.lon.len()
    }

    /// Row-major flat index of node `(i, j)`
    pub fn flat(&self, i: usize, j: usize) -> usize {
        i * self.lon.len() + j
    }
}

/// One destination node and the source nodes feeding it
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRow {
    pub dst: usize,
    pub entries: Vec<(usize, f64)>,
}

/// Sparse interpolation matrix in row-major node numbering
#[derive(Debug, Clone, PartialEq)]
pub struct SparseWeights {
    pub rows: Vec<WeightRow>,
    pub num_src: usize,
    pub num_dst: usize,
}

impl SparseWeights {
    /// Number of destination nodes that receive a value
    pub fn num_valid(&self) -> usize {
        self.rows.len()
    }

    /// Sum of the weights of each destination node, zero where unreached
    pub fn row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.num_dst];
        for row in &self.rows {
            sums[row.dst] = row.entries.iter().map(|&(_, w)| w).sum();
        }
        sums
    }

    /// Apply the weights to one field; unreached destination nodes keep their value
    ///
    /// # Errors
    ///
    /// Fails when the array sizes disagree with the weight matrix.
    pub fn apply<T: Float>(&self, src: ArrayViewD<'_, T>, mut dst: ArrayViewMutD<'_, T>) -> Result<()> {
        if src.len() != self.num_src {
            return Err(CfRegridError::shape_mismatch(
                "engine source field size",
                &[self.num_src],
                &[src.len()],
            ));
        }
        if dst.len() != self.num_dst {
            return Err(CfRegridError::shape_mismatch(
                "engine destination field size",
                &[self.num_dst],
                &[dst.len()],
            ));
        }

        // Logical iteration order is row-major whatever the memory layout
        let values: Vec<f64> = src.iter().map(|v| v.to_f64().unwrap_or(f64::NAN)).collect();
        let mut result: Vec<Option<f64>> = vec![None; self.num_dst];
        for row in &self.rows {
            let sum: f64 = row.entries.iter().map(|&(s, w)| w * values[s]).sum();
            result[row.dst] = Some(sum);
        }

        for (d, r) in dst.iter_mut().zip(result) {
            if let Some(value) = r.and_then(<T as NumCast>::from) {
                *d = value;
            }
        }
        Ok(())
    }
}

fn scalar(value: f64) -> ArrayD<f64> {
    ArrayD::from_elem(IxDyn(&[]), value)
}

fn apply_weights<T: Float>(
    weights: Option<&SparseWeights>,
    src: ArrayViewD<'_, T>,
    dst: ArrayViewMutD<'_, T>,
    ctx: &ApplyContext<'_>,
) -> Result<()> {
    let weights = weights.ok_or(CfRegridError::WeightsNotComputed)?;
    if let Some(root) = ctx.root_pe {
        debug!(root, "single process run, root_pe has no effect");
    }
    weights.apply(src, dst)
}

/// Nodal bilinear engine answering to the "libcf" selector
pub struct NodalLinearEngine<T> {
    src: RectilinearAxes,
    dst: RectilinearAxes,
    dst_coords: Vec<ArrayD<f64>>,
    mk_cyclic: bool,
    handle_cut: bool,
    weights: Option<SparseWeights>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> NodalLinearEngine<T> {
    /// # Errors
    ///
    /// Fails for grids that are not 2-D rectilinear.
    pub fn new(setup: LibCfSetup) -> Result<Self> {
        let src = RectilinearAxes::from_grid(&setup.src, "source")?;
        let dst = RectilinearAxes::from_grid(&setup.dst, "destination")?;
        if !setup.options.is_empty() {
            debug!(keys = ?setup.options.keys().collect::<Vec<_>>(), "ignoring libcf options");
        }
        Ok(Self {
            src,
            dst,
            dst_coords: setup.dst.coords,
            mk_cyclic: setup.mk_cyclic,
            handle_cut: setup.handle_cut,
            weights: None,
            _marker: PhantomData,
        })
    }
}

impl<T: Float + Send + Sync> RegridEngine<T> for NodalLinearEngine<T> {
    fn compute_weights(&mut self, _options: &Options) -> Result<()> {
        if self.weights.is_some() {
            return Err(CfRegridError::WeightsAlreadyComputed);
        }
        if self.handle_cut {
            debug!("rectilinear grids have no tripolar cut");
        }
        let period = self.mk_cyclic.then_some(360.0);
        let weights = bilinear::compute(&self.src, &self.dst, period, Some(360.0));
        info!(
            valid = weights.num_valid(),
            total = weights.num_dst,
            "libcf weights ready"
        );
        self.weights = Some(weights);
        Ok(())
    }

    fn apply(
        &mut self,
        src: ArrayViewD<'_, T>,
        dst: ArrayViewMutD<'_, T>,
        ctx: &ApplyContext<'_>,
    ) -> Result<()> {
        apply_weights(self.weights.as_ref(), src, dst, ctx)
    }

    fn get_dst_grid(&self) -> Vec<ArrayD<f64>> {
        self.dst_coords.clone()
    }

    fn fill_in_diagnostic_data(&self, diag: &mut Diagnostics, _root_pe: Option<usize>) -> Result<()> {
        if let Some(slot) = diag.get_mut("numDstPoints") {
            *slot = scalar(self.dst.num_nodes() as f64);
        }
        if let Some(slot) = diag.get_mut("numValid") {
            let weights = self.weights.as_ref().ok_or(CfRegridError::WeightsNotComputed)?;
            *slot = scalar(weights.num_valid() as f64);
        }
        Ok(())
    }
}

/// Structured engine answering to the "esmf" selector
pub struct StructuredEngine<T> {
    src: RectilinearAxes,
    dst: RectilinearAxes,
    dst_coords: Vec<ArrayD<f64>>,
    method: RegridMethod,
    periodic: bool,
    coord_sys: CoordSystem,
    weights: Option<SparseWeights>,
    areas: Option<(CellAreas, CellAreas)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StructuredEngine<T> {
    /// # Errors
    ///
    /// Fails for non rectilinear grids, corner staggering and patch recovery.
    pub fn new(setup: EsmfSetup) -> Result<Self> {
        if setup.method == RegridMethod::Patch {
            return Err(CfRegridError::configuration(
                "patch recovery is not available in the native engine",
            ));
        }
        if setup.stagger == StaggerLocation::Corner {
            return Err(CfRegridError::configuration(
                "native engine only supports cell center staggering",
            ));
        }
        let src = RectilinearAxes::from_grid(&setup.src, "source")?;
        let dst = RectilinearAxes::from_grid(&setup.dst, "destination")?;
        if !setup.options.is_empty() {
            debug!(keys = ?setup.options.keys().collect::<Vec<_>>(), "ignoring esmf options");
        }
        Ok(Self {
            src,
            dst,
            dst_coords: setup.dst.coords,
            method: setup.method,
            periodic: setup.periodic,
            coord_sys: setup.coord_sys,
            weights: None,
            areas: None,
            _marker: PhantomData,
        })
    }
}

impl<T: Float + Send + Sync> RegridEngine<T> for StructuredEngine<T> {
    fn compute_weights(&mut self, _options: &Options) -> Result<()> {
        if self.weights.is_some() {
            return Err(CfRegridError::WeightsAlreadyComputed);
        }
        let weights = match self.method {
            RegridMethod::Conservative => {
                let (weights, src_areas, dst_areas) =
                    conservative::compute(&self.src, &self.dst, self.coord_sys);
                self.areas = Some((src_areas, dst_areas));
                weights
            }
            RegridMethod::Linear | RegridMethod::Patch => {
                let period = self.coord_sys.period();
                bilinear::compute(&self.src, &self.dst, period.filter(|_| self.periodic), period)
            }
        };
        info!(
            method = self.method.as_str(),
            valid = weights.num_valid(),
            total = weights.num_dst,
            "esmf weights ready"
        );
        self.weights = Some(weights);
        Ok(())
    }

    fn apply(
        &mut self,
        src: ArrayViewD<'_, T>,
        dst: ArrayViewMutD<'_, T>,
        ctx: &ApplyContext<'_>,
    ) -> Result<()> {
        apply_weights(self.weights.as_ref(), src, dst, ctx)
    }

    fn get_dst_grid(&self) -> Vec<ArrayD<f64>> {
        self.dst_coords.clone()
    }

    fn fill_in_diagnostic_data(&self, diag: &mut Diagnostics, _root_pe: Option<usize>) -> Result<()> {
        let wanted = ["srcAreas", "dstAreas", "srcAreaFractions", "dstAreaFractions"];
        if !wanted.iter().any(|key| diag.contains_key(*key)) {
            return Ok(());
        }
        let weights = self.weights.as_ref().ok_or(CfRegridError::WeightsNotComputed)?;
        let (src_areas, dst_areas) = match &self.areas {
            Some((s, d)) => (s.clone(), d.clone()),
            None => (
                CellAreas::new(&self.src, self.coord_sys),
                CellAreas::new(&self.dst, self.coord_sys),
            ),
        };
        let src_shape = IxDyn(&self.src.shape());
        let dst_shape = IxDyn(&self.dst.shape());

        if let Some(slot) = diag.get_mut("srcAreas") {
            *slot = ArrayD::from_shape_vec(src_shape.clone(), src_areas.flat())?;
        }
        if let Some(slot) = diag.get_mut("dstAreas") {
            *slot = ArrayD::from_shape_vec(dst_shape.clone(), dst_areas.flat())?;
        }
        if let Some(slot) = diag.get_mut("dstAreaFractions") {
            *slot = ArrayD::from_shape_vec(dst_shape, weights.row_sums())?;
        }
        if let Some(slot) = diag.get_mut("srcAreaFractions") {
            let fractions = conservative::src_fractions(weights, &src_areas, &dst_areas);
            *slot = ArrayD::from_shape_vec(src_shape, fractions)?;
        }
        Ok(())
    }
}
