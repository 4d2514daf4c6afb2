//! Horizontal grid descriptions
//!
//! A grid is an ordered list of N coordinate arrays of identical shape, one per
//! horizontal dimension (latitude first, longitude last for geographic grids),
//! plus optional node validity mask, cell bounds and cell areas.

use crate::errors::{CfRegridError, Result};
use ndarray::{ArrayD, Axis, IxDyn};

/// Source or destination grid handed to the regrid façade
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    /// Coordinate arrays, all of the grid's shape
    pub coords: Vec<ArrayD<f64>>,
    /// Node validity, `true` where the node takes part in the interpolation
    pub mask: Option<ArrayD<bool>>,
    /// Nodal cell corner coordinates, one array per dimension, each axis one
    /// longer than the grid
    pub bounds: Option<Vec<ArrayD<f64>>>,
    /// Cell areas, of the grid's shape
    pub areas: Option<ArrayD<f64>>,
}

impl GridSpec {
    pub fn new(coords: Vec<ArrayD<f64>>) -> Self {
        Self {
            coords,
            mask: None,
            bounds: None,
            areas: None,
        }
    }

    /// Curvilinear-form grid built from 1-D latitude and longitude axes
    pub fn rectilinear(lat: &[f64], lon: &[f64]) -> Self {
        let shape = IxDyn(&[lat.len(), lon.len()]);
        let lats = ArrayD::from_shape_fn(shape.clone(), |idx| lat[idx[0]]);
        let lons = ArrayD::from_shape_fn(shape, |idx| lon[idx[1]]);
        Self::new(vec![lats, lons])
    }

    /// Attach nodal bounds built from 1-D latitude and longitude cell edges
    #[must_use]
    pub fn with_rectilinear_bounds(self, lat_edges: &[f64], lon_edges: &[f64]) -> Self {
        let corners = GridSpec::rectilinear(lat_edges, lon_edges);
        self.with_bounds(corners.coords)
    }

    #[must_use]
    pub fn with_mask(mut self, mask: ArrayD<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, bounds: Vec<ArrayD<f64>>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn with_areas(mut self, areas: ArrayD<f64>) -> Self {
        self.areas = Some(areas);
        self
    }

    /// Number of horizontal dimensions
    pub fn ndim(&self) -> usize {
        self.coords.len()
    }

    /// Nodal shape of the grid
    pub fn shape(&self) -> &[usize] {
        self.coords.first().map_or(&[], |c| c.shape())
    }

    pub fn num_nodes(&self) -> usize {
        self.shape().iter().product()
    }

    /// Check that coordinates, mask, bounds and areas agree in shape
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty grid and a shape mismatch for
    /// any array that disagrees with the coordinate shape.
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.coords.is_empty() {
            return Err(CfRegridError::configuration(format!(
                "{label} grid has no coordinate arrays"
            )));
        }
        let shape = self.shape().to_vec();
        if shape.len() != self.ndim() {
            return Err(CfRegridError::shape_mismatch(
                format!("{label} grid coordinate rank"),
                &[self.ndim()],
                &[shape.len()],
            ));
        }
        for coord in &self.coords[1..] {
            if coord.shape() != shape.as_slice() {
                return Err(CfRegridError::shape_mismatch(
                    format!("{label} grid coordinates"),
                    &shape,
                    coord.shape(),
                ));
            }
        }
        if let Some(mask) = &self.mask {
            if mask.shape() != shape.as_slice() {
                return Err(CfRegridError::shape_mismatch(
                    format!("{label} grid mask"),
                    &shape,
                    mask.shape(),
                ));
            }
        }
        if let Some(areas) = &self.areas {
            if areas.shape() != shape.as_slice() {
                return Err(CfRegridError::shape_mismatch(
                    format!("{label} grid areas"),
                    &shape,
                    areas.shape(),
                ));
            }
        }
        if let Some(bounds) = &self.bounds {
            if bounds.len() != self.ndim() {
                return Err(CfRegridError::configuration(format!(
                    "{label} grid has {} bounds arrays for {} dimensions",
                    bounds.len(),
                    self.ndim()
                )));
            }
            let nodal: Vec<usize> = shape.iter().map(|n| n + 1).collect();
            for b in bounds {
                if b.shape() != nodal.as_slice() {
                    return Err(CfRegridError::shape_mismatch(
                        format!("{label} grid bounds"),
                        &nodal,
                        b.shape(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Guess whether a source grid wraps around in longitude
///
/// Longitude is assumed to be the last bounds array. The grid counts as
/// periodic when the last bound minus 360 matches the first bound on average,
/// within 1% of one cell width; anything else looks like a regional model.
pub fn guess_periodicity(bounds: Option<&[ArrayD<f64>]>) -> bool {
    let Some(lonsb) = bounds.and_then(|b| b.last()) else {
        return false;
    };
    let Some(&nlon) = lonsb.shape().last() else {
        return false;
    };
    if nlon == 0 || lonsb.is_empty() {
        return false;
    }

    let max = lonsb.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = lonsb.iter().copied().fold(f64::INFINITY, f64::min);
    let dlon = (max - min) / nlon as f64;
    let tol = 1.0e-2 * dlon;

    let last_axis = Axis(lonsb.ndim() - 1);
    let first = lonsb.index_axis(last_axis, 0);
    let last = lonsb.index_axis(last_axis, nlon - 1);
    let mismatch: f64 = last
        .iter()
        .zip(first.iter())
        .map(|(&l, &f)| l - 360.0 - f)
        .sum();

    (mismatch / lonsb.len() as f64).abs() <= tol
}
