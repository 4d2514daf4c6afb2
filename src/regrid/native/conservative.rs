//! First-order conservative weights on rectilinear grids
//!
//! Cells are latitude/longitude boxes, so the overlap of two cells separates
//! into a latitude factor and a longitude factor. On the sphere the area of a
//! box is `(sin φ2 - sin φ1) * Δλ`, on a plane it is `Δy * Δx`.

use super::{RectilinearAxes, SparseWeights, WeightRow};
use crate::regrid::engine::CoordSystem;
use rayon::prelude::*;
use std::f64::consts::FRAC_PI_2;

/// Cell edges from explicit bounds, or half way between nodes
fn cell_edges(centers: &[f64], bounds: Option<&[f64]>) -> Vec<f64> {
    if let Some(b) = bounds {
        return b.to_vec();
    }
    let n = centers.len();
    let mut edges = Vec::with_capacity(n + 1);
    edges.push(centers[0] - 0.5 * (centers[1] - centers[0]));
    edges.extend(centers.windows(2).map(|w| 0.5 * (w[0] + w[1])));
    edges.push(centers[n - 1] + 0.5 * (centers[n - 1] - centers[n - 2]));
    edges
}

fn intervals(edges: &[f64]) -> Vec<(f64, f64)> {
    edges
        .windows(2)
        .map(|w| (w[0].min(w[1]), w[0].max(w[1])))
        .collect()
}

/// Cell extents of one grid in the units of its coordinate system
struct CellBoxes {
    lat: Vec<(f64, f64)>,
    lon: Vec<(f64, f64)>,
    spherical: bool,
    period: Option<f64>,
}

impl CellBoxes {
    fn new(axes: &RectilinearAxes, coord_sys: CoordSystem) -> Self {
        let spherical = coord_sys != CoordSystem::Cartesian;
        let to_native = |v: f64| coord_sys.to_radians(v);
        let lat_edges: Vec<f64> = cell_edges(&axes.lat, axes.lat_edges.as_deref())
            .into_iter()
            .map(to_native)
            .map(|v| if spherical { v.clamp(-FRAC_PI_2, FRAC_PI_2) } else { v })
            .collect();
        let lon_edges: Vec<f64> = cell_edges(&axes.lon, axes.lon_edges.as_deref())
            .into_iter()
            .map(to_native)
            .collect();
        Self {
            lat: intervals(&lat_edges),
            lon: intervals(&lon_edges),
            spherical,
            period: spherical.then_some(std::f64::consts::TAU),
        }
    }

    fn lat_measure(&self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            0.0
        } else if self.spherical {
            hi.sin() - lo.sin()
        } else {
            hi - lo
        }
    }

    fn lat_overlap(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        self.lat_measure(a.0.max(b.0), a.1.min(b.1))
    }

    fn lon_overlap(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let overlap = |shift: f64| ((a.1 + shift).min(b.1) - (a.0 + shift).max(b.0)).max(0.0);
        match self.period {
            Some(p) => (-2..=2).map(|k| overlap(f64::from(k) * p)).sum(),
            None => overlap(0.0),
        }
    }
}

/// Cell areas of a rectilinear grid, as separate latitude and longitude factors
#[derive(Debug, Clone, PartialEq)]
pub struct CellAreas {
    lat: Vec<f64>,
    lon: Vec<f64>,
}

impl CellAreas {
    pub fn new(axes: &RectilinearAxes, coord_sys: CoordSystem) -> Self {
        Self::from_boxes(&CellBoxes::new(axes, coord_sys))
    }

    fn from_boxes(boxes: &CellBoxes) -> Self {
        Self {
            lat: boxes
                .lat
                .iter()
                .map(|&(lo, hi)| boxes.lat_measure(lo, hi))
                .collect(),
            lon: boxes.lon.iter().map(|&(lo, hi)| hi - lo).collect(),
        }
    }

    pub fn area(&self, i: usize, j: usize) -> f64 {
        self.lat[i] * self.lon[j]
    }

    /// Row-major areas of all cells
    pub fn flat(&self) -> Vec<f64> {
        self.lat
            .iter()
            .flat_map(|&a| self.lon.iter().map(move |&b| a * b))
            .collect()
    }

    fn flat_area(&self, k: usize) -> f64 {
        let nlon = self.lon.len();
        self.area(k / nlon, k % nlon)
    }
}

/// Conservative weights, normalised by the destination cell area
///
/// Masked source cells contribute nothing; masked destination cells and cells
/// without any overlap get no row.
pub(super) fn compute(
    src: &RectilinearAxes,
    dst: &RectilinearAxes,
    coord_sys: CoordSystem,
) -> (SparseWeights, CellAreas, CellAreas) {
    let src_boxes = CellBoxes::new(src, coord_sys);
    let dst_boxes = CellBoxes::new(dst, coord_sys);
    let dst_areas = CellAreas::from_boxes(&dst_boxes);

    let lat_overlaps: Vec<Vec<(usize, f64)>> = dst_boxes
        .lat
        .par_iter()
        .map(|&b| {
            src_boxes
                .lat
                .iter()
                .enumerate()
                .map(|(i, &a)| (i, src_boxes.lat_overlap(a, b)))
                .filter(|&(_, ov)| ov > 0.0)
                .collect()
        })
        .collect();
    let lon_overlaps: Vec<Vec<(usize, f64)>> = dst_boxes
        .lon
        .par_iter()
        .map(|&b| {
            src_boxes
                .lon
                .iter()
                .enumerate()
                .map(|(j, &a)| (j, src_boxes.lon_overlap(a, b)))
                .filter(|&(_, ov)| ov > 0.0)
                .collect()
        })
        .collect();

    let nlon = dst.lon.len();
    let rows: Vec<WeightRow> = (0..dst.num_nodes())
        .into_par_iter()
        .filter_map(|k| {
            let area = dst_areas.flat_area(k);
            if !dst.valid[k] || area <= 0.0 {
                return None;
            }
            let mut entries = Vec::new();
            for &(i, lat_ov) in &lat_overlaps[k / nlon] {
                for &(j, lon_ov) in &lon_overlaps[k % nlon] {
                    let s = src.flat(i, j);
                    if src.valid[s] {
                        entries.push((s, lat_ov * lon_ov / area));
                    }
                }
            }
            (!entries.is_empty()).then_some(WeightRow { dst: k, entries })
        })
        .collect();

    let weights = SparseWeights {
        rows,
        num_src: src.num_nodes(),
        num_dst: dst.num_nodes(),
    };
    (weights, CellAreas::from_boxes(&src_boxes), dst_areas)
}

/// Fraction of each source cell covered by destination cells
pub(super) fn src_fractions(
    weights: &SparseWeights,
    src_areas: &CellAreas,
    dst_areas: &CellAreas,
) -> Vec<f64> {
    let mut fractions = vec![0.0; weights.num_src];
    for row in &weights.rows {
        let dst_area = dst_areas.flat_area(row.dst);
        for &(s, w) in &row.entries {
            let src_area = src_areas.flat_area(s);
            if src_area > 0.0 {
                fractions[s] += w * dst_area / src_area;
            }
        }
    }
    fractions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_edges() {
        assert_eq!(cell_edges(&[0.0, 10.0, 20.0], None), vec![-5.0, 5.0, 15.0, 25.0]);
        assert_eq!(cell_edges(&[0.0, 10.0], Some(&[-1.0, 1.0, 2.0][..])), vec![-1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_longitude_overlap_is_modular() {
        let boxes = CellBoxes {
            lat: Vec::new(),
            lon: Vec::new(),
            spherical: true,
            period: Some(360.0),
        };
        assert!((boxes.lon_overlap((350.0, 370.0), (-10.0, 0.0)) - 10.0).abs() < 1e-12);
        assert!((boxes.lon_overlap((0.0, 10.0), (360.0, 365.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_sphere_area_sums_to_four_pi() {
        let axes = RectilinearAxes {
            lat: (0..18).map(|i| -85.0 + 10.0 * f64::from(i)).collect(),
            lon: (0..36).map(|j| 5.0 + 10.0 * f64::from(j)).collect(),
            lat_edges: None,
            lon_edges: None,
            valid: vec![true; 18 * 36],
        };
        let total: f64 = CellAreas::new(&axes, CoordSystem::Degrees).flat().iter().sum();
        assert!((total - 4.0 * std::f64::consts::PI).abs() < 1e-9);
    }
}
