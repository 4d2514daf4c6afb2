//! Bilinear weights on rectilinear grids

use super::{RectilinearAxes, SparseWeights, WeightRow};
use rayon::prelude::*;

/// Locate `v` in a monotonic axis
///
/// Returns the lower node index `i` and the fraction `t` of the way to node
/// `i + 1`, or `None` outside the axis range.
pub(super) fn bracket(axis: &[f64], v: f64) -> Option<(usize, f64)> {
    let n = axis.len();
    if n < 2 || !v.is_finite() {
        return None;
    }
    let ascending = axis[n - 1] >= axis[0];
    let (lo, hi) = if ascending {
        (axis[0], axis[n - 1])
    } else {
        (axis[n - 1], axis[0])
    };
    if v < lo || v > hi {
        return None;
    }

    let above = if ascending {
        axis.partition_point(|&a| a <= v)
    } else {
        axis.partition_point(|&a| a >= v)
    };
    let i = above.saturating_sub(1).min(n - 2);
    let span = axis[i + 1] - axis[i];
    let t = if span == 0.0 { 0.0 } else { (v - axis[i]) / span };
    Some((i, t.clamp(0.0, 1.0)))
}

/// Longitude locator, wrapping around the dateline on cyclic grids
struct LonLocator<'a> {
    lon: &'a [f64],
    extended: Option<Vec<f64>>,
    period: Option<f64>,
}

impl<'a> LonLocator<'a> {
    fn new(lon: &'a [f64], cyclic: Option<f64>, period: Option<f64>) -> Self {
        let ascending = lon.last().zip(lon.first()).is_some_and(|(l, f)| l >= f);
        let extended = cyclic.filter(|_| ascending).map(|p| {
            let mut ext = lon.to_vec();
            ext.push(lon[0] + p);
            ext
        });
        Self {
            lon,
            extended,
            period,
        }
    }

    /// Lower and upper node indices plus fraction
    fn locate(&self, v: f64) -> Option<(usize, usize, f64)> {
        let n = self.lon.len();
        if let Some(ext) = &self.extended {
            let p = ext[n] - ext[0];
            let shifted = ext[0] + (v - ext[0]).rem_euclid(p);
            let (j, u) = bracket(ext, shifted)?;
            return Some((j % n, (j + 1) % n, u));
        }
        let candidates = match self.period {
            Some(p) => [v, v - p, v + p],
            None => [v, v, v],
        };
        candidates
            .into_iter()
            .find_map(|c| bracket(self.lon, c))
            .map(|(j, u)| (j, j + 1, u))
    }
}

/// Bilinear weights from `src` nodes to `dst` nodes
///
/// `cyclic` is the longitude period when the source grid wraps around;
/// `period` lets values outside the source range be tried one period off.
/// Destination nodes outside the source domain, masked destination nodes and
/// nodes fed by a masked source node get no row.
pub(super) fn compute(
    src: &RectilinearAxes,
    dst: &RectilinearAxes,
    cyclic: Option<f64>,
    period: Option<f64>,
) -> SparseWeights {
    let locator = LonLocator::new(&src.lon, cyclic, period);
    let nlon = dst.lon.len();

    let rows: Vec<WeightRow> = (0..dst.num_nodes())
        .into_par_iter()
        .filter_map(|k| {
            if !dst.valid[k] {
                return None;
            }
            let (i, t) = bracket(&src.lat, dst.lat[k / nlon])?;
            let (j0, j1, u) = locator.locate(dst.lon[k % nlon])?;
            let corners = [
                (src.flat(i, j0), (1.0 - t) * (1.0 - u)),
                (src.flat(i + 1, j0), t * (1.0 - u)),
                (src.flat(i, j1), (1.0 - t) * u),
                (src.flat(i + 1, j1), t * u),
            ];
            let entries: Vec<(usize, f64)> =
                corners.into_iter().filter(|&(_, w)| w > 0.0).collect();
            if entries.iter().any(|&(s, _)| !src.valid[s]) {
                return None;
            }
            Some(WeightRow { dst: k, entries })
        })
        .collect();

    SparseWeights {
        rows,
        num_src: src.num_nodes(),
        num_dst: dst.num_nodes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_ascending_and_descending() {
        let asc = [0.0, 10.0, 20.0];
        assert_eq!(bracket(&asc, 15.0), Some((1, 0.5)));
        assert_eq!(bracket(&asc, 20.0), Some((1, 1.0)));
        assert_eq!(bracket(&asc, -1.0), None);

        let desc = [20.0, 10.0, 0.0];
        assert_eq!(bracket(&desc, 15.0), Some((0, 0.5)));
        assert_eq!(bracket(&desc, 0.0), Some((1, 1.0)));
    }

    #[test]
    fn test_cyclic_longitude_wraps() {
        let lon = [0.0, 90.0, 180.0, 270.0];
        let locator = LonLocator::new(&lon, Some(360.0), Some(360.0));
        let (j0, j1, u) = locator.locate(315.0).unwrap();
        assert_eq!((j0, j1), (3, 0));
        assert!((u - 0.5).abs() < 1e-12);

        let (j0, _, u) = locator.locate(-45.0).unwrap();
        assert_eq!(j0, 3);
        assert!((u - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_non_cyclic_tries_shifted_longitude() {
        let lon = [-180.0, -90.0, 0.0, 90.0];
        let locator = LonLocator::new(&lon, None, Some(360.0));
        let (j0, j1, u) = locator.locate(225.0).unwrap();
        assert_eq!((j0, j1), (0, 1));
        assert!((u - 0.5).abs() < 1e-12);
        assert!(locator.locate(135.0).is_none());
    }
}
