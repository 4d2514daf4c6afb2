use cf_regrid::regrid::{
    guess_periodicity, ApplyContext, CoordSystem, Diagnostics, EngineBackend, EsmfSetup,
    GenericRegrid, GridSpec, LibCfSetup, NativeBackend, Options, RegridEngine, RegridMethod,
    RegridTool, SessionState, StaggerLocation, MASK_EPS,
};
use cf_regrid::{CfRegridError, Result};
use ndarray::{Array, ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn};
use num_traits::Float;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

const MISSING: f64 = -999.0;

/// Engine that copies the source field, for grids of identical shape
struct CopyEngine {
    dst_grid: Vec<ArrayD<f64>>,
    root_pes: Rc<RefCell<Vec<Option<usize>>>>,
}

impl<T: Float> RegridEngine<T> for CopyEngine {
    fn compute_weights(&mut self, _options: &Options) -> Result<()> {
        Ok(())
    }

    fn apply(
        &mut self,
        src: ArrayViewD<'_, T>,
        mut dst: ArrayViewMutD<'_, T>,
        ctx: &ApplyContext<'_>,
    ) -> Result<()> {
        self.root_pes.borrow_mut().push(ctx.root_pe);
        dst.assign(&src);
        Ok(())
    }

    fn get_dst_grid(&self) -> Vec<ArrayD<f64>> {
        self.dst_grid.clone()
    }

    fn fill_in_diagnostic_data(&self, _diag: &mut Diagnostics, _root_pe: Option<usize>) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingBackend {
    calls: RefCell<Vec<&'static str>>,
    libcf_setups: RefCell<Vec<LibCfSetup>>,
    esmf_setups: RefCell<Vec<EsmfSetup>>,
    root_pes: Rc<RefCell<Vec<Option<usize>>>>,
}

impl<T: Float + 'static> EngineBackend<T> for RecordingBackend {
    fn libcf(&self, setup: LibCfSetup) -> Result<Box<dyn RegridEngine<T>>> {
        self.calls.borrow_mut().push("libcf");
        let engine = CopyEngine {
            dst_grid: setup.dst.coords.clone(),
            root_pes: Rc::clone(&self.root_pes),
        };
        self.libcf_setups.borrow_mut().push(setup);
        Ok(Box::new(engine))
    }

    fn esmf(&self, setup: EsmfSetup) -> Result<Box<dyn RegridEngine<T>>> {
        self.calls.borrow_mut().push("esmf");
        let engine = CopyEngine {
            dst_grid: setup.dst.coords.clone(),
            root_pes: Rc::clone(&self.root_pes),
        };
        self.esmf_setups.borrow_mut().push(setup);
        Ok(Box::new(engine))
    }
}

/// Engine writing a fixed value per call, cycling through `passes`
struct ConstantEngine {
    dst_grid: Vec<ArrayD<f64>>,
    passes: Vec<f64>,
    calls: usize,
}

impl<T: Float> RegridEngine<T> for ConstantEngine {
    fn compute_weights(&mut self, _options: &Options) -> Result<()> {
        Ok(())
    }

    fn apply(
        &mut self,
        _src: ArrayViewD<'_, T>,
        mut dst: ArrayViewMutD<'_, T>,
        _ctx: &ApplyContext<'_>,
    ) -> Result<()> {
        let value = self.passes[self.calls % self.passes.len()];
        self.calls += 1;
        dst.fill(<T as num_traits::NumCast>::from(value).unwrap());
        Ok(())
    }

    fn get_dst_grid(&self) -> Vec<ArrayD<f64>> {
        self.dst_grid.clone()
    }

    fn fill_in_diagnostic_data(&self, _diag: &mut Diagnostics, _root_pe: Option<usize>) -> Result<()> {
        Ok(())
    }
}

/// Backend whose engines answer the mask pass and the data pass with fixed values
struct ConstantBackend {
    mask: f64,
    data: f64,
}

impl ConstantBackend {
    fn engine<T: Float + 'static>(&self, dst: &GridSpec) -> Box<dyn RegridEngine<T>> {
        Box::new(ConstantEngine {
            dst_grid: dst.coords.clone(),
            passes: vec![self.mask, self.data],
            calls: 0,
        })
    }
}

impl<T: Float + 'static> EngineBackend<T> for ConstantBackend {
    fn libcf(&self, setup: LibCfSetup) -> Result<Box<dyn RegridEngine<T>>> {
        Ok(self.engine(&setup.dst))
    }

    fn esmf(&self, setup: EsmfSetup) -> Result<Box<dyn RegridEngine<T>>> {
        Ok(self.engine(&setup.dst))
    }
}

fn axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

fn small_grid() -> GridSpec {
    GridSpec::rectilinear(&axis(-30.0, 30.0, 3), &axis(0.0, 90.0, 4))
}

/// Global 4x8 grid of 45 degree cells
fn fine_global_grid() -> GridSpec {
    GridSpec::rectilinear(&axis(-67.5, 45.0, 4), &axis(22.5, 45.0, 8))
}

/// Global 2x4 grid of 90 degree cells, each covering 2x2 fine cells
fn coarse_global_grid() -> GridSpec {
    GridSpec::rectilinear(&axis(-45.0, 90.0, 2), &axis(45.0, 90.0, 4))
}

fn smooth_field(grid: &GridSpec) -> ArrayD<f64> {
    let lat = &grid.coords[0];
    let lon = &grid.coords[1];
    let mut field = ArrayD::zeros(IxDyn(grid.shape()));
    ndarray::Zip::from(&mut field)
        .and(lat)
        .and(lon)
        .for_each(|f, &la: &f64, &lo: &f64| {
            *f = 2.0 + la.to_radians().cos() * lo.to_radians().sin();
        });
    field
}

fn session(
    src: GridSpec,
    dst: GridSpec,
    method: RegridMethod,
    tool: &str,
    options: Options,
) -> GenericRegrid<f64> {
    let mut session = GenericRegrid::new(src, dst, method, tool, &NativeBackend::new(), options)
        .expect("Failed to create regrid session");
    session
        .compute_weights(&Options::new())
        .expect("Failed to compute weights");
    session
}

#[test]
fn test_engine_selection() {
    let cases = [
        ("ESMF", RegridTool::Esmf, "esmf"),
        ("esm-struct", RegridTool::Esmf, "esmf"),
        ("LibCF", RegridTool::LibCf, "libcf"),
        ("gsRegrid", RegridTool::LibCf, "libcf"),
    ];
    for (selector, tool, factory) in cases {
        assert_eq!(RegridTool::from_selector(selector).unwrap(), tool);

        let backend = RecordingBackend::default();
        let regrid = GenericRegrid::<f64>::new(
            small_grid(),
            small_grid(),
            RegridMethod::Linear,
            selector,
            &backend,
            Options::new(),
        )
        .expect("valid selector");
        assert_eq!(regrid.tool(), tool);
        assert_eq!(regrid.state(), SessionState::Created);
        assert_eq!(*backend.calls.borrow(), vec![factory]);
    }
}

#[test]
fn test_unknown_selector_is_configuration_error() {
    let backend = RecordingBackend::default();
    let err = GenericRegrid::<f64>::new(
        small_grid(),
        small_grid(),
        RegridMethod::Linear,
        "foo",
        &backend,
        Options::new(),
    )
    .err()
    .expect("'foo' is not an engine");
    assert!(matches!(err, CfRegridError::UnsupportedTool { ref tool } if tool == "foo"));
    assert!(err.is_configuration());
    assert!(backend.calls.borrow().is_empty());
}

#[test]
fn test_grid_dimension_mismatch() {
    let backend = RecordingBackend::default();
    let one_d = GridSpec::new(vec![Array::from_vec(axis(0.0, 1.0, 5)).into_dyn()]);
    let err = GenericRegrid::<f64>::new(
        small_grid(),
        one_d,
        RegridMethod::Linear,
        "esmf",
        &backend,
        Options::new(),
    )
    .err()
    .expect("2-D source and 1-D destination");
    assert!(matches!(err, CfRegridError::GridDimMismatch { src: 2, dst: 1 }));
    assert!(backend.calls.borrow().is_empty());
}

#[test]
fn test_method_parsing() {
    assert_eq!("conserve".parse::<RegridMethod>().unwrap(), RegridMethod::Conservative);
    assert_eq!("Bilinear".parse::<RegridMethod>().unwrap(), RegridMethod::Linear);
    assert_eq!("patch".parse::<RegridMethod>().unwrap(), RegridMethod::Patch);
    assert!("nearest".parse::<RegridMethod>().unwrap_err().is_configuration());
}

#[test]
fn test_esmf_options_are_consumed() {
    let backend = RecordingBackend::default();
    let mut options = Options::new();
    options.insert("staggerLoc".into(), json!("center"));
    options.insert("coordSys".into(), json!("rad"));
    options.insert("periodicity".into(), json!(0));
    options.insert("regridMethod".into(), json!("keep me"));

    let global = small_grid().with_rectilinear_bounds(&axis(-45.0, 30.0, 4), &axis(-45.0, 90.0, 5));
    GenericRegrid::<f64>::new(
        global,
        small_grid(),
        RegridMethod::Conservative,
        "esmf",
        &backend,
        options,
    )
    .expect("valid options");

    let setups = backend.esmf_setups.borrow();
    let setup = &setups[0];
    assert_eq!(setup.stagger, StaggerLocation::Center);
    assert_eq!(setup.coord_sys, CoordSystem::Radians);
    assert_eq!(setup.method, RegridMethod::Conservative);
    // Explicit periodicity wins over the guess from global bounds
    assert!(!setup.periodic);
    assert_eq!(setup.options.len(), 1);
    assert!(setup.options.contains_key("regridMethod"));
}

#[test]
fn test_esmf_periodicity_guessed_from_bounds() {
    let backend = RecordingBackend::default();
    let global = small_grid().with_rectilinear_bounds(&axis(-45.0, 30.0, 4), &axis(-45.0, 90.0, 5));
    let regional = small_grid().with_rectilinear_bounds(&axis(-45.0, 30.0, 4), &axis(-5.0, 10.0, 5));
    for src in [global, regional, small_grid()] {
        GenericRegrid::<f64>::new(
            src,
            small_grid(),
            RegridMethod::Linear,
            "esmf",
            &backend,
            Options::new(),
        )
        .expect("valid grids");
    }
    let periodic: Vec<bool> = backend.esmf_setups.borrow().iter().map(|s| s.periodic).collect();
    assert_eq!(periodic, vec![true, false, false]);
}

#[test]
fn test_libcf_options_are_consumed() {
    let backend = RecordingBackend::default();
    let mut options = Options::new();
    options.insert("mkCyclic".into(), json!(true));
    options.insert("handleCut".into(), json!(1));
    GenericRegrid::<f64>::new(
        small_grid(),
        small_grid(),
        RegridMethod::Linear,
        "libcf",
        &backend,
        options,
    )
    .expect("valid options");

    let setups = backend.libcf_setups.borrow();
    assert!(setups[0].mk_cyclic);
    assert!(setups[0].handle_cut);
    assert!(setups[0].options.is_empty());
}

#[test]
fn test_bad_option_value_is_configuration_error() {
    let mut options = Options::new();
    options.insert("coordSys".into(), json!("polar"));
    let err = GenericRegrid::<f64>::new(
        small_grid(),
        small_grid(),
        RegridMethod::Linear,
        "esmf",
        &RecordingBackend::default(),
        options,
    )
    .err()
    .expect("unknown coordinate system");
    assert!(err.is_configuration());
}

#[test]
fn test_guess_periodicity() {
    let global = vec![
        Array::from_shape_fn((3, 5), |(i, _)| -90.0 + 60.0 * i as f64).into_dyn(),
        Array::from_shape_fn((3, 5), |(_, j)| 90.0 * j as f64).into_dyn(),
    ];
    assert!(guess_periodicity(Some(global.as_slice())));

    let regional = vec![
        Array::from_shape_fn((3, 5), |(i, _)| 30.0 + 5.0 * i as f64).into_dyn(),
        Array::from_shape_fn((3, 5), |(_, j)| 10.0 * j as f64).into_dyn(),
    ];
    assert!(!guess_periodicity(Some(regional.as_slice())));
    assert!(!guess_periodicity(None));
}

#[test]
fn test_apply_before_compute_weights() {
    let mut regrid = GenericRegrid::<f64>::new(
        small_grid(),
        small_grid(),
        RegridMethod::Linear,
        "esmf",
        &RecordingBackend::default(),
        Options::new(),
    )
    .expect("valid setup");

    let src = ArrayD::<f64>::ones(IxDyn(&[3, 4]));
    let mut dst = ArrayD::<f64>::from_elem(IxDyn(&[3, 4]), 7.0);
    let err = regrid
        .apply(src.view(), dst.view_mut(), None, None, &Options::new())
        .expect_err("weights not computed");
    assert!(matches!(err, CfRegridError::WeightsNotComputed));
    assert!(dst.iter().all(|&v| v == 7.0));

    regrid.compute_weights(&Options::new()).expect("weights");
    assert_eq!(regrid.state(), SessionState::WeightsComputed);
    let again = regrid.compute_weights(&Options::new()).expect_err("computed twice");
    assert!(matches!(again, CfRegridError::WeightsAlreadyComputed));
}

#[test]
fn test_shape_mismatch_leaves_destination_untouched() {
    let backend = RecordingBackend::default();
    let mut regrid = GenericRegrid::<f64>::new(
        small_grid(),
        small_grid(),
        RegridMethod::Linear,
        "esmf",
        &backend,
        Options::new(),
    )
    .expect("valid setup");
    regrid.compute_weights(&Options::new()).expect("weights");

    let mut dst = ArrayD::<f64>::from_elem(IxDyn(&[2, 3, 4]), 7.0);

    let wrong_horizontal = ArrayD::<f64>::ones(IxDyn(&[2, 4, 3]));
    let err = regrid
        .apply(wrong_horizontal.view(), dst.view_mut(), None, Some(MISSING), &Options::new())
        .expect_err("transposed source");
    assert!(matches!(err, CfRegridError::ShapeMismatch { .. }));

    let wrong_leading = ArrayD::<f64>::ones(IxDyn(&[5, 3, 4]));
    let err = regrid
        .apply(wrong_leading.view(), dst.view_mut(), None, Some(MISSING), &Options::new())
        .expect_err("leading axes differ");
    assert!(matches!(err, CfRegridError::ShapeMismatch { .. }));

    let too_small = ArrayD::<f64>::ones(IxDyn(&[4]));
    let err = regrid
        .apply(too_small.view(), dst.view_mut(), None, None, &Options::new())
        .expect_err("1-D source");
    assert!(matches!(err, CfRegridError::ShapeMismatch { .. }));

    assert!(dst.iter().all(|&v| v == 7.0));
    assert!(backend.root_pes.borrow().is_empty());
}

#[test]
fn test_root_pe_reaches_every_engine_call() {
    let backend = RecordingBackend::default();
    let mut regrid = GenericRegrid::<f64>::new(
        small_grid(),
        small_grid(),
        RegridMethod::Linear,
        "libcf",
        &backend,
        Options::new(),
    )
    .expect("valid setup");
    regrid.compute_weights(&Options::new()).expect("weights");

    let src = ArrayD::<f64>::ones(IxDyn(&[2, 3, 4]));
    let mut dst = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
    regrid
        .apply(src.view(), dst.view_mut(), Some(3), Some(MISSING), &Options::new())
        .expect("apply");

    // Mask and data pass for each of the two planes
    assert_eq!(*backend.root_pes.borrow(), vec![Some(3); 4]);
    assert!(dst.iter().all(|&v| v == 1.0));
}

#[test]
fn test_missing_values_with_copy_engine() {
    let backend = RecordingBackend::default();
    let mut regrid = GenericRegrid::<f64>::new(
        small_grid(),
        small_grid(),
        RegridMethod::Linear,
        "esmf",
        &backend,
        Options::new(),
    )
    .expect("valid setup");
    regrid.compute_weights(&Options::new()).expect("weights");

    let mut src = ArrayD::<f64>::from_elem(IxDyn(&[3, 4]), 4.0);
    src[[1, 2].as_slice()] = MISSING;
    let mut dst = ArrayD::<f64>::zeros(IxDyn(&[3, 4]));
    regrid
        .apply(src.view(), dst.view_mut(), None, Some(MISSING), &Options::new())
        .expect("apply");
    assert_eq!(dst, src);
}

#[test]
fn test_idempotent_apply() {
    let src_grid = fine_global_grid();
    let field = smooth_field(&src_grid);
    let mut regrid = session(
        src_grid,
        coarse_global_grid(),
        RegridMethod::Linear,
        "esmf",
        Options::new(),
    );

    let mut first = ArrayD::<f64>::zeros(IxDyn(&[2, 4]));
    let mut second = ArrayD::<f64>::zeros(IxDyn(&[2, 4]));
    regrid
        .apply(field.view(), first.view_mut(), None, None, &Options::new())
        .expect("first apply");
    regrid
        .apply(field.view(), second.view_mut(), None, None, &Options::new())
        .expect("second apply");
    assert_eq!(first, second);
}

#[test]
fn test_extra_dimensions_match_plane_by_plane() {
    let src_grid = fine_global_grid();
    let base = smooth_field(&src_grid);
    let nt = 3;
    let mut stack = ArrayD::<f64>::zeros(IxDyn(&[nt, 4, 8]));
    for (t, mut plane) in stack.axis_iter_mut(Axis(0)).enumerate() {
        plane.assign(&base.mapv(|v| v * (t + 1) as f64));
    }
    stack[[1, 0, 0].as_slice()] = MISSING;
    stack[[1, 0, 1].as_slice()] = MISSING;
    stack[[1, 1, 0].as_slice()] = MISSING;
    stack[[1, 1, 1].as_slice()] = MISSING;
    stack[[2, 3, 5].as_slice()] = MISSING;

    for method in [RegridMethod::Conservative, RegridMethod::Linear] {
        let mut regrid = session(
            fine_global_grid(),
            coarse_global_grid(),
            method,
            "esmf",
            Options::new(),
        );

        let mut together = ArrayD::<f64>::zeros(IxDyn(&[nt, 2, 4]));
        regrid
            .apply(stack.view(), together.view_mut(), None, Some(MISSING), &Options::new())
            .expect("stacked apply");

        for t in 0..nt {
            let mut single = ArrayD::<f64>::zeros(IxDyn(&[2, 4]));
            regrid
                .apply(
                    stack.index_axis(Axis(0), t),
                    single.view_mut(),
                    None,
                    Some(MISSING),
                    &Options::new(),
                )
                .expect("plane apply");
            let stacked = together.index_axis(Axis(0), t);
            for (a, b) in stacked.iter().zip(single.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}

#[test]
fn test_conservative_masking() {
    let mut regrid = session(
        fine_global_grid(),
        coarse_global_grid(),
        RegridMethod::Conservative,
        "esmf",
        Options::new(),
    );

    let mut src = ArrayD::<f64>::from_elem(IxDyn(&[4, 8]), 5.0);
    // Every fine cell under coarse cell (0, 0)
    for (i, j) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        src[[i, j].as_slice()] = MISSING;
    }
    // One of the four fine cells under coarse cell (1, 2)
    src[[2, 4].as_slice()] = MISSING;

    let mut dst = ArrayD::<f64>::zeros(IxDyn(&[2, 4]));
    regrid
        .apply(src.view(), dst.view_mut(), None, Some(MISSING), &Options::new())
        .expect("apply");

    for ((k, l), &v) in dst.view().into_dimensionality::<ndarray::Ix2>().unwrap().indexed_iter() {
        match (k, l) {
            (0, 0) => assert_eq!(v, MISSING),
            (1, 2) => {
                assert_ne!(v, MISSING);
                assert!(v > 0.0 && v < 5.0, "partly missing cell is diluted, got {v}");
            }
            _ => assert!((v - 5.0).abs() < 1e-10, "cell ({k}, {l}) = {v}"),
        }
    }
}

#[test]
fn test_conservative_mask_threshold_is_exclusive() {
    let at_threshold = 1.0 - MASK_EPS;
    let cases = [
        (at_threshold, false),
        (1.0 - 0.5 * MASK_EPS, true),
        (1.0, true),
        (0.5, false),
    ];
    for (mask, masked) in cases {
        let backend = ConstantBackend { mask, data: 3.0 };
        let mut regrid = GenericRegrid::<f64>::new(
            small_grid(),
            GridSpec::rectilinear(&[-15.0, 15.0], &[45.0, 135.0]),
            RegridMethod::Conservative,
            "esmf",
            &backend,
            Options::new(),
        )
        .expect("valid setup");
        regrid.compute_weights(&Options::new()).expect("weights");

        let src = ArrayD::<f64>::from_elem(IxDyn(&[3, 4]), 1.0);
        let mut dst = ArrayD::<f64>::zeros(IxDyn(&[2, 2]));
        regrid
            .apply(src.view(), dst.view_mut(), None, Some(MISSING), &Options::new())
            .expect("apply");

        let expected = if masked { MISSING } else { 3.0 };
        assert!(
            dst.iter().all(|&v| v == expected),
            "mask fraction {mask}: got {dst:?}"
        );
    }
}

#[test]
fn test_linear_mask_threshold() {
    for (mask, expected) in [(0.0, 3.0), (1.0e-12, MISSING)] {
        let backend = ConstantBackend { mask, data: 3.0 };
        let mut regrid = GenericRegrid::<f64>::new(
            small_grid(),
            small_grid(),
            RegridMethod::Linear,
            "libcf",
            &backend,
            Options::new(),
        )
        .expect("valid setup");
        regrid.compute_weights(&Options::new()).expect("weights");

        let src = ArrayD::<f64>::from_elem(IxDyn(&[3, 4]), 1.0);
        let mut dst = ArrayD::<f64>::zeros(IxDyn(&[3, 4]));
        regrid
            .apply(src.view(), dst.view_mut(), None, Some(MISSING), &Options::new())
            .expect("apply");
        assert!(dst.iter().all(|&v| v == expected));
    }
}

#[test]
fn test_linear_masking() {
    let src_grid = GridSpec::rectilinear(&axis(-60.0, 30.0, 5), &axis(0.0, 45.0, 8));
    let dst_grid = GridSpec::rectilinear(&axis(-45.0, 30.0, 4), &axis(22.5, 45.0, 8));
    let mut options = Options::new();
    options.insert("periodicity".into(), json!(true));
    let mut regrid = session(src_grid, dst_grid, RegridMethod::Linear, "esmf", options);

    let mut src = ArrayD::<f64>::from_elem(IxDyn(&[5, 8]), 1.0);
    src[[1, 1].as_slice()] = MISSING;

    let mut dst = ArrayD::<f64>::zeros(IxDyn(&[4, 8]));
    regrid
        .apply(src.view(), dst.view_mut(), None, Some(MISSING), &Options::new())
        .expect("apply");

    let missing: Vec<(usize, usize)> = dst
        .view()
        .into_dimensionality::<ndarray::Ix2>()
        .unwrap()
        .indexed_iter()
        .filter(|(_, v)| **v == MISSING)
        .map(|(idx, _)| idx)
        .collect();
    assert_eq!(missing, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    assert!(dst.iter().filter(|&&v| v != MISSING).all(|&v| (v - 1.0).abs() < 1e-12));
}

#[test]
fn test_round_trip_preserves_mean() {
    let grid_a = GridSpec::rectilinear(&axis(-80.0, 10.0, 17), &axis(0.0, 10.0, 36));
    let grid_b = GridSpec::rectilinear(&axis(-75.0, 10.0, 16), &axis(5.0, 10.0, 36));
    let field = smooth_field(&grid_a);

    let mut periodic = Options::new();
    periodic.insert("periodicity".into(), json!(true));
    let mut forward = session(
        grid_a.clone(),
        grid_b.clone(),
        RegridMethod::Linear,
        "esmf",
        periodic.clone(),
    );
    let mut backward = session(grid_b, grid_a, RegridMethod::Linear, "esmf", periodic);

    let mut on_b = ArrayD::<f64>::from_elem(IxDyn(&[16, 36]), f64::NAN);
    forward
        .apply(field.view(), on_b.view_mut(), None, None, &Options::new())
        .expect("forward");
    assert!(on_b.iter().all(|v| v.is_finite()));

    let mut back = ArrayD::<f64>::from_elem(IxDyn(&[17, 36]), f64::NAN);
    backward
        .apply(on_b.view(), back.view_mut(), None, None, &Options::new())
        .expect("backward");

    let (mut original, mut round_trip, mut n) = (0.0, 0.0, 0.0);
    for (&a, &b) in field.iter().zip(back.iter()) {
        if b.is_finite() {
            original += a;
            round_trip += b;
            n += 1.0;
        }
    }
    assert!(n > 0.0);
    assert!((original / n - round_trip / n).abs() < 0.02);
}

#[test]
fn test_conservative_preserves_integral() {
    let src_grid = fine_global_grid();
    let field = smooth_field(&src_grid);
    let mut regrid = session(
        src_grid,
        coarse_global_grid(),
        RegridMethod::Conservative,
        "esmf",
        Options::new(),
    );
    let mut dst = ArrayD::<f64>::zeros(IxDyn(&[2, 4]));
    regrid
        .apply(field.view(), dst.view_mut(), None, None, &Options::new())
        .expect("apply");

    let mut diag: Diagnostics = ["srcAreas", "dstAreas", "dstAreaFractions"]
        .iter()
        .map(|k| (k.to_string(), ArrayD::zeros(IxDyn(&[0]))))
        .collect();
    regrid.fill_in_diagnostic_data(&mut diag, None).expect("diagnostics");

    let src_areas = &diag["srcAreas"];
    let dst_areas = &diag["dstAreas"];
    assert_eq!(src_areas.shape(), &[4, 8]);
    assert!((src_areas.sum() - 4.0 * std::f64::consts::PI).abs() < 1e-9);
    assert!(diag["dstAreaFractions"].iter().all(|f| (f - 1.0).abs() < 1e-12));
    assert!(!diag.contains_key("srcAreaFractions"));

    let src_integral: f64 = field.iter().zip(src_areas.iter()).map(|(v, a)| v * a).sum();
    let dst_integral: f64 = dst.iter().zip(dst_areas.iter()).map(|(v, a)| v * a).sum();
    assert!((src_integral - dst_integral).abs() < 1e-9);
}

#[test]
fn test_libcf_native_engine() {
    let src_grid = GridSpec::rectilinear(&axis(-60.0, 30.0, 5), &axis(0.0, 45.0, 8));
    let dst_grid = GridSpec::rectilinear(&axis(-50.0, 20.0, 6), &axis(10.0, 45.0, 8));
    let dst_lat = dst_grid.coords[0].clone();
    let mut options = Options::new();
    options.insert("mkCyclic".into(), json!(true));
    let mut regrid = session(src_grid.clone(), dst_grid, RegridMethod::Linear, "libcf", options);

    // Linear in latitude, so bilinear interpolation is exact
    let field = src_grid.coords[0].clone();
    let mut dst = ArrayD::<f64>::zeros(IxDyn(&[6, 8]));
    regrid
        .apply(field.view(), dst.view_mut(), None, None, &Options::new())
        .expect("apply");
    for (v, lat) in dst.iter().zip(dst_lat.iter()) {
        assert!((v - lat).abs() < 1e-9);
    }

    let mut diag: Diagnostics = ["numValid", "numDstPoints"]
        .iter()
        .map(|k| (k.to_string(), ArrayD::zeros(IxDyn(&[0]))))
        .collect();
    regrid.fill_in_diagnostic_data(&mut diag, None).expect("diagnostics");
    assert_eq!(diag["numDstPoints"].sum(), 48.0);
    assert_eq!(diag["numValid"].sum(), 48.0);
}

#[test]
fn test_single_precision_fields() {
    let mut regrid = GenericRegrid::<f32>::new(
        fine_global_grid(),
        coarse_global_grid(),
        RegridMethod::Conservative,
        "esmf",
        &NativeBackend::new(),
        Options::new(),
    )
    .expect("valid setup");
    regrid.compute_weights(&Options::new()).expect("weights");

    let src = ArrayD::<f32>::from_elem(IxDyn(&[4, 8]), 3.0);
    let mut dst = ArrayD::<f32>::zeros(IxDyn(&[2, 4]));
    regrid
        .apply(src.view(), dst.view_mut(), None, Some(1.0e20), &Options::new())
        .expect("apply");
    assert!(dst.iter().all(|&v| (v - 3.0).abs() < 1e-5));
}

#[test]
fn test_native_engine_limits() {
    let patch = GenericRegrid::<f64>::new(
        fine_global_grid(),
        coarse_global_grid(),
        RegridMethod::Patch,
        "esmf",
        &NativeBackend::new(),
        Options::new(),
    );
    assert!(patch.err().expect("patch unsupported").is_configuration());

    let mut corner = Options::new();
    corner.insert("staggerLoc".into(), json!("corner"));
    let staggered = GenericRegrid::<f64>::new(
        fine_global_grid(),
        coarse_global_grid(),
        RegridMethod::Linear,
        "esmf",
        &NativeBackend::new(),
        corner,
    );
    assert!(staggered.err().expect("corner unsupported").is_configuration());

    let mut curvilinear = fine_global_grid();
    curvilinear.coords[0][[0, 3].as_slice()] += 1.0;
    let skewed = GenericRegrid::<f64>::new(
        curvilinear,
        coarse_global_grid(),
        RegridMethod::Linear,
        "libcf",
        &NativeBackend::new(),
        Options::new(),
    );
    assert!(skewed.err().expect("curvilinear unsupported").is_configuration());
}
