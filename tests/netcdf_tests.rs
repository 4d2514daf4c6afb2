use cf_regrid::conventions::get_dataset_convention;
use cf_regrid::metadata::classify_variables;
use cf_regrid::netcdf_io::{
    attribute_to_string, horizontal_coordinates, load_variable_dict, missing_value, read_grid,
    read_variable, NetCDFWriter,
};
use cf_regrid::regrid::{GenericRegrid, NativeBackend, Options, RegridMethod};
use ndarray::{ArrayD, IxDyn};
use netcdf::{create, open};
use std::path::Path;
use tempfile::tempdir;

const FILL: f64 = -999.0;

/// Write a small CF file: `ta(time, lat, lon)` on a 3x4 grid with cell bounds
fn create_source_file(path: &Path) {
    let mut file = create(path).expect("Failed to create NetCDF file");

    file.add_dimension("time", 2).expect("Failed to add dimension time");
    file.add_dimension("lat", 3).expect("Failed to add dimension lat");
    file.add_dimension("lon", 4).expect("Failed to add dimension lon");
    file.add_dimension("nv", 2).expect("Failed to add dimension nv");

    {
        let mut time = file
            .add_variable::<f64>("time", &["time"])
            .expect("Failed to add time");
        time.put_attribute("units", "days since 2000-01-01")
            .expect("Failed to add units");
        time.put_values(&[0.0, 1.0], ..).expect("Failed to write time");
    }
    {
        let mut lat = file
            .add_variable::<f64>("lat", &["lat"])
            .expect("Failed to add lat");
        lat.put_attribute("units", "degrees_north").expect("Failed to add units");
        lat.put_attribute("bounds", "lat_bnds").expect("Failed to add bounds");
        lat.put_values(&[-60.0, 0.0, 60.0], ..).expect("Failed to write lat");
    }
    {
        let mut lat_bnds = file
            .add_variable::<f64>("lat_bnds", &["lat", "nv"])
            .expect("Failed to add lat_bnds");
        lat_bnds
            .put_values(&[-90.0, -30.0, -30.0, 30.0, 30.0, 90.0], ..)
            .expect("Failed to write lat_bnds");
    }
    {
        let mut lon = file
            .add_variable::<f64>("lon", &["lon"])
            .expect("Failed to add lon");
        lon.put_attribute("units", "degrees_east").expect("Failed to add units");
        lon.put_attribute("bounds", "lon_bnds").expect("Failed to add bounds");
        lon.put_values(&[45.0, 135.0, 225.0, 315.0], ..)
            .expect("Failed to write lon");
    }
    {
        let mut lon_bnds = file
            .add_variable::<f64>("lon_bnds", &["lon", "nv"])
            .expect("Failed to add lon_bnds");
        lon_bnds
            .put_values(&[0.0, 90.0, 90.0, 180.0, 180.0, 270.0, 270.0, 360.0], ..)
            .expect("Failed to write lon_bnds");
    }
    {
        let mut ta = file
            .add_variable::<f64>("ta", &["time", "lat", "lon"])
            .expect("Failed to add ta");
        ta.put_attribute("_FillValue", FILL).expect("Failed to add _FillValue");
        ta.put_attribute("units", "K").expect("Failed to add units");
        ta.put_attribute("long_name", "air temperature")
            .expect("Failed to add long_name");
        let mut values: Vec<f64> = (0..24).map(|i| 250.0 + i as f64).collect();
        values[5] = FILL;
        ta.put_values(&values, ..).expect("Failed to write ta");
    }
}

/// Write a 2x2 target grid covering the globe, with a `tas(lat, lon)` template
fn create_target_file(path: &Path) {
    let mut file = create(path).expect("Failed to create NetCDF file");

    file.add_dimension("lat", 2).expect("Failed to add dimension lat");
    file.add_dimension("lon", 2).expect("Failed to add dimension lon");

    {
        let mut lat = file
            .add_variable::<f64>("lat", &["lat"])
            .expect("Failed to add lat");
        lat.put_attribute("units", "degrees_north").expect("Failed to add units");
        lat.put_values(&[-45.0, 45.0], ..).expect("Failed to write lat");
    }
    {
        let mut lon = file
            .add_variable::<f64>("lon", &["lon"])
            .expect("Failed to add lon");
        lon.put_attribute("units", "degrees_east").expect("Failed to add units");
        lon.put_values(&[90.0, 270.0], ..).expect("Failed to write lon");
    }
    {
        let mut tas = file
            .add_variable::<f64>("tas", &["lat", "lon"])
            .expect("Failed to add tas");
        tas.put_values(&[0.0; 4], ..).expect("Failed to write tas");
    }
}

#[test]
fn test_load_variable_dict() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("source.nc");
    create_source_file(&path);

    let file = open(&path).expect("Failed to open NetCDF file");
    let dict = load_variable_dict(&file, "source").expect("Failed to load metadata");

    assert_eq!(dict.id(), "source");
    assert_eq!(dict.len(), 6);

    for coord in ["time", "lat", "lon"] {
        assert!(dict.get(coord).unwrap().is_coordinate, "{coord} is a coordinate");
    }
    let ta = dict.get("ta").unwrap();
    assert!(!ta.is_coordinate);
    assert_eq!(ta.dimensions, vec!["time", "lat", "lon"]);
    assert_eq!(ta.shape, vec![2, 3, 4]);
    assert_eq!(ta.attributes.get("units").map(String::as_str), Some("K"));
    assert_eq!(missing_value(ta), Some(FILL));
    assert_eq!(missing_value(dict.get("lat").unwrap()), None);
}

#[test]
fn test_classify_variables_from_file() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("source.nc");
    create_source_file(&path);

    let file = open(&path).expect("Failed to open NetCDF file");
    let dict = load_variable_dict(&file, "source").expect("Failed to load metadata");
    let convention = get_dataset_convention(&dict);

    let roles = classify_variables(&dict, &convention).expect("Failed to classify");
    let ta = roles.iter().find(|r| r.name == "ta").unwrap();
    assert_eq!(ta.latitude.as_deref(), Some("lat"));
    assert_eq!(ta.longitude.as_deref(), Some("lon"));
    assert!(!ta.is_axis);

    let lat = roles.iter().find(|r| r.name == "lat").unwrap();
    assert!(lat.is_axis);
    assert_eq!(lat.bounds.as_deref(), Some("lat_bnds"));

    assert_eq!(
        horizontal_coordinates(&dict, &convention, "ta").unwrap(),
        ("lat".to_string(), "lon".to_string())
    );
    assert!(horizontal_coordinates(&dict, &convention, "time")
        .unwrap_err()
        .is_configuration());
}

#[test]
fn test_read_grid_with_bounds() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("source.nc");
    create_source_file(&path);

    let file = open(&path).expect("Failed to open NetCDF file");
    let dict = load_variable_dict(&file, "source").expect("Failed to load metadata");
    let convention = get_dataset_convention(&dict);

    let grid = read_grid(&file, &dict, &convention, "ta").expect("Failed to read grid");
    assert_eq!(grid.ndim(), 2);
    assert_eq!(grid.shape(), &[3, 4]);
    assert_eq!(grid.coords[0][[2, 1].as_slice()], 60.0);
    assert_eq!(grid.coords[1][[0, 3].as_slice()], 315.0);

    let bounds = grid.bounds.as_ref().expect("bounds from lat_bnds/lon_bnds");
    assert_eq!(bounds[0].shape(), &[4, 5]);
    assert_eq!(bounds[0][[3, 0].as_slice()], 90.0);
    assert_eq!(bounds[1][[0, 4].as_slice()], 360.0);

    let ta = read_variable(&file, "ta").expect("Failed to read ta");
    assert_eq!(ta.shape(), &[2, 3, 4]);
    assert_eq!(ta[[0, 1, 1].as_slice()], FILL);
}

#[test]
fn test_regrid_and_write() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let src_path = temp_dir.path().join("source.nc");
    let dst_path = temp_dir.path().join("target.nc");
    let out_path = temp_dir.path().join("out.nc");
    create_source_file(&src_path);
    create_target_file(&dst_path);

    let source = open(&src_path).expect("Failed to open source");
    let target = open(&dst_path).expect("Failed to open target");
    let src_dict = load_variable_dict(&source, "source").expect("source metadata");
    let dst_dict = load_variable_dict(&target, "target").expect("target metadata");
    let src_conv = get_dataset_convention(&src_dict);
    let dst_conv = get_dataset_convention(&dst_dict);

    let src_grid = read_grid(&source, &src_dict, &src_conv, "ta").expect("source grid");
    let dst_grid = read_grid(&target, &dst_dict, &dst_conv, "tas").expect("target grid");

    let mut session = GenericRegrid::<f64>::new(
        src_grid,
        dst_grid,
        RegridMethod::Conservative,
        "esmf",
        &NativeBackend::new(),
        Options::new(),
    )
    .expect("Failed to create session");
    session.compute_weights(&Options::new()).expect("weights");

    let data = read_variable(&source, "ta").expect("Failed to read ta");
    let mut result = ArrayD::<f64>::zeros(IxDyn(&[2, 2, 2]));
    session
        .apply(data.view(), result.view_mut(), None, Some(FILL), &Options::new())
        .expect("Failed to regrid");
    assert!(result.iter().all(|&v| v != FILL && v.is_finite()));
    // The second time step has no missing values, so every cell averages it
    assert!(result
        .index_axis(ndarray::Axis(0), 1)
        .iter()
        .all(|&v| v > 262.0 && v < 274.0));

    let dims: Vec<String> = ["time", "lat", "lon"].iter().map(|s| s.to_string()).collect();
    let horizontal = vec!["lat".to_string(), "lon".to_string()];
    NetCDFWriter::new(&source, &target, &out_path)
        .write_result(&result, &dims, "ta", "ta", &horizontal, Some(FILL))
        .expect("Failed to write result");

    let out = open(&out_path).expect("Failed to open output");
    let lat = read_variable(&out, "lat").expect("lat copied from target");
    assert_eq!(lat.iter().copied().collect::<Vec<_>>(), vec![-45.0, 45.0]);
    let time = read_variable(&out, "time").expect("time copied from source");
    assert_eq!(time.iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0]);
    assert!(out.variable("lat_bnds").is_none());

    let written = read_variable(&out, "ta").expect("ta written");
    assert_eq!(written, result);

    let out_dict = load_variable_dict(&out, "out").expect("output metadata");
    let ta = out_dict.get("ta").unwrap();
    assert_eq!(ta.attributes.get("units").map(String::as_str), Some("K"));
    assert_eq!(missing_value(ta), Some(FILL));

    let conventions = out
        .attribute("Conventions")
        .and_then(|a| a.value().ok())
        .and_then(|v| attribute_to_string(&v));
    assert_eq!(conventions.as_deref(), Some("CF-1.0"));
}
