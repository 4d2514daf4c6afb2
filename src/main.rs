//! Entry point for the cf_regrid application.
//! Handles CLI parsing, file loading, and dispatches convention reports or regridding.

use cf_regrid::conventions::{get_dataset_convention, Convention, VariableDict};
use cf_regrid::errors::CfRegridError;
use cf_regrid::metadata::{describe_variable, print_axes};
use cf_regrid::netcdf_io::{
    horizontal_coordinates, load_variable_dict, missing_value, read_grid, read_variable,
    NetCDFWriter,
};
use cf_regrid::parallel::ParallelConfig;
use cf_regrid::regrid::{Diagnostics, GenericRegrid, NativeBackend, Options, RegridTool};
use clap::Parser;
use ndarray::{ArrayD, IxDyn};
use netcdf::{open, File};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::Args;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let parallel = match args.threads {
        Some(n) => ParallelConfig::new(Some(n)),
        None => ParallelConfig::all_cores(),
    };
    parallel.setup_global_pool()?;

    let file = open(&args.file)?;
    println!("Successfully opened NetCDF file: {}", args.file.display());

    let dict = load_variable_dict(&file, &args.file.display().to_string())?;
    let convention = get_dataset_convention(&dict);

    let mut did_something = false;
    if args.list_axes {
        print_axes(&dict, &convention)?;
        did_something = true;
    }
    if let Some(var) = &args.describe {
        describe_variable(&dict, &convention, var)?;
        did_something = true;
    }
    if let Some(var) = &args.regrid {
        regrid_variable(&args, &file, &dict, &convention, var)?;
        did_something = true;
    }
    if !did_something {
        print_axes(&dict, &convention)?;
    }

    Ok(())
}

fn regrid_variable(
    args: &Args,
    file: &File,
    dict: &VariableDict,
    convention: &Convention,
    var_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let target_path = args
        .target
        .as_ref()
        .ok_or_else(|| CfRegridError::configuration("--regrid needs a --target file"))?;
    let target = open(target_path)?;
    let target_dict = load_variable_dict(&target, &target_path.display().to_string())?;
    let target_convention = get_dataset_convention(&target_dict);
    let target_var = args.target_var.as_deref().unwrap_or(var_name);

    let src_grid = read_grid(file, dict, convention, var_name)?;
    let dst_grid = read_grid(&target, &target_dict, &target_convention, target_var)?;
    let n_grid_dims = src_grid.ndim();

    let meta = dict
        .get(var_name)
        .ok_or_else(|| CfRegridError::VariableNotFound {
            var: var_name.to_string(),
        })?;
    let target_meta = target_dict
        .get(target_var)
        .ok_or_else(|| CfRegridError::VariableNotFound {
            var: target_var.to_string(),
        })?;
    if meta.dimensions.len() < n_grid_dims || target_meta.dimensions.len() < n_grid_dims {
        return Err(CfRegridError::configuration(format!(
            "'{var_name}' and '{target_var}' need at least {n_grid_dims} dimensions"
        ))
        .into());
    }

    let data = read_variable(file, var_name)?;
    let missing = args.missing_value.or_else(|| missing_value(meta));

    let mut session = GenericRegrid::<f64>::new(
        src_grid,
        dst_grid,
        args.method,
        &args.tool,
        &NativeBackend::new(),
        args.engine_options(),
    )?;
    session.compute_weights(&Options::new())?;

    let lead_dims = &meta.dimensions[..meta.dimensions.len() - n_grid_dims];
    let horiz_dims = &target_meta.dimensions[target_meta.dimensions.len() - n_grid_dims..];
    let mut shape: Vec<usize> = data.shape()[..lead_dims.len()].to_vec();
    shape.extend_from_slice(&target_meta.shape[target_meta.shape.len() - n_grid_dims..]);

    let mut result = ArrayD::from_elem(IxDyn(&shape), missing.unwrap_or(f64::NAN));
    session.apply(data.view(), result.view_mut(), None, missing, &Options::new())?;
    info!(var = var_name, ?shape, "field regridded");

    if args.diagnostics {
        print_diagnostics(&session)?;
    }

    match &args.output {
        Some(output_path) => {
            let dim_names: Vec<String> = lead_dims.iter().chain(horiz_dims).cloned().collect();
            let (lat, lon) = horizontal_coordinates(&target_dict, &target_convention, target_var)?;
            let writer = NetCDFWriter::new(file, &target, output_path);
            writer.write_result(&result, &dim_names, var_name, var_name, &[lat, lon], missing)?;
            println!("✅ Saved result to {}", output_path.display());
        }
        None => print_field_summary(var_name, &result, missing),
    }

    Ok(())
}

fn print_diagnostics(session: &GenericRegrid<f64>) -> Result<(), CfRegridError> {
    let keys: &[&str] = match session.tool() {
        RegridTool::Esmf => &["srcAreas", "dstAreas", "srcAreaFractions", "dstAreaFractions"],
        RegridTool::LibCf => &["numValid", "numDstPoints"],
    };
    let mut diag: Diagnostics = keys
        .iter()
        .map(|k| (k.to_string(), ArrayD::zeros(IxDyn(&[0]))))
        .collect();
    session.fill_in_diagnostic_data(&mut diag, None)?;

    println!("\n Diagnostics ({})", session.tool().as_str());
    println!("================");
    for key in keys {
        if let Some(field) = diag.get(*key) {
            println!("    {}: shape {:?}, sum {:.6}", key, field.shape(), field.sum());
        }
    }
    Ok(())
}

fn print_field_summary(var_name: &str, field: &ArrayD<f64>, missing: Option<f64>) {
    let valid: Vec<f64> = field
        .iter()
        .copied()
        .filter(|v| v.is_finite() && Some(*v) != missing)
        .collect();

    println!("\n Regridded Variable: {}", var_name);
    println!("==============================");
    println!(
        " Shape: ({})",
        field
            .shape()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" × ")
    );
    if valid.is_empty() {
        println!("\n⚠ No valid data after regridding");
        return;
    }
    let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    println!("    Min: {:.4}", min);
    println!("    Max: {:.4}", max);
    println!("    Mean: {:.4}", mean);
    println!("    Valid elements: {} / {}", valid.len(), field.len());
    println!("\n💡 Tip: Use --output <file.nc> to save the regridded field");
}
