//! Command-line interface options for the cf_regrid tool.

use cf_regrid::regrid::{Options, RegridMethod};
use clap::Parser;
use serde_json::Value as JsonValue;
use std::path::PathBuf;

/// Inspect CF metadata and regrid NetCDF fields
#[derive(Parser, Debug)]
#[command(
    version,
    name = "cf_regrid",
    about = "Classify CF/COARDS coordinates and regrid NetCDF variables"
)]
pub struct Args {
    /// Path to the NetCDF file
    #[arg(short, long)]
    pub file: PathBuf,

    /// List coordinate axes, auxiliary axes and horizontal coordinates
    #[arg(long)]
    pub list_axes: bool,

    /// Describe how a variable is classified
    #[arg(long)]
    pub describe: Option<String>,

    /// Variable to regrid onto the target grid
    #[arg(long, requires = "target")]
    pub regrid: Option<String>,

    /// NetCDF file holding the destination grid
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Variable of the target file whose grid is used; defaults to the regridded variable
    #[arg(long)]
    pub target_var: Option<String>,

    /// Regrid engine: 'libcf' or 'esmf'
    #[arg(long, default_value = "esmf")]
    pub tool: String,

    /// Interpolation method: 'linear', 'conservative' or 'patch'
    #[arg(long, default_value = "linear", value_parser = parse_method_arg)]
    pub method: RegridMethod,

    /// Engine option formatted as <key>=<value>, may be repeated
    #[arg(long = "option", value_parser = parse_option_arg)]
    pub options: Vec<(String, JsonValue)>,

    /// Missing value; defaults to the variable's _FillValue or missing_value
    #[arg(long)]
    pub missing_value: Option<f64>,

    /// Print engine diagnostics after regridding
    #[arg(long)]
    pub diagnostics: bool,

    /// Path to save the regridded field as NetCDF. If not set, prints a summary.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads for weight computation. Defaults to all CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

impl Args {
    /// Engine options collected from `--option`
    pub fn engine_options(&self) -> Options {
        self.options.iter().cloned().collect()
    }
}

fn parse_method_arg(s: &str) -> Result<RegridMethod, String> {
    s.parse().map_err(|e: cf_regrid::CfRegridError| e.to_string())
}

/// Values are read as JSON when they parse, as plain strings otherwise
fn parse_option_arg(s: &str) -> Result<(String, JsonValue), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => {
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| JsonValue::String(value.to_string()));
            Ok((key.to_string(), value))
        }
        _ => Err("Invalid format: Expected '<key>=<value>'.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option_arg() {
        assert_eq!(
            parse_option_arg("periodicity=1").unwrap(),
            ("periodicity".to_string(), JsonValue::from(1))
        );
        assert_eq!(
            parse_option_arg("coordSys=deg").unwrap(),
            ("coordSys".to_string(), JsonValue::from("deg"))
        );
        assert!(parse_option_arg("=1").is_err());
        assert!(parse_option_arg("novalue").is_err());
    }

    #[test]
    fn test_parse_method_arg() {
        assert_eq!(parse_method_arg("Conserve").unwrap(), RegridMethod::Conservative);
        assert!(parse_method_arg("nearest").is_err());
    }
}
