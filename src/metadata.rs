//! Convention reports for NetCDF files
//!
//! Printing helpers behind the `--list-axes` and `--describe` command line
//! options. They show how the dataset convention classifies each variable.

use crate::conventions::{Convention, VariableDict, VariableMeta};
use crate::errors::{CfRegridError, Result};

/// Classification of one variable under a convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRoles {
    pub name: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub bounds: Option<String>,
    pub is_axis: bool,
    pub is_aux_axis: bool,
}

/// Classify every variable of `dict`
pub fn classify_variables(dict: &VariableDict, convention: &Convention) -> Result<Vec<VariableRoles>> {
    let axes = convention.get_axis_ids(dict);
    let aux = convention.get_axis_aux_ids(dict, &axes);

    dict.iter()
        .map(|var| {
            Ok(VariableRoles {
                name: var.name.clone(),
                latitude: convention.get_var_lat_id(var, dict).axis,
                longitude: convention.get_var_lon_id(var, dict).axis,
                bounds: bounds_name(dict, convention, var)?,
                is_axis: axes.contains(&var.name),
                is_aux_axis: aux.contains(&var.name),
            })
        })
        .collect()
}

fn bounds_name(
    dict: &VariableDict,
    convention: &Convention,
    var: &VariableMeta,
) -> Result<Option<String>> {
    match convention.get_variable_bounds(dict, var) {
        Ok(bounds) => Ok(bounds.map(|b| b.name.clone())),
        Err(CfRegridError::NotImplemented { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn shape_string(var: &VariableMeta) -> String {
    var.shape
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" × ")
}

/// Print the coordinate axes, auxiliary axes and horizontal coordinates
pub fn print_axes(dict: &VariableDict, convention: &Convention) -> Result<()> {
    let axes = convention.get_axis_ids(dict);
    let aux = convention.get_axis_aux_ids(dict, &axes);

    println!("\n Convention: {}", convention.kind().as_str());
    if let Some(version) = convention.version() {
        println!("    version: {version}");
    }

    println!("\n Coordinate axes");
    println!("===================");
    if axes.is_empty() {
        println!("   (none)");
    }
    for id in &axes {
        let Some(var) = dict.get(id) else { continue };
        let mut roles = Vec::new();
        if convention.axis_is_latitude(var) {
            roles.push("latitude");
        }
        if convention.axis_is_longitude(var) {
            roles.push("longitude");
        }
        if roles.is_empty() {
            println!("    {} ({})", id, shape_string(var));
        } else {
            println!("    {} ({}) → {}", id, shape_string(var), roles.join(", "));
        }
    }

    println!("\n Auxiliary axes");
    println!("==================");
    if aux.is_empty() {
        println!("   (none)");
    }
    for id in &aux {
        if let Some(var) = dict.get(id) {
            println!("    {} [{}]", id, var.dimensions.join(", "));
        }
    }

    println!("\n Horizontal coordinates");
    println!("==========================");
    for roles in classify_variables(dict, convention)?
        .iter()
        .filter(|r| !r.is_axis && !r.is_aux_axis)
    {
        match (&roles.latitude, &roles.longitude) {
            (Some(lat), Some(lon)) => println!("    {}: lat={}, lon={}", roles.name, lat, lon),
            (Some(lat), None) => println!("    {}: lat={}", roles.name, lat),
            (None, Some(lon)) => println!("    {}: lon={}", roles.name, lon),
            (None, None) => {}
        }
    }

    println!("\n💡 Tip: Use --regrid <variable> --target <file> to regrid a field");
    Ok(())
}

/// Print how one variable is classified
pub fn describe_variable(dict: &VariableDict, convention: &Convention, var_name: &str) -> Result<()> {
    let var = dict
        .get(var_name)
        .ok_or_else(|| CfRegridError::VariableNotFound {
            var: var_name.to_string(),
        })?;

    println!("\n Variable Description: {}", var_name);
    println!("={}", "=".repeat(var_name.len() + 25));

    if var.dimensions.is_empty() {
        println!(" Dimensions: (scalar)");
    } else {
        println!(" Dimensions: [{}]", var.dimensions.join(", "));
        println!(" Shape: ({})", shape_string(var));
    }

    let lat = convention.get_var_lat_id(var, dict);
    let lon = convention.get_var_lon_id(var, dict);
    println!("\n Coordinates:");
    println!(
        "    latitude: {} ({} candidate(s))",
        lat.axis.as_deref().unwrap_or("-"),
        lat.count
    );
    println!(
        "    longitude: {} ({} candidate(s))",
        lon.axis.as_deref().unwrap_or("-"),
        lon.count
    );
    if let Some(bounds) = bounds_name(dict, convention, var)? {
        println!("    bounds: {bounds}");
    }
    if var.is_coordinate {
        println!("    (coordinate variable)");
    }

    if var.attributes.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for (name, value) in &var.attributes {
            println!("   • {}: \"{}\"", name, value);
        }
    }

    Ok(())
}
