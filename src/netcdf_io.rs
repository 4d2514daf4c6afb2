//! NetCDF adapter for the classifier and the regrid façade
//!
//! Reads variable metadata into a [`VariableDict`], builds horizontal grids
//! from the latitude/longitude coordinates a convention finds for a variable,
//! and writes regridded fields to new NetCDF files with their attributes.

use crate::conventions::{get_dataset_convention, Convention, VariableDict, VariableMeta};
use crate::errors::{CfRegridError, Result};
use crate::regrid::GridSpec;
use chrono::Utc;
use ndarray::{ArrayD, Axis, IxDyn};
use netcdf::{create, AttributeValue, File, FileMut};
use std::{fs, path::Path};
use tracing::{debug, warn};

/// Render an attribute value as text, numbers joined by spaces
pub fn attribute_to_string(value: &AttributeValue) -> Option<String> {
    fn join<T: ToString>(values: &[T]) -> String {
        values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    let text = match value {
        AttributeValue::Str(s) => s.clone(),
        AttributeValue::Strs(ss) => ss.join(" "),
        AttributeValue::Float(v) => v.to_string(),
        AttributeValue::Floats(vs) => join(vs),
        AttributeValue::Double(v) => v.to_string(),
        AttributeValue::Doubles(vs) => join(vs),
        AttributeValue::Int(v) => v.to_string(),
        AttributeValue::Ints(vs) => join(vs),
        AttributeValue::Short(v) => v.to_string(),
        AttributeValue::Shorts(vs) => join(vs),
        AttributeValue::Uchar(v) => v.to_string(),
        AttributeValue::Uchars(vs) => join(vs),
        AttributeValue::Ushort(v) => v.to_string(),
        AttributeValue::Ushorts(vs) => join(vs),
        AttributeValue::Uint(v) => v.to_string(),
        AttributeValue::Uints(vs) => join(vs),
        _ => return None,
    };
    Some(text)
}

/// Load the metadata of every variable, with coordinates flagged
pub fn load_variable_dict(file: &File, id: &str) -> Result<VariableDict> {
    let mut dict = VariableDict::new(id);
    for var in file.variables() {
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        let mut meta = VariableMeta::new(var.name(), &dim_refs, &shape);
        for attr in var.attributes() {
            match attr.value() {
                Ok(value) => {
                    if let Some(text) = attribute_to_string(&value) {
                        meta.attributes.insert(attr.name().to_string(), text);
                    }
                }
                Err(e) => warn!(var = %var.name(), attr = attr.name(), "unreadable attribute: {}", e),
            }
        }
        dict.insert(meta);
    }

    let convention = get_dataset_convention(&dict);
    dict.mark_coordinates(&convention);
    debug!(id, variables = dict.len(), "loaded variable metadata");
    Ok(dict)
}

/// Read a whole variable as `f64`
pub fn read_variable(file: &File, name: &str) -> Result<ArrayD<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| CfRegridError::VariableNotFound {
            var: name.to_string(),
        })?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values = var.get_values::<f64, _>(..)?;
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// Missing value of a variable, from `_FillValue` or `missing_value`
pub fn missing_value(meta: &VariableMeta) -> Option<f64> {
    ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|key| meta.attributes.get(*key))
        .find_map(|text| text.split_whitespace().next()?.parse().ok())
}

/// Cell edges from a CF `(n, 2)` bounds array
fn edges_from_bounds(bounds: &ArrayD<f64>) -> Option<Vec<f64>> {
    if bounds.ndim() != 2 || bounds.shape()[1] != 2 || bounds.shape()[0] == 0 {
        return None;
    }
    let mut edges: Vec<f64> = bounds.index_axis(Axis(1), 0).iter().copied().collect();
    edges.push(*bounds.index_axis(Axis(1), 1).iter().last()?);
    Some(edges)
}

fn read_edges(
    file: &File,
    dict: &VariableDict,
    convention: &Convention,
    axis: &VariableMeta,
) -> Result<Option<Vec<f64>>> {
    let Some(bounds) = convention.get_variable_bounds(dict, axis)? else {
        return Ok(None);
    };
    let values = read_variable(file, &bounds.name)?;
    let edges = edges_from_bounds(&values);
    if edges.is_none() {
        warn!(
            axis = %axis.name,
            bounds = %bounds.name,
            shape = ?values.shape(),
            "bounds are not of shape (n, 2), using cell midpoints"
        );
    }
    Ok(edges)
}

/// Names of the latitude and longitude coordinates of `var_name`
///
/// # Errors
///
/// Fails when the variable is unknown or lacks either coordinate.
pub fn horizontal_coordinates(
    dict: &VariableDict,
    convention: &Convention,
    var_name: &str,
) -> Result<(String, String)> {
    let var = dict
        .get(var_name)
        .ok_or_else(|| CfRegridError::VariableNotFound {
            var: var_name.to_string(),
        })?;
    let lat = convention.get_var_lat_id(var, dict);
    let lon = convention.get_var_lon_id(var, dict);
    for (role, found) in [("latitude", &lat), ("longitude", &lon)] {
        if found.is_ambiguous() {
            warn!(var = var_name, role, count = found.count, "several candidate axes, using the first");
        }
    }
    match (lat.axis, lon.axis) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(CfRegridError::configuration(format!(
            "variable '{var_name}' has no latitude/longitude coordinates"
        ))),
    }
}

/// Build the horizontal grid of `var_name`
///
/// 1-D coordinates give a rectilinear grid whose cell edges come from CF
/// bounds when both axes carry them; 2-D coordinates are used as they are.
pub fn read_grid(
    file: &File,
    dict: &VariableDict,
    convention: &Convention,
    var_name: &str,
) -> Result<GridSpec> {
    let (lat_name, lon_name) = horizontal_coordinates(dict, convention, var_name)?;
    let lat = read_variable(file, &lat_name)?;
    let lon = read_variable(file, &lon_name)?;

    match (lat.ndim(), lon.ndim()) {
        (1, 1) => {
            let lat_values: Vec<f64> = lat.iter().copied().collect();
            let lon_values: Vec<f64> = lon.iter().copied().collect();
            let grid = GridSpec::rectilinear(&lat_values, &lon_values);

            let lat_edges = match dict.get(&lat_name) {
                Some(meta) => read_edges(file, dict, convention, meta)?,
                None => None,
            };
            let lon_edges = match dict.get(&lon_name) {
                Some(meta) => read_edges(file, dict, convention, meta)?,
                None => None,
            };
            Ok(match (lat_edges, lon_edges) {
                (Some(lat_e), Some(lon_e)) => grid.with_rectilinear_bounds(&lat_e, &lon_e),
                _ => grid,
            })
        }
        (2, 2) => {
            debug!(var = var_name, "curvilinear coordinates, bounds not read");
            Ok(GridSpec::new(vec![lat, lon]))
        }
        (a, b) => Err(CfRegridError::configuration(format!(
            "coordinates '{lat_name}' ({a}-D) and '{lon_name}' ({b}-D) do not form a grid"
        ))),
    }
}

/// Writer for regridded fields
///
/// Attributes come from the source variable, horizontal coordinates from the
/// target file and any other coordinate from the source file.
pub struct NetCDFWriter<'a> {
    source_file: &'a File,
    target_file: &'a File,
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    pub fn new(source_file: &'a File, target_file: &'a File, output_path: &'a Path) -> Self {
        Self {
            source_file,
            target_file,
            output_path,
        }
    }

    /// Write `data` as `var_name` over `dim_names`
    ///
    /// `horizontal` names the target coordinate variables to carry over.
    pub fn write_result(
        &self,
        data: &ArrayD<f64>,
        dim_names: &[String],
        var_name: &str,
        source_var: &str,
        horizontal: &[String],
        fill_value: Option<f64>,
    ) -> Result<()> {
        if dim_names.len() != data.ndim() {
            return Err(CfRegridError::shape_mismatch(
                "output dimension names",
                &[data.ndim()],
                &[dim_names.len()],
            ));
        }
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;
        for (dim_name, &dim_len) in dim_names.iter().zip(data.shape()) {
            file.add_dimension(dim_name, dim_len)?;
        }

        for name in horizontal {
            copy_variable(self.target_file, &mut file, name)?;
        }
        for name in dim_names.iter().filter(|d| !horizontal.contains(d)) {
            if self.source_file.variable(name).is_some() {
                copy_variable(self.source_file, &mut file, name)?;
            }
        }

        let orig_var = self
            .source_file
            .variable(source_var)
            .ok_or_else(|| CfRegridError::VariableNotFound {
                var: source_var.to_string(),
            })?;

        let dim_refs: Vec<&str> = dim_names.iter().map(String::as_str).collect();
        let mut new_var = file.add_variable::<f64>(var_name, &dim_refs)?;
        if let Some(fv) = fill_value {
            new_var.put_attribute("_FillValue", fv)?;
        }

        let values: Vec<f64> = data.iter().copied().collect();
        new_var.put_values(&values, ..)?;

        let skipped = ["_FillValue", "missing_value", "coordinates", "bounds"];
        for attr in orig_var.attributes().filter(|a| !skipped.contains(&a.name())) {
            new_var.put_attribute(attr.name(), attr.value()?)?;
        }
        if let Some(fv) = fill_value {
            new_var.put_attribute("missing_value", fv)?;
        }

        file.add_attribute("Conventions", "CF-1.0")?;
        file.add_attribute(
            "history",
            format!(
                "Regridded '{}' by cf_regrid on {}",
                source_var,
                Utc::now().to_rfc3339()
            ),
        )?;

        Ok(())
    }
}

/// Copy a coordinate variable with its values and attributes
fn copy_variable(from: &File, to: &mut FileMut, name: &str) -> Result<()> {
    let var = from
        .variable(name)
        .ok_or_else(|| CfRegridError::VariableNotFound {
            var: name.to_string(),
        })?;
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    for (dim, len) in dims.iter().zip(var.dimensions().iter().map(|d| d.len())) {
        if to.dimension(dim).is_none() {
            to.add_dimension(dim, len)?;
        }
    }
    let values = var.get_values::<f64, _>(..)?;

    let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
    let mut new_var = to.add_variable::<f64>(name, &dim_refs)?;
    new_var.put_values(&values, ..)?;
    for attr in var.attributes().filter(|a| a.name() != "_FillValue") {
        new_var.put_attribute(attr.name(), attr.value()?)?;
    }
    debug!(name, "copied coordinate variable");
    Ok(())
}
