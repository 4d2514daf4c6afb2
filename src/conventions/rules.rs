//! Convention variants and their classification rules
//!
//! Each [`ConventionKind`] owns a table of rule functions. COARDS reuses the NUG
//! table unchanged and CF overrides the entries it specializes, so a more
//! specific convention only ever adds rules on top of a more general one.

use super::axis::{AliasConfig, AxisLike, LATITUDE_UNITS, LONGITUDE_UNITS};
use super::node::{DatasetNode, NodeTag};
use super::variables::{VariableDict, VariableMeta};
use crate::errors::{CfRegridError, Result};
use std::collections::HashSet;
use tracing::warn;

/// Current CF version string
pub const CF_CURRENT: &str = "CF-1.0";

/// Supported metadata conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConventionKind {
    /// NetCDF User Guide
    Nug,
    /// Cooperative Ocean/Atmosphere Research Data Service
    Coards,
    /// Climate and Forecast
    Cf,
}

impl ConventionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nug => "NUG",
            Self::Coards => "COARDS",
            Self::Cf => "CF",
        }
    }

    fn rules(self) -> &'static ConventionRules {
        match self {
            Self::Nug => &NUG_RULES,
            Self::Coards => &COARDS_RULES,
            Self::Cf => &CF_RULES,
        }
    }
}

/// First coordinate matching a role, and how many matched in total
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateMatch {
    pub axis: Option<String>,
    pub count: usize,
}

impl CoordinateMatch {
    fn record(&mut self, id: &str) {
        if self.count == 0 {
            self.axis = Some(id.to_string());
        }
        self.count += 1;
    }

    pub fn is_found(&self) -> bool {
        self.axis.is_some()
    }

    /// More than one candidate axis matched
    pub fn is_ambiguous(&self) -> bool {
        self.count > 1
    }
}

type BoundsRule = for<'a> fn(&'a VariableDict, &VariableMeta) -> Option<&'a VariableMeta>;

struct ConventionRules {
    axis_ids: fn(&VariableDict) -> Vec<String>,
    axis_aux_ids: fn(&VariableDict, &[String]) -> Vec<String>,
    dsetnode_aux_axis_ids: Option<fn(&DatasetNode) -> Vec<String>>,
    axis_is_latitude: fn(&AliasConfig, &dyn AxisLike) -> bool,
    axis_is_longitude: fn(&AliasConfig, &dyn AxisLike) -> bool,
    var_lat_id: fn(&Convention, &VariableMeta, &VariableDict) -> CoordinateMatch,
    var_lon_id: fn(&Convention, &VariableMeta, &VariableDict) -> CoordinateMatch,
    variable_bounds: Option<BoundsRule>,
}

const NUG_RULES: ConventionRules = ConventionRules {
    axis_ids: self_indexed_axis_ids,
    axis_aux_ids: no_aux_axis_ids,
    dsetnode_aux_axis_ids: None,
    axis_is_latitude: base_axis_is_latitude,
    axis_is_longitude: base_axis_is_longitude,
    var_lat_id: domain_lat_id,
    var_lon_id: domain_lon_id,
    variable_bounds: None,
};

const COARDS_RULES: ConventionRules = NUG_RULES;

const CF_RULES: ConventionRules = ConventionRules {
    axis_ids: self_indexed_axis_ids,
    axis_aux_ids: cf_axis_aux_ids,
    dsetnode_aux_axis_ids: Some(cf_dsetnode_aux_axis_ids),
    axis_is_latitude: cf_axis_is_latitude,
    axis_is_longitude: cf_axis_is_longitude,
    var_lat_id: cf_var_lat_id,
    var_lon_id: cf_var_lon_id,
    variable_bounds: Some(cf_variable_bounds),
};

/// A metadata convention with its alias configuration
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convention {
    kind: ConventionKind,
    version: Option<String>,
    aliases: AliasConfig,
}

impl Convention {
    pub fn new(kind: ConventionKind, version: Option<&str>) -> Self {
        Self {
            kind,
            version: version.map(str::to_string),
            aliases: AliasConfig::default(),
        }
    }

    pub fn nug() -> Self {
        Self::new(ConventionKind::Nug, None)
    }

    pub fn coards() -> Self {
        Self::new(ConventionKind::Coards, None)
    }

    pub fn cf(version: &str) -> Self {
        Self::new(ConventionKind::Cf, Some(version))
    }

    /// The CF-1 convention every dataset is classified with
    pub fn cf1() -> Self {
        Self::cf("CF-1")
    }

    #[must_use]
    pub fn with_aliases(mut self, aliases: AliasConfig) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn kind(&self) -> ConventionKind {
        self.kind
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn aliases(&self) -> &AliasConfig {
        &self.aliases
    }

    fn rules(&self) -> &'static ConventionRules {
        self.kind.rules()
    }

    fn not_implemented(&self, method: &str) -> CfRegridError {
        CfRegridError::NotImplemented {
            convention: self.kind.as_str().to_string(),
            method: method.to_string(),
        }
    }

    /// Names of the 1-D coordinate axes, in dictionary order
    pub fn get_axis_ids(&self, vardict: &VariableDict) -> Vec<String> {
        (self.rules().axis_ids)(vardict)
    }

    /// Names of auxiliary coordinate axes referenced through `coordinates`
    pub fn get_axis_aux_ids(&self, vardict: &VariableDict, axiskeys: &[String]) -> Vec<String> {
        (self.rules().axis_aux_ids)(vardict, axiskeys)
    }

    /// Auxiliary axis ids of a dataset tree
    ///
    /// # Errors
    ///
    /// Returns [`CfRegridError::NotImplemented`] for conventions without
    /// auxiliary coordinates.
    pub fn get_dsetnode_aux_axis_ids(&self, dsetnode: &DatasetNode) -> Result<Vec<String>> {
        let rule = self
            .rules()
            .dsetnode_aux_axis_ids
            .ok_or_else(|| self.not_implemented("getDsetnodeAuxAxisIds"))?;
        Ok(rule(dsetnode))
    }

    pub fn axis_is_latitude(&self, axis: &dyn AxisLike) -> bool {
        (self.rules().axis_is_latitude)(&self.aliases, axis)
    }

    pub fn axis_is_longitude(&self, axis: &dyn AxisLike) -> bool {
        (self.rules().axis_is_longitude)(&self.aliases, axis)
    }

    /// Latitude coordinate of `var`, with the number of candidates found
    pub fn get_var_lat_id(&self, var: &VariableMeta, vardict: &VariableDict) -> CoordinateMatch {
        (self.rules().var_lat_id)(self, var, vardict)
    }

    /// Longitude coordinate of `var`, with the number of candidates found
    pub fn get_var_lon_id(&self, var: &VariableMeta, vardict: &VariableDict) -> CoordinateMatch {
        (self.rules().var_lon_id)(self, var, vardict)
    }

    /// Bounds variable named by the `bounds` attribute of `var`
    ///
    /// A dangling reference is logged and reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CfRegridError::NotImplemented`] for conventions without bounds.
    pub fn get_variable_bounds<'a>(
        &self,
        dataset: &'a VariableDict,
        var: &VariableMeta,
    ) -> Result<Option<&'a VariableMeta>> {
        let rule = self
            .rules()
            .variable_bounds
            .ok_or_else(|| self.not_implemented("getVariableBounds"))?;
        Ok(rule(dataset, var))
    }
}

/// Convention to classify `dataset` with; always CF-1
pub fn get_dataset_convention(_dataset: &VariableDict) -> Convention {
    Convention::cf1()
}

fn self_indexed_axis_ids(vardict: &VariableDict) -> Vec<String> {
    vardict
        .iter()
        .filter(|var| var.is_self_indexed())
        .map(|var| var.name.clone())
        .collect()
}

fn no_aux_axis_ids(_vardict: &VariableDict, _axiskeys: &[String]) -> Vec<String> {
    Vec::new()
}

fn base_axis_is_latitude(aliases: &AliasConfig, axis: &dyn AxisLike) -> bool {
    let id = axis.id().to_lowercase();
    id.starts_with("lat") || aliases.latitude.contains(&id)
}

fn base_axis_is_longitude(aliases: &AliasConfig, axis: &dyn AxisLike) -> bool {
    let id = axis.id().to_lowercase();
    id.starts_with("lon") || aliases.longitude.contains(&id)
}

fn domain_match(
    var: &VariableMeta,
    vardict: &VariableDict,
    is_role: impl Fn(&VariableMeta) -> bool,
) -> CoordinateMatch {
    let mut found = CoordinateMatch::default();
    for axis in vardict.domain(var) {
        if is_role(&*axis) {
            found.record(&axis.name);
        }
    }
    found
}

fn domain_lat_id(conv: &Convention, var: &VariableMeta, vardict: &VariableDict) -> CoordinateMatch {
    domain_match(var, vardict, |axis| conv.axis_is_latitude(axis))
}

fn domain_lon_id(conv: &Convention, var: &VariableMeta, vardict: &VariableDict) -> CoordinateMatch {
    domain_match(var, vardict, |axis| conv.axis_is_longitude(axis))
}

fn cf_axis_aux_ids(vardict: &VariableDict, axiskeys: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&str> = Vec::new();
    for var in vardict.iter() {
        for item in var.coordinate_names() {
            // Already a 1-D coordinate axis
            if axiskeys.iter().any(|k| k == item) {
                continue;
            }
            if seen.insert(item) {
                candidates.push(item);
            }
        }
    }

    candidates
        .into_iter()
        .filter(|key| match vardict.get(key) {
            None => {
                warn!(
                    dataset = vardict.id(),
                    coordinate = *key,
                    "coordinate attribute points to non-existent variable"
                );
                false
            }
            // Scalar and higher-rank coordinates are not axes
            Some(coord) => matches!(coord.shape.len(), 1 | 2),
        })
        .map(str::to_string)
        .collect()
}

fn cf_dsetnode_aux_axis_ids(dsetnode: &DatasetNode) -> Vec<String> {
    let dsetdict = dsetnode.get_id_dict();
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for node in dsetdict.nodes() {
        let Some(coordnames) = node.get_external_attr("coordinates") else {
            continue;
        };
        for item in coordnames.split_whitespace() {
            let Some(target) = dsetdict.get(item) else {
                warn!(
                    node = node.id.as_str(),
                    coordinate = item,
                    "coordinate attribute points to non-existent node"
                );
                continue;
            };
            if target.tag == NodeTag::Axis {
                continue;
            }
            let rank = target.get_domain().map_or(0, DatasetNode::child_count);
            if !matches!(rank, 1 | 2) {
                continue;
            }
            if seen.insert(item) {
                result.push(item.to_string());
            }
        }
    }
    result
}

fn cf_axis_is_latitude(aliases: &AliasConfig, axis: &dyn AxisLike) -> bool {
    // An explicit horizontal axis letter settles the question
    match axis.axis_hint() {
        Some('Y') => return true,
        Some('X') => return false,
        _ => {}
    }
    if let Some(units) = axis.attribute("units") {
        if LATITUDE_UNITS.contains(&units.to_lowercase().as_str())
            && !(axis.is_longitude(aliases) || axis.is_level(aliases) || axis.is_time(aliases))
        {
            return true;
        }
    }
    if axis
        .attribute("standard_name")
        .is_some_and(|name| name.eq_ignore_ascii_case("latitude"))
    {
        return true;
    }
    base_axis_is_latitude(aliases, axis)
}

fn cf_axis_is_longitude(aliases: &AliasConfig, axis: &dyn AxisLike) -> bool {
    match axis.axis_hint() {
        Some('X') => return true,
        Some('Y') => return false,
        _ => {}
    }
    if let Some(units) = axis.attribute("units") {
        if LONGITUDE_UNITS.contains(&units.to_lowercase().as_str())
            && !(axis.is_latitude(aliases) || axis.is_level(aliases) || axis.is_time(aliases))
        {
            return true;
        }
    }
    if axis
        .attribute("standard_name")
        .is_some_and(|name| name.eq_ignore_ascii_case("longitude"))
    {
        return true;
    }
    base_axis_is_longitude(aliases, axis)
}

fn cf_coordinates_match(
    var: &VariableMeta,
    vardict: &VariableDict,
    is_role: impl Fn(&VariableMeta) -> bool,
) -> CoordinateMatch {
    let mut found = CoordinateMatch::default();
    for name in var.coordinate_names() {
        // Not everything in `coordinates` is an axis, e.g. scalar coordinates
        if let Some(coord) = vardict.get(name) {
            if coord.has_axis_capability() && is_role(coord) {
                found.record(name);
            }
        }
    }
    found
}

fn cf_var_lat_id(conv: &Convention, var: &VariableMeta, vardict: &VariableDict) -> CoordinateMatch {
    if var.is_abstract_coordinate() {
        return CoordinateMatch::default();
    }
    let found = cf_coordinates_match(var, vardict, |coord| conv.axis_is_latitude(coord));
    if found.is_found() {
        found
    } else {
        domain_lat_id(conv, var, vardict)
    }
}

fn cf_var_lon_id(conv: &Convention, var: &VariableMeta, vardict: &VariableDict) -> CoordinateMatch {
    if var.is_abstract_coordinate() {
        return CoordinateMatch::default();
    }
    let found = cf_coordinates_match(var, vardict, |coord| conv.axis_is_longitude(coord));
    if found.is_found() {
        found
    } else {
        domain_lon_id(conv, var, vardict)
    }
}

fn cf_variable_bounds<'a>(dataset: &'a VariableDict, var: &VariableMeta) -> Option<&'a VariableMeta> {
    let bounds_id = var.bounds()?;
    let found = dataset.get(bounds_id);
    if found.is_none() {
        warn!(
            dataset = dataset.id(),
            bounds = bounds_id,
            "bounds variable not found"
        );
    }
    found
}
