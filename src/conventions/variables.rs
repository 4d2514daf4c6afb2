//! Variable metadata and the ordered variable dictionary

use super::axis::AxisLike;
use super::rules::Convention;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// Metadata for one dataset variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMeta {
    pub name: String,
    /// Ordered dimension names
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    /// String-valued attributes (`coordinates`, `bounds`, `units`, ...)
    pub attributes: BTreeMap<String, String>,
    /// Set for variables known to be coordinates of other variables
    pub is_coordinate: bool,
}

impl VariableMeta {
    pub fn new(name: impl Into<String>, dimensions: &[&str], shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            shape: shape.to_vec(),
            attributes: BTreeMap::new(),
            is_coordinate: false,
        }
    }

    /// A 1-D axis standing in for a dimension that has no coordinate variable
    pub fn virtual_axis(dimension: &str, len: usize) -> Self {
        Self::new(dimension, &[dimension], &[len])
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Space-separated auxiliary coordinate names
    pub fn coordinates(&self) -> Option<&str> {
        self.attribute("coordinates")
    }

    /// Tokens of the `coordinates` attribute, in order
    pub fn coordinate_names(&self) -> impl Iterator<Item = &str> {
        self.coordinates()
            .map(str::split_whitespace)
            .into_iter()
            .flatten()
    }

    pub fn bounds(&self) -> Option<&str> {
        self.attribute("bounds")
    }

    /// One dimension named after the variable itself
    pub fn is_self_indexed(&self) -> bool {
        self.dimensions.len() == 1 && self.dimensions[0] == self.name
    }

    /// Coordinates don't have coordinates
    pub fn is_abstract_coordinate(&self) -> bool {
        self.is_coordinate || self.is_self_indexed()
    }
}

impl AxisLike for VariableMeta {
    fn id(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// Insertion-ordered mapping from variable name to metadata
#[derive(Debug, Clone, Default)]
pub struct VariableDict {
    id: String,
    order: Vec<String>,
    vars: HashMap<String, VariableMeta>,
}

impl VariableDict {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Dataset identifier, used in log messages
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert a variable; replacing an existing name keeps its position
    pub fn insert(&mut self, var: VariableMeta) {
        if !self.vars.contains_key(&var.name) {
            self.order.push(var.name.clone());
        }
        self.vars.insert(var.name.clone(), var);
    }

    pub fn get(&self, name: &str) -> Option<&VariableMeta> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Variables in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &VariableMeta> {
        self.order.iter().filter_map(|name| self.vars.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Governing axes of `var`, in dimension order
    ///
    /// Dimensions without a coordinate variable are represented by a bare
    /// virtual axis carrying only the dimension name.
    pub fn domain<'a>(&'a self, var: &VariableMeta) -> Vec<Cow<'a, VariableMeta>> {
        var.dimensions
            .iter()
            .enumerate()
            .map(|(i, dim)| match self.vars.get(dim) {
                Some(axis) => Cow::Borrowed(axis),
                None => Cow::Owned(VariableMeta::virtual_axis(
                    dim,
                    var.shape.get(i).copied().unwrap_or(0),
                )),
            })
            .collect()
    }

    /// Flag axes and auxiliary axes as abstract coordinates
    pub fn mark_coordinates(&mut self, convention: &Convention) {
        let axes = convention.get_axis_ids(self);
        let aux = convention.get_axis_aux_ids(self, &axes);
        for name in axes.iter().chain(aux.iter()) {
            if let Some(var) = self.vars.get_mut(name) {
                var.is_coordinate = true;
            }
        }
    }
}

impl FromIterator<VariableMeta> for VariableDict {
    fn from_iter<I: IntoIterator<Item = VariableMeta>>(iter: I) -> Self {
        let mut dict = VariableDict::default();
        for var in iter {
            dict.insert(var);
        }
        dict
    }
}
