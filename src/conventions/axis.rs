//! Axis metadata and intrinsic role detection
//!
//! An axis knows a little about itself: an explicit `axis` letter, its units and
//! its id are enough to tell whether it looks like latitude, longitude, a vertical
//! level or time. Conventions layer their own rules on top of these checks.

use ndarray::ArrayD;
use std::collections::BTreeMap;

/// Units accepted as degrees north (compared lower-cased)
pub const LATITUDE_UNITS: [&str; 6] = [
    "degrees_north",
    "degree_north",
    "degree_n",
    "degrees_n",
    "degreen",
    "degreesn",
];

/// Units accepted as degrees east (compared lower-cased)
pub const LONGITUDE_UNITS: [&str; 6] = [
    "degrees_east",
    "degree_east",
    "degree_e",
    "degrees_e",
    "degreee",
    "degreese",
];

const PRESSURE_UNITS: [&str; 10] = [
    "bar",
    "millibar",
    "decibar",
    "atmosphere",
    "atm",
    "pascal",
    "pa",
    "hpa",
    "mbar",
    "mb",
];

/// List of axis id aliases, stored lower-cased
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasList(Vec<String>);

impl AliasList {
    /// Create an alias list, lower-casing every entry
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            aliases
                .into_iter()
                .map(|a| a.as_ref().to_lowercase())
                .collect(),
        )
    }

    /// Append an alias (lower-cased on insertion)
    pub fn push(&mut self, alias: impl AsRef<str>) {
        self.0.push(alias.as_ref().to_lowercase());
    }

    /// Replace the alias at `index` (lower-cased on insertion)
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds, like slice indexing.
    pub fn set(&mut self, index: usize, alias: impl AsRef<str>) {
        self.0[index] = alias.as_ref().to_lowercase();
    }

    /// Check membership of an already lower-cased id
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|a| a == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AliasList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Axis id aliases used by the classifier
///
/// Passed to a [`Convention`](super::Convention) when it is built, so two
/// conventions with different aliases never influence each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasConfig {
    pub latitude: AliasList,
    pub longitude: AliasList,
    pub level: AliasList,
    pub time: AliasList,
    pub forecast: AliasList,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            latitude: AliasList::default(),
            longitude: AliasList::default(),
            level: AliasList::new(["plev"]),
            time: AliasList::default(),
            forecast: AliasList::default(),
        }
    }
}

/// Anything that can be judged as a coordinate axis
pub trait AxisLike {
    /// Axis identifier (variable name)
    fn id(&self) -> &str;

    /// String-valued attribute lookup
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Number of dimensions of the coordinate values
    fn rank(&self) -> usize;

    /// Explicit `axis` attribute when it is one of `X`, `Y`, `Z` or `T`
    fn axis_hint(&self) -> Option<char> {
        match self.attribute("axis") {
            Some("X") => Some('X'),
            Some("Y") => Some('Y'),
            Some("Z") => Some('Z'),
            Some("T") => Some('T'),
            _ => None,
        }
    }

    /// Coordinates of rank 1 or 2 can take a horizontal role
    fn has_axis_capability(&self) -> bool {
        matches!(self.rank(), 1 | 2)
    }

    fn is_latitude(&self, aliases: &AliasConfig) -> bool {
        match self.axis_hint() {
            Some('Y') => return true,
            Some('X') => return false,
            _ => {}
        }
        if let Some(units) = self.attribute("units") {
            if LATITUDE_UNITS.contains(&units.to_lowercase().as_str()) {
                return true;
            }
        }
        let id = self.id().to_lowercase();
        id.starts_with("lat") || aliases.latitude.contains(&id)
    }

    fn is_longitude(&self, aliases: &AliasConfig) -> bool {
        match self.axis_hint() {
            Some('X') => return true,
            Some('Y') => return false,
            _ => {}
        }
        if let Some(units) = self.attribute("units") {
            if LONGITUDE_UNITS.contains(&units.to_lowercase().as_str()) {
                return true;
            }
        }
        let id = self.id().to_lowercase();
        id.starts_with("lon") || aliases.longitude.contains(&id)
    }

    fn is_level(&self, aliases: &AliasConfig) -> bool {
        if let Some(hint) = self.axis_hint() {
            return hint == 'Z';
        }
        if let Some(positive) = self.attribute("positive") {
            if matches!(positive.trim().to_lowercase().as_str(), "up" | "down") {
                return true;
            }
        }
        if let Some(units) = self.attribute("units") {
            if PRESSURE_UNITS.contains(&units.trim().to_lowercase().as_str()) {
                return true;
            }
        }
        let id = self.id().to_lowercase();
        id.starts_with("lev") || id.starts_with("depth") || aliases.level.contains(&id)
    }

    fn is_time(&self, aliases: &AliasConfig) -> bool {
        if let Some(hint) = self.axis_hint() {
            return hint == 'T';
        }
        if let Some(units) = self.attribute("units") {
            if units.to_lowercase().contains(" since ") {
                return true;
            }
        }
        let id = self.id().to_lowercase();
        id.starts_with("time") || aliases.time.contains(&id) || aliases.forecast.contains(&id)
    }
}

/// A named coordinate array with its attributes
#[derive(Debug, Clone)]
pub struct Axis {
    pub id: String,
    pub values: ArrayD<f64>,
    pub attributes: BTreeMap<String, String>,
}

impl Axis {
    pub fn new(id: impl Into<String>, values: ArrayD<f64>) -> Self {
        Self {
            id: id.into(),
            values,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn units(&self) -> Option<&str> {
        self.attribute("units")
    }

    pub fn standard_name(&self) -> Option<&str> {
        self.attribute("standard_name")
    }

    /// Name of the companion bounds variable
    pub fn bounds(&self) -> Option<&str> {
        self.attribute("bounds")
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl AxisLike for Axis {
    fn id(&self) -> &str {
        &self.id
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn rank(&self) -> usize {
        self.values.ndim()
    }
}
