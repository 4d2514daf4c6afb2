//! Metadata convention classification
//!
//! This module decides which variables of a dataset are coordinate axes,
//! auxiliary coordinates, latitude or longitude axes and bounds variables,
//! following the NUG, COARDS and CF conventions.
//!
//! # Organization
//!
//! - [`axis`]: axis metadata, alias lists and intrinsic role checks
//! - [`variables`]: variable metadata and the ordered variable dictionary
//! - [`node`]: dataset tree nodes
//! - [`rules`]: the convention variants and their rule tables

pub mod axis;
pub mod node;
pub mod rules;
pub mod variables;

pub use axis::{AliasConfig, AliasList, Axis, AxisLike, LATITUDE_UNITS, LONGITUDE_UNITS};
pub use node::{DatasetNode, IdDict, NodeTag};
pub use rules::{get_dataset_convention, Convention, ConventionKind, CoordinateMatch, CF_CURRENT};
pub use variables::{VariableDict, VariableMeta};
