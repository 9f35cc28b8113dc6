//! Configuration file parser for projection runs

use std::fs;
use std::path::PathBuf;

use itertools::Itertools;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::projector::ExecutionContext;
use crate::types::{Angle, Coord, PI};

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Side length of the square field
    #[serde(default = "mandatory")]
    pub size: usize,

    /// Projection angles, explicit or evenly spaced
    #[serde(default = "mandatory")]
    pub angles: Angles,

    #[serde(default)]
    pub geometry: GeometrySpec,

    /// Attenuation coefficient per pixel unit
    #[serde(default)]
    pub attenuation: Option<Coord>,

    #[serde(default)]
    pub context: ExecutionContext,
}

impl Config {
    /// Build the [`Geometry`] this configuration describes.
    pub fn geometry(&self) -> Result<Geometry> {
        self.geometry.build(self.size)
    }

    pub fn angles(&self) -> Vec<Angle> {
        self.angles.to_radians()
    }
}

/// Either an explicit list of angles in radians, or a half-open range given
/// in degrees.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Angles {
    List(Vec<Angle>),
    Range { start_deg: Angle, stop_deg: Angle, count: usize },
}

impl Angles {
    pub fn to_radians(&self) -> Vec<Angle> {
        match self {
            Angles::List(angles) => angles.clone(),
            Angles::Range { start_deg, stop_deg, count } => {
                let step = (stop_deg - start_deg) / *count as Angle;
                (0..*count)
                    .map(|i| (start_deg + i as Angle * step) * PI / 180.0)
                    .collect_vec()
            }
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeometrySpec {

    #[serde(default)]
    pub kind: GeometryKind,

    /// Parallel detector heights; defaults to one ray per pixel row
    pub heights: Option<Vec<Coord>>,

    /// Entry heights, flexible geometries only
    pub in_heights: Option<Vec<Coord>>,

    /// Exit heights, flexible geometries only
    pub out_heights: Option<Vec<Coord>>,

    pub weights: Option<Vec<Coord>>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    #[default]
    Parallel,
    Flexible,
}

impl GeometrySpec {
    pub fn build(&self, size: usize) -> Result<Geometry> {
        match self.kind {
            GeometryKind::Parallel => {
                if self.in_heights.is_some() || self.out_heights.is_some() {
                    return Err(Error::InvalidGeometry(
                        "in_heights/out_heights only apply to flexible geometries; \
                         use heights".into(),
                    ));
                }
                let heights = match &self.heights {
                    Some(heights) => heights.clone(),
                    None => return match &self.weights {
                        Some(_) => Err(Error::InvalidGeometry(
                            "weights require explicit heights".into())),
                        None => Geometry::default_parallel(size),
                    },
                };
                match &self.weights {
                    Some(weights) => Geometry::parallel_weighted(size, heights, weights.clone()),
                    None => Geometry::parallel(size, heights),
                }
            }
            GeometryKind::Flexible => {
                if self.heights.is_some() {
                    return Err(Error::InvalidGeometry(
                        "flexible geometries take in_heights and out_heights, not heights".into(),
                    ));
                }
                let (ins, outs) = match (&self.in_heights, &self.out_heights) {
                    (Some(ins), Some(outs)) => (ins.clone(), outs.clone()),
                    _ => return Err(Error::InvalidGeometry(
                        "flexible geometries need both in_heights and out_heights".into(),
                    )),
                };
                match &self.weights {
                    Some(weights) => Geometry::flexible_weighted(size, ins, outs, weights.clone()),
                    None => Geometry::flexible(size, ins, outs),
                }
            }
        }
    }
}

pub fn read_config_file(path: PathBuf) -> Config {
    let config: String = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Couldn't read config file `{path:?}`: {e}"));
    toml::from_str(&config)
        .unwrap_or_else(|e| panic!("Couldn't parse config file `{path:?}`: {e}"))
}

// Hack to allow mandatory fields to be missing during testing.
#[cfg(not(test))]
fn mandatory<T>() -> T { panic!("MISSING MANDATORY FIELD. TODO: which one?") }
#[cfg(test)]
fn mandatory<T: Default>() -> T { T::default() }

impl Default for Angles {
    fn default() -> Self { Angles::List(vec![]) }
}
