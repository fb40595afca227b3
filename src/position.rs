//! Restricting an image to a single XY stage position.
use std::fmt;

use crate::{
    axis::{Axis, Sizes},
    index::{coords_from_index, index_from_coords},
    metadata::ExperimentLoop,
};

/// A stage position, by index or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Index(usize),
    Name(String),
}

impl From<usize> for Position {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl From<&str> for Position {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for Position {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Index(i) => write!(f, "{i}"),
            Position::Name(n) => write!(f, "{n:?}"),
        }
    }
}

/// Name of the position at `index`, for points which were not named.
pub(crate) fn default_position_name(index: usize) -> String {
    format!("XYPos:{index}")
}

/// Ordered names of the stage positions in an experiment.
///
/// Without a multi-point loop there is a single position, `XYPos:0`.
pub fn position_names(experiment: &[ExperimentLoop]) -> Vec<String> {
    let points = experiment.iter().find_map(|l| match l {
        ExperimentLoop::XyPosition(l) => Some(&l.parameters.points),
        _ => None,
    });
    match points {
        Some(points) => points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                p.name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| default_position_name(i))
            })
            .collect(),
        None => vec![default_position_name(0)],
    }
}

/// Resolve a position to its index, checking it against the position axis.
pub fn resolve_position(sizes: &Sizes, names: &[String], position: &Position) -> crate::Result<usize> {
    let index = match position {
        Position::Index(i) => *i,
        Position::Name(name) => names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| crate::Error::InvalidPositionName(name.clone()))?,
    };
    let available = sizes.get(Axis::Position).unwrap_or(1);
    if index >= available {
        return Err(crate::Error::PositionOutOfRange {
            position: index,
            available,
        });
    }
    Ok(index)
}

/// The array shape and frame sequence for a (possibly restricted) read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Full array shape; the position extent is 1 if a position was selected.
    pub shape: Vec<usize>,
    /// Linear frame indices, in the C order of the restricted shape.
    pub frames: Vec<usize>,
}

/// Select the frames belonging to `position`, or all frames for `None`.
pub fn select(sizes: &Sizes, names: &[String], position: Option<&Position>) -> crate::Result<Selection> {
    let mut shape = sizes.shape();
    let coord_shape = sizes.coord_shape();
    let all = || -> Vec<usize> { (0..sizes.frame_count()).collect() };

    let Some(position) = position else {
        return Ok(Selection { shape, frames: all() });
    };
    let index = resolve_position(sizes, names, position)?;
    let (Some(dim), Some(coord_dim)) = (
        sizes.index_of(Axis::Position),
        sizes.coord_axes().iter().position(|&a| a == Axis::Position),
    ) else {
        return Ok(Selection { shape, frames: all() });
    };

    let mut restricted = coord_shape.clone();
    restricted[coord_dim] = 1;
    let count: usize = restricted.iter().product();
    let frames = (0..count)
        .map(|i| {
            let mut coords = coords_from_index(i, &restricted);
            coords[coord_dim] = index;
            index_from_coords(&coords, &coord_shape).unwrap_or(0)
        })
        .collect();
    shape[dim] = 1;
    Ok(Selection { shape, frames })
}
