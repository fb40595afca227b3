//! Physical coordinate labels for each axis, and the labeled array wrapper.
use std::collections::BTreeMap;

use crate::{
    axis::{Axis, Sizes},
    metadata::{Attributes, ExperimentLoop, VoxelSize},
    position::position_names,
};

const RGB_NAMES: [&str; 4] = ["Red", "Green", "Blue", "alpha"];

/// Coordinate labels along one axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Labels {
    /// Physical positions (µm or ms).
    Scaled(Vec<f64>),
    Named(Vec<String>),
}

impl Labels {
    pub fn len(&self) -> usize {
        match self {
            Labels::Scaled(v) => v.len(),
            Labels::Named(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the label at `index`.
    pub fn select(&self, index: usize) -> Labels {
        match self {
            Labels::Scaled(v) => Labels::Scaled(v.get(index).copied().into_iter().collect()),
            Labels::Named(v) => Labels::Named(v.get(index).cloned().into_iter().collect()),
        }
    }

    fn scaled(count: usize, step: f64) -> Self {
        Labels::Scaled((0..count).map(|i| i as f64 * step).collect())
    }
}

/// Everything the label builder reads from a file.
#[derive(Debug, Clone, Copy)]
pub struct LabelInputs<'a> {
    pub sizes: &'a Sizes,
    pub attributes: &'a Attributes,
    pub voxel_size: VoxelSize,
    pub channel_names: &'a [String],
    pub experiment: &'a [ExperimentLoop],
}

/// Build the coordinate labels of every axis.
///
/// With `squeeze`, loops of a single iteration are skipped and axes with at most one label are omitted.
pub fn build_labels(inputs: &LabelInputs<'_>, squeeze: bool) -> BTreeMap<Axis, Labels> {
    let VoxelSize { x: dx, y: dy, z: dz } = inputs.voxel_size;
    let mut coords = BTreeMap::new();
    coords.insert(
        Axis::Y,
        Labels::scaled(inputs.attributes.height_px as usize, dy),
    );
    coords.insert(
        Axis::X,
        Labels::scaled(inputs.attributes.width().unwrap_or(0), dx),
    );
    coords.insert(Axis::Channel, Labels::Named(inputs.channel_names.to_vec()));
    coords.insert(Axis::Position, Labels::Named(position_names(&[])));

    for exp_loop in inputs.experiment {
        if squeeze && exp_loop.count() <= 1 {
            continue;
        }
        match exp_loop {
            ExperimentLoop::ZStack(l) => {
                coords.insert(Axis::Z, Labels::scaled(l.count, l.parameters.step_um));
            }
            ExperimentLoop::Time(l) => {
                coords.insert(Axis::Time, Labels::scaled(l.count, l.parameters.period_ms));
            }
            ExperimentLoop::NeTime(l) => {
                let times = l
                    .parameters
                    .periods
                    .iter()
                    .flat_map(|p| (0..p.count).map(move |i| i as f64 * p.period_ms))
                    .collect();
                coords.insert(Axis::Time, Labels::Scaled(times));
            }
            ExperimentLoop::XyPosition(_) => {
                coords.insert(
                    Axis::Position,
                    Labels::Named(position_names(std::slice::from_ref(exp_loop))),
                );
            }
            ExperimentLoop::Unknown(_) => {}
        }
    }

    let components = inputs.attributes.components_per_channel();
    if components > 1 {
        let names = RGB_NAMES
            .iter()
            .take(components)
            .map(|s| s.to_string())
            .collect();
        coords.insert(Axis::Rgb, Labels::Named(names));
    }

    // the Z loop is sometimes missing from the experiment
    if let Some(nz) = inputs.sizes.get(Axis::Z) {
        coords
            .entry(Axis::Z)
            .or_insert_with(|| Labels::scaled(nz, dz));
    }

    if squeeze {
        coords.retain(|_, labels| labels.len() > 1);
    }
    coords
}

/// An array with named dimensions, per-axis coordinate labels and file metadata.
#[derive(Debug, Clone)]
pub struct LabeledArray<D> {
    pub data: D,
    pub dims: Vec<Axis>,
    pub coords: BTreeMap<Axis, Labels>,
    /// `{"metadata": {"metadata", "experiment", "attributes", "text_info"}}`.
    pub attrs: serde_json::Value,
}

impl<D> LabeledArray<D> {
    pub fn labels(&self, axis: Axis) -> Option<&Labels> {
        self.coords.get(&axis)
    }

    /// Dimension index of `axis`, if present.
    pub fn dim(&self, axis: Axis) -> Option<usize> {
        self.dims.iter().position(|&a| a == axis)
    }
}
