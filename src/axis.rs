use std::fmt;

/// A semantic dimension of an ND2 image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
    Channel,
    /// Colour component of an RGB frame.
    Rgb,
    Time,
    /// Multi-point (XY stage position).
    Position,
    Unknown,
}

impl Axis {
    /// Axes stored inside a single frame, in the order they appear in the array.
    pub const FRAME: [Axis; 4] = [Axis::Channel, Axis::Y, Axis::X, Axis::Rgb];

    /// Canonical single character tag.
    pub fn tag(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::Channel => 'C',
            Axis::Rgb => 'S',
            Axis::Time => 'T',
            Axis::Position => 'P',
            Axis::Unknown => 'U',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        let axis = match tag {
            'X' => Axis::X,
            'Y' => Axis::Y,
            'Z' => Axis::Z,
            'C' => Axis::Channel,
            'S' => Axis::Rgb,
            'T' => Axis::Time,
            'P' => Axis::Position,
            'U' => Axis::Unknown,
            _ => return None,
        };
        Some(axis)
    }

    /// Map an experiment loop type name to the axis it varies.
    pub fn from_loop_type(name: &str) -> Self {
        match name {
            "ZStackLoop" => Axis::Z,
            "TimeLoop" | "NETimeLoop" => Axis::Time,
            "XYPosLoop" => Axis::Position,
            _ => Axis::Unknown,
        }
    }

    pub fn is_frame_axis(self) -> bool {
        Self::FRAME.contains(&self)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Insertion-ordered mapping of axis to extent.
///
/// The order of entries is the dimension order of the resulting array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sizes(Vec<(Axis, usize)>);

impl Sizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, axis: Axis) -> Option<usize> {
        self.0.iter().find(|(a, _)| *a == axis).map(|(_, n)| *n)
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.get(axis).is_some()
    }

    /// Dimension index of `axis`, if present.
    pub fn index_of(&self, axis: Axis) -> Option<usize> {
        self.0.iter().position(|(a, _)| *a == axis)
    }

    /// Update the extent in place, or append a new entry.
    pub fn insert(&mut self, axis: Axis, size: usize) {
        match self.0.iter_mut().find(|(a, _)| *a == axis) {
            Some(entry) => entry.1 = size,
            None => self.0.push((axis, size)),
        }
    }

    pub fn remove(&mut self, axis: Axis) -> Option<usize> {
        let idx = self.index_of(axis)?;
        Some(self.0.remove(idx).1)
    }

    pub fn retain(&mut self, f: impl FnMut(&(Axis, usize)) -> bool) {
        self.0.retain(f)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, usize)> + '_ {
        self.0.iter().copied()
    }

    pub fn axes(&self) -> Vec<Axis> {
        self.0.iter().map(|(a, _)| *a).collect()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.iter().map(|(_, n)| *n).collect()
    }

    /// Axes which vary between frames.
    pub fn coord_axes(&self) -> Vec<Axis> {
        self.axes().into_iter().filter(|a| !a.is_frame_axis()).collect()
    }

    /// Extents of the axes which vary between frames.
    pub fn coord_shape(&self) -> Vec<usize> {
        self.iter()
            .filter(|(a, _)| !a.is_frame_axis())
            .map(|(_, n)| n)
            .collect()
    }

    /// Extents of the axes stored within a frame.
    pub fn frame_shape(&self) -> Vec<usize> {
        self.iter()
            .filter(|(a, _)| a.is_frame_axis())
            .map(|(_, n)| n)
            .collect()
    }

    /// Number of frames addressed by these sizes.
    pub fn frame_count(&self) -> usize {
        self.coord_shape().iter().product()
    }
}

impl FromIterator<(Axis, usize)> for Sizes {
    fn from_iter<I: IntoIterator<Item = (Axis, usize)>>(iter: I) -> Self {
        let mut sizes = Sizes::new();
        for (axis, size) in iter {
            sizes.insert(axis, size);
        }
        sizes
    }
}

impl fmt::Display for Sizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (axis, size)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{axis}: {size}")?;
        }
        f.write_str("}")
    }
}
