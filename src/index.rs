//! Conversion between coordinate tuples over the non-frame axes and linear frame indices.

/// Linear frame index of a coordinate tuple, in C order (last axis fastest).
///
/// Returns `None` when `shape` is empty: there are no coordinate axes,
/// and the file holds a single frame independent of any coordinate.
///
/// # Panics
///
/// If `coords` and `shape` differ in length, or any component is out of range.
pub fn index_from_coords(coords: &[usize], shape: &[usize]) -> Option<usize> {
    if shape.is_empty() {
        return None;
    }
    assert_eq!(
        coords.len(),
        shape.len(),
        "coordinate {coords:?} does not match shape {shape:?}"
    );
    let mut index = 0;
    for (&c, &n) in coords.iter().zip(shape) {
        assert!(c < n, "coordinate {coords:?} out of range for shape {shape:?}");
        index = index * n + c;
    }
    Some(index)
}

/// Coordinate tuple of a linear frame index, in C order (last axis fastest).
///
/// # Panics
///
/// If `index` is not less than the product of `shape`.
pub fn coords_from_index(index: usize, shape: &[usize]) -> Vec<usize> {
    let total: usize = shape.iter().product();
    assert!(index < total, "index {index} out of range for shape {shape:?}");
    let mut coords = vec![0; shape.len()];
    let mut rem = index;
    for (c, &n) in coords.iter_mut().zip(shape).rev() {
        *c = rem % n;
        rem /= n;
    }
    coords
}
