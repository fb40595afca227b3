//! Reconcile the free-text description and the structured loop records into [`Sizes`].
use log::{debug, trace};

use crate::{
    axis::{Axis, Sizes},
    metadata::{Attributes, CoordInfo},
};

const DIMENSIONS_MARKER: &str = "Dimensions:";

/// Parse the `Dimensions:` line of a free-text image description.
///
/// A line such as `Dimensions: T(3) x XY(2) x λ(2) x Z(3)` yields
/// `[(T, 3), (P, 2), (C, 2), (Z, 3)]`.
/// Tokens which are not axis tags are skipped; a missing line yields an empty list.
pub fn dims_from_description(description: Option<&str>) -> Vec<(Axis, usize)> {
    let Some(line) = description.and_then(|desc| {
        desc.lines()
            .find_map(|line| line.split_once(DIMENSIONS_MARKER).map(|(_, rest)| rest))
    }) else {
        return Vec::new();
    };
    let line = line
        .trim()
        .replace('λ', &Axis::Channel.tag().to_string())
        .replace("XY", &Axis::Position.tag().to_string());

    let mut out = Vec::new();
    for (token, count) in dimension_tokens(&line) {
        let mut chars = token.chars();
        let axis = match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_tag(c),
            _ => None,
        };
        match axis {
            Some(axis) => out.push((axis, count)),
            None => trace!("skipping unrecognised dimension {token:?} in description"),
        }
    }
    out
}

/// Find every `<word>'?(<digits>)` occurrence in `text`.
fn dimension_tokens(text: &str) -> Vec<(&str, usize)> {
    let mut out = Vec::new();
    for (open, _) in text.match_indices('(') {
        let after = &text[open + 1..];
        let Some(close) = after.find(')') else {
            continue;
        };
        let digits = &after[..close];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let Ok(count) = digits.parse::<usize>() else {
            continue;
        };
        let before = text[..open].strip_suffix('\'').unwrap_or(&text[..open]);
        let start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .last()
            .map(|(i, _)| i);
        if let Some(start) = start {
            out.push((&before[start..], count));
        }
    }
    out
}

/// Resolve the ordered axis sizes of a file.
///
/// Axes named by the description come first, in description order, taking the
/// structured count where one exists; structured-only axes follow.
/// Then come channel, Y, X and (for RGB frames) the colour component.
/// Axes of size 1 are dropped.
pub fn resolve_sizes(
    attributes: &Attributes,
    description: Option<&str>,
    coord_info: &[CoordInfo],
) -> Sizes {
    let text_dims = dims_from_description(description);
    let coord_dims: Sizes = coord_info.iter().map(|c| (c.axis(), c.count)).collect();

    let mut sizes: Sizes = text_dims
        .iter()
        .map(|&(axis, n)| (axis, coord_dims.get(axis).unwrap_or(n)))
        .collect();
    for (axis, n) in coord_dims.iter() {
        if !sizes.contains(axis) {
            sizes.insert(axis, n);
        }
    }

    let channels = sizes
        .remove(Axis::Channel)
        .unwrap_or_else(|| attributes.channels());
    sizes.insert(Axis::Channel, channels);
    // frame axes always trail the coordinate axes
    for axis in [Axis::Y, Axis::X, Axis::Rgb] {
        sizes.remove(axis);
    }
    sizes.insert(Axis::Y, attributes.height_px as usize);
    sizes.insert(Axis::X, attributes.width().unwrap_or(0));

    let components = attributes.components_per_channel();
    if components == 3 {
        sizes.insert(Axis::Rgb, components);
    } else {
        // anything other than RGB is treated as monochrome channels
        sizes.insert(Axis::Channel, attributes.component_count as usize);
    }

    sizes.retain(|&(_, n)| n != 1);
    debug!("resolved sizes {sizes}");
    sizes
}
