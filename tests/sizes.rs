mod common;

use common::attributes;
use zarrs_nd2::Axis;
use zarrs_nd2::metadata::CoordInfo;
use zarrs_nd2::sizes::{dims_from_description, resolve_sizes};

fn coord(index: usize, loop_type: &str, count: usize) -> CoordInfo {
    CoordInfo {
        index,
        loop_type: loop_type.to_string(),
        count,
    }
}

fn entries(sizes: &zarrs_nd2::Sizes) -> Vec<(Axis, usize)> {
    sizes.iter().collect()
}

#[test]
fn test_structured_only() {
    let coords = [coord(0, "ZStackLoop", 3), coord(1, "TimeLoop", 4)];
    let sizes = resolve_sizes(&attributes(64, 64, 2, 2), None, &coords);
    assert_eq!(
        entries(&sizes),
        vec![
            (Axis::Z, 3),
            (Axis::Time, 4),
            (Axis::Channel, 2),
            (Axis::Y, 64),
            (Axis::X, 64),
        ]
    );
    assert_eq!(sizes.to_string(), "{Z: 3, T: 4, C: 2, Y: 64, X: 64}");
}

#[test]
fn test_rgb_components() {
    let attrs = attributes(16, 8, 3333333, 9999999);
    let sizes = resolve_sizes(&attrs, None, &[]);
    assert_eq!(sizes.get(Axis::Rgb), Some(3));
    assert_eq!(sizes.get(Axis::Channel), Some(3333333));
    assert_eq!(
        sizes.axes(),
        vec![Axis::Channel, Axis::Y, Axis::X, Axis::Rgb]
    );
}

#[test]
fn test_single_channel_rgb() {
    let sizes = resolve_sizes(&attributes(16, 8, 1, 3), None, &[]);
    assert_eq!(
        entries(&sizes),
        vec![(Axis::Y, 16), (Axis::X, 8), (Axis::Rgb, 3)]
    );
}

#[test]
fn test_non_rgb_components_become_channels() {
    let sizes = resolve_sizes(&attributes(16, 8, 2, 4), None, &[]);
    assert_eq!(sizes.get(Axis::Channel), Some(4));
    assert!(!sizes.contains(Axis::Rgb));
}

#[test]
fn test_parse_description() {
    let dims = dims_from_description(Some(
        "Metadata:\r\nDimensions: T(3) x XY(2) x λ(2) x Z(3)\r\nCamera Name: Foo\r\n",
    ));
    assert_eq!(
        dims,
        vec![
            (Axis::Time, 3),
            (Axis::Position, 2),
            (Axis::Channel, 2),
            (Axis::Z, 3),
        ]
    );
}

#[test]
fn test_parse_description_edge_cases() {
    assert!(dims_from_description(None).is_empty());
    assert!(dims_from_description(Some("no dimensions here")).is_empty());
    assert_eq!(
        dims_from_description(Some("Dimensions: Z'(4) x Ring(7) x T(2)")),
        vec![(Axis::Z, 4), (Axis::Time, 2)]
    );
}

#[test]
fn test_parse_description_digits_only() {
    assert_eq!(
        dims_from_description(Some("Dimensions: T(+3) x Z(-2) x C( 4) x P(5)")),
        vec![(Axis::Position, 5)]
    );
}

#[test]
fn test_description_order_and_structured_counts() {
    let coords = [
        coord(0, "ZStackLoop", 4),
        coord(1, "XYPosLoop", 2),
        coord(2, "TimeLoop", 5),
    ];
    let sizes = resolve_sizes(
        &attributes(32, 32, 1, 1),
        Some("Dimensions: T(3) x Z(5)"),
        &coords,
    );
    // text order first, structured counts win, structured-only axes appended
    assert_eq!(
        entries(&sizes),
        vec![
            (Axis::Time, 5),
            (Axis::Z, 4),
            (Axis::Position, 2),
            (Axis::Y, 32),
            (Axis::X, 32),
        ]
    );
}

#[test]
fn test_channel_from_description_moves_to_end() {
    let sizes = resolve_sizes(
        &attributes(32, 32, 2, 2),
        Some("Dimensions: λ(2) x T(3)"),
        &[coord(0, "TimeLoop", 3)],
    );
    assert_eq!(
        sizes.axes(),
        vec![Axis::Time, Axis::Channel, Axis::Y, Axis::X]
    );
}

#[test]
fn test_unit_axes_dropped() {
    let coords = [coord(0, "ZStackLoop", 1), coord(1, "TimeLoop", 6)];
    let sizes = resolve_sizes(&attributes(1, 20, 1, 1), None, &coords);
    assert!(sizes.iter().all(|(_, n)| n != 1));
    assert_eq!(entries(&sizes), vec![(Axis::Time, 6), (Axis::X, 20)]);
    assert_eq!(sizes.frame_count(), 6);
}

#[test]
fn test_width_from_row_stride() {
    let mut attrs = attributes(10, 0, 1, 1);
    attrs.width_px = None;
    attrs.width_bytes = Some(128);
    let sizes = resolve_sizes(&attrs, None, &[]);
    assert_eq!(sizes.get(Axis::X), Some(64));

    attrs.width_bytes = None;
    let sizes = resolve_sizes(&attrs, None, &[]);
    assert_eq!(sizes.get(Axis::X), Some(0));
}
