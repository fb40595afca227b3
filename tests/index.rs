use zarrs_nd2::index::{coords_from_index, index_from_coords};

#[test]
fn test_round_trip() {
    let shape = [3, 4, 2];
    for i in 0..24 {
        let coords = coords_from_index(i, &shape);
        assert_eq!(index_from_coords(&coords, &shape), Some(i));
    }
}

#[test]
fn test_last_axis_fastest() {
    let shape = [3, 4];
    assert_eq!(coords_from_index(1, &shape), vec![0, 1]);
    assert_eq!(coords_from_index(4, &shape), vec![1, 0]);
    assert_eq!(index_from_coords(&[2, 3], &shape), Some(11));
}

#[test]
fn test_no_coordinate_axes() {
    assert_eq!(index_from_coords(&[], &[]), None);
    assert_eq!(coords_from_index(0, &[]), Vec::<usize>::new());
}

#[test]
#[should_panic]
fn test_coordinate_out_of_range() {
    index_from_coords(&[3, 0], &[3, 4]);
}

#[test]
#[should_panic]
fn test_index_out_of_range() {
    coords_from_index(12, &[3, 4]);
}
