mod common;

use std::io::Write;

use common::{FixtureBackend, write_fixture, write_with_magic, zt_fixture};
use zarrs_nd2::backend::{BackendPlugin, ContainerKind, LEGACY_MAGIC, MODERN_MAGIC};
use zarrs_nd2::{Error, Nd2File};

inventory::submit! {
    BackendPlugin::new(ContainerKind::Legacy, "json-fixture-legacy", FixtureBackend::create)
}

#[test]
fn test_detect_kind() {
    let modern = write_fixture(&zt_fixture());
    let legacy = write_with_magic(&LEGACY_MAGIC, &zt_fixture());

    assert_eq!(ContainerKind::detect(modern.path()).unwrap(), ContainerKind::Modern);
    assert_eq!(ContainerKind::detect(legacy.path()).unwrap(), ContainerKind::Legacy);

    let file = Nd2File::open(legacy.path()).unwrap();
    assert!(file.is_legacy());
    assert_eq!(file.kind(), ContainerKind::Legacy);
    assert_eq!(file.frame_count().unwrap(), 12);

    let file = Nd2File::open(modern.path()).unwrap();
    assert!(!file.is_legacy());
}

#[test]
fn test_magic_round_trip() {
    for kind in [ContainerKind::Modern, ContainerKind::Legacy] {
        assert_eq!(ContainerKind::from_magic(&kind.magic()), Some(kind));
    }
    assert_eq!(ContainerKind::from_magic(&MODERN_MAGIC[..3]), None);
    assert_eq!(ContainerKind::Legacy.to_string(), "legacy");
}

#[test]
fn test_unrecognized_signature() {
    let tmp = write_with_magic(b"\x89PNG", &zt_fixture());
    assert!(!Nd2File::is_supported_file(tmp.path()).unwrap());

    let err = Nd2File::open(tmp.path()).unwrap_err();
    match &err {
        Error::UnrecognizedSignature { path, magic } => {
            assert_eq!(path, tmp.path());
            assert_eq!(magic, b"\x89PNG");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("not recognized as ND2"));
}

#[test]
fn test_short_file() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&[0xda, 0xce]).unwrap();
    tmp.flush().unwrap();
    assert!(!Nd2File::is_supported_file(tmp.path()).unwrap());
    assert!(matches!(
        Nd2File::open(tmp.path()),
        Err(Error::UnrecognizedSignature { .. })
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.nd2");
    assert!(matches!(
        Nd2File::is_supported_file(&path),
        Err(Error::Io(_))
    ));
    assert!(matches!(Nd2File::open(&path), Err(Error::Io(_))));
}
