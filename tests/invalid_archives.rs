use std::{fs, path::Path};

use image_inspect::{ErrorKind, InspectError, Inspector};

mod common;

use common::{
    archives::{Archive, Image},
    events::Recorder,
};

fn run_test(image: Image) -> InspectError {
    let dir = tempfile::tempdir().unwrap();
    let archive = image.write(dir.path());

    Inspector::new(dir.path().join("root"))
        .inspect_archive("test", &archive)
        .expect_err("Inspection must fail")
}

#[test]
fn entries_outside_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");

    let archive = Image::new("amd64", "linux")
        .layer(
            Archive::new()
                .raw_regular("../escape", "x")
                .raw_regular("a/../../../escape2", "x")
                .raw_regular("../root-sibling/f", "x")
                .regular("inside", "y"),
        )
        .write(dir.path());

    let recorder = Recorder::default();

    let description = Inspector::new(&root)
        .event_handler(&recorder)
        .inspect_archive("test", &archive)
        .expect("Skip invalid entries");

    for path in ["escape", "escape2", "root-sibling"] {
        assert!(!dir.path().join(path).exists(), "{path}");
    }

    assert!(!description
        .files
        .iter()
        .any(|f| f.to_str().unwrap().contains("escape")));

    assert!(description.files.contains(&root.join("inside")));

    let skipped: Vec<_> = recorder
        .skipped
        .borrow()
        .iter()
        .map(|(path, _)| path.to_str().unwrap().to_owned())
        .collect();

    assert_eq!(
        skipped,
        ["../escape", "a/../../../escape2", "../root-sibling/f"]
    );
}

#[test]
fn file_larger_than_limit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");

    let archive = dir.path().join("image.tar");
    let data = Archive::new()
        .regular("small", "0123")
        .regular("large", "0123456789abcdef")
        .build();

    fs::write(&archive, data).unwrap();

    let err = Inspector::new(&root)
        .max_file_size(8)
        .inspect_archive("test", &archive)
        .unwrap_err();

    assert!(matches!(err, InspectError::FileTooLarge { limit: 8, .. }));
    assert_eq!(err.kind(), ErrorKind::ArchiveRead);

    assert_eq!(fs::read(root.join("small")).unwrap(), b"0123");
    assert!(!root.join("large").exists());
}

#[test]
fn malformed_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("image.tar");
    fs::write(&archive, [b'A'; 1024]).unwrap();

    let err = Inspector::new(dir.path().join("root"))
        .inspect_archive("test", &archive)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveRead);
}

#[test]
fn missing_archive() {
    let dir = tempfile::tempdir().unwrap();

    let err = Inspector::new(dir.path())
        .inspect_archive("test", Path::new("/nonexistent/image.tar"))
        .unwrap_err();

    assert!(matches!(err, InspectError::Io(_, ref path) if path == Path::new("/nonexistent/image.tar")));
}

#[test]
fn multiple_manifest_records() {
    let image = Image::new("amd64", "linux").layer(Archive::new().regular("f", "x"));

    let record = format!(r#"{{"Config": "{}", "RepoTags": []}}"#, image.config_file());
    let image = image.manifest(format!("[{record}, {record}]"));

    let err = run_test(image);
    assert!(matches!(err, InspectError::ManifestRecords(2)));
    assert_eq!(err.kind(), ErrorKind::ManifestCardinality);
}

#[test]
fn empty_manifest() {
    let err = run_test(Image::new("amd64", "linux").manifest("[]"));
    assert!(matches!(err, InspectError::ManifestRecords(0)));
}

#[test]
fn manifest_replaced_by_layer() {
    // A layer with a `/manifest.json` file is found twice in the inventory.
    let image = Image::new("amd64", "linux").layer(Archive::new().regular("manifest.json", "[]"));

    let err = run_test(image);
    assert!(matches!(err, InspectError::ManifestFiles(2)));
}

#[test]
fn missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("image.tar");
    fs::write(&archive, Archive::new().regular("etc/manifest.json", "[]").build()).unwrap();

    let err = Inspector::new(dir.path().join("root"))
        .inspect_archive("test", &archive)
        .unwrap_err();

    assert!(matches!(err, InspectError::ManifestFiles(0)));
    assert_eq!(err.kind(), ErrorKind::ManifestCardinality);
}

#[test]
fn invalid_manifest_json() {
    let err = run_test(Image::new("amd64", "linux").manifest(r#"[{"Config": 1}]"#));
    assert!(matches!(err, InspectError::Metadata { .. }));
    assert_eq!(err.kind(), ErrorKind::MetadataParse);
}

#[test]
fn config_without_os() {
    let err = run_test(Image::with_config(r#"{"architecture": "amd64"}"#));
    assert!(matches!(err, InspectError::Metadata { .. }));
}

#[test]
fn config_with_empty_os() {
    let err = run_test(Image::with_config(r#"{"architecture": "amd64", "os": ""}"#));
    assert!(matches!(err, InspectError::MissingPlatform(_)));
    assert_eq!(err.kind(), ErrorKind::MetadataParse);
}

#[test]
fn config_with_invalid_digest() {
    let name = format!("{:064}.json", 0);
    let err = run_test(Image::new("amd64", "linux").config_name(&name));

    match err {
        InspectError::ConfigDigest { expected, .. } => assert_eq!(expected, format!("{:064}", 0)),
        e => panic!("Unexpected error: {e:?}"),
    }
}

#[test]
fn config_outside_root() {
    let image = Image::new("amd64", "linux");
    let image = image.manifest(r#"[{"Config": "../../etc/passwd", "RepoTags": []}]"#);

    let err = run_test(image);
    assert!(matches!(err, InspectError::InvalidConfigPath(_)));
}

#[test]
fn nested_layers_limit() {
    let inner = Archive::new().regular("f", "x").build();
    let layer = Archive::new().regular("nested/layer.tar", inner);

    let dir = tempfile::tempdir().unwrap();
    let archive = Image::new("amd64", "linux").layer(layer).write(dir.path());

    let err = Inspector::new(dir.path().join("root"))
        .max_depth(1)
        .inspect_archive("test", &archive)
        .unwrap_err();

    assert!(matches!(err, InspectError::NestingTooDeep { limit: 1, .. }));
}
