//! Integration tests for metadata scanning over on-disk artifacts

use onda_aotreg::{scan_path, MetadataKinds, ScanConfig, ScanError};
use onda_meta::{encode_artifact, ClassRecord, MethodRecord, ModuleMeta, HEADER_LEN};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_artifact(dir: &Path, file: &str, meta: Option<&ModuleMeta>, code: &[u8]) {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, encode_artifact(meta, code)).unwrap();
}

fn app_module() -> ModuleMeta {
    ModuleMeta::new("acme.app")
        .with_source_file("app/main.on")
        .with_class(
            ClassRecord::new("acme.app.Greeter")
                .with_super("onda.rt.Object")
                .with_annotation("onda.cli.Command")
                .with_constructor(0)
                .with_method(MethodRecord::new("greet", 1)),
        )
        .with_class(
            ClassRecord::new("acme.app.Greeter$c0")
                .with_super("onda.rt.Object")
                .with_interface("onda.rt.CompiledClosure")
                .with_constructor(2),
        )
}

fn runtime_module() -> ModuleMeta {
    ModuleMeta::new("onda.rt")
        .with_class(ClassRecord::new("onda.rt.Object"))
        .with_class(ClassRecord::new("onda.rt.ExtMethod"))
        .with_class(ClassRecord::new("onda.rt.ext$7").with_super("onda.rt.ExtMethod"))
}

#[test]
fn test_scan_indexes_classes_under_prefixes() {
    let temp = TempDir::new().unwrap();
    write_artifact(temp.path(), "app.onb", Some(&app_module()), b"app code");
    write_artifact(temp.path(), "rt.onb", Some(&runtime_module()), b"rt code");

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();

    assert_eq!(session.modules_scanned(), 2);
    assert_eq!(session.len(), 2);
    assert!(session.contains("acme.app.Greeter"));
    assert!(session.contains("acme.app.Greeter$c0"));
    assert!(!session.contains("onda.rt.ext$7"));

    let greeter = session.get("acme.app.Greeter").unwrap();
    assert_eq!(greeter.module, "acme.app");
    assert!(greeter.has_annotation("onda.cli.Command"));
}

#[test]
fn test_prefix_matches_namespace_not_string() {
    let temp = TempDir::new().unwrap();
    let meta = ModuleMeta::new("mixed")
        .with_class(ClassRecord::new("acme.app.Inside"))
        .with_class(ClassRecord::new("acme.application.Outside"));
    write_artifact(temp.path(), "mixed.onb", Some(&meta), &[]);

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();

    assert!(session.contains("acme.app.Inside"));
    assert!(!session.contains("acme.application.Outside"));
}

#[test]
fn test_nested_directories_are_walked() {
    let temp = TempDir::new().unwrap();
    write_artifact(temp.path(), "libs/deep/app.onb", Some(&app_module()), &[]);

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();
    assert_eq!(session.len(), 2);
}

#[test]
fn test_multiple_module_path_entries() {
    let app_dir = TempDir::new().unwrap();
    let rt_dir = TempDir::new().unwrap();
    write_artifact(app_dir.path(), "app.onb", Some(&app_module()), &[]);
    write_artifact(rt_dir.path(), "rt.onb", Some(&runtime_module()), &[]);

    let config = ScanConfig::new(
        vec!["acme.app".to_string(), "onda.rt".to_string()],
        MetadataKinds::all(),
    );
    let session = scan_path(
        &[app_dir.path().to_path_buf(), rt_dir.path().to_path_buf()],
        &config,
    )
    .unwrap();

    assert_eq!(session.modules_scanned(), 2);
    assert!(session.contains("acme.app.Greeter"));
    assert!(session.contains("onda.rt.ext$7"));
}

#[test]
fn test_artifacts_without_metadata_are_skipped() {
    let temp = TempDir::new().unwrap();
    write_artifact(temp.path(), "app.onb", Some(&app_module()), &[]);
    write_artifact(temp.path(), "bare.onb", None, b"code only");

    let config = ScanConfig::new(vec!["acme".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();

    // The bare artifact contributes no module.
    assert_eq!(session.modules_scanned(), 1);
    assert_eq!(session.len(), 2);
}

#[test]
fn test_non_artifact_files_are_ignored() {
    let temp = TempDir::new().unwrap();
    write_artifact(temp.path(), "app.onb", Some(&app_module()), &[]);
    fs::write(temp.path().join("notes.txt"), "not an artifact").unwrap();
    fs::write(temp.path().join("data.json"), "{}").unwrap();

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();
    assert_eq!(session.modules_scanned(), 1);
}

#[test]
fn test_code_section_is_never_decoded() {
    // The code section holds whatever the compiler put there. Scanning must
    // succeed regardless, because only the metadata block is read.
    let temp = TempDir::new().unwrap();
    let garbage = vec![0xFF; 4096];
    write_artifact(temp.path(), "app.onb", Some(&app_module()), &garbage);

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();
    assert_eq!(session.len(), 2);
}

#[test]
fn test_corrupted_metadata_block_names_the_artifact() {
    let temp = TempDir::new().unwrap();
    let mut bytes = encode_artifact(Some(&app_module()), b"code");
    bytes[HEADER_LEN] ^= 0xFF;
    let path = temp.path().join("broken.onb");
    fs::write(&path, bytes).unwrap();

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let err = scan_path(&[temp.path().to_path_buf()], &config).unwrap_err();
    match err {
        ScanError::InvalidArtifact { path: reported, .. } => {
            assert_eq!(reported, path);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_truncated_artifact_names_the_artifact() {
    let temp = TempDir::new().unwrap();
    let bytes = encode_artifact(Some(&app_module()), b"code");
    // Cut into the metadata block.
    let path = temp.path().join("cut.onb");
    fs::write(&path, &bytes[..HEADER_LEN + 4]).unwrap();

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let err = scan_path(&[temp.path().to_path_buf()], &config).unwrap_err();
    match err {
        ScanError::Io { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_module_path_yields_empty_session() {
    let temp = TempDir::new().unwrap();
    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();
    assert!(session.is_empty());
    assert_eq!(session.modules_scanned(), 0);
}

#[test]
fn test_duplicate_class_across_modules_keeps_first() {
    let temp = TempDir::new().unwrap();
    let first = ModuleMeta::new("first")
        .with_class(ClassRecord::new("acme.app.Dup").with_constructor(1));
    let second = ModuleMeta::new("second")
        .with_class(ClassRecord::new("acme.app.Dup").with_constructor(3));
    // Glob walks in lexical order.
    write_artifact(temp.path(), "a_first.onb", Some(&first), &[]);
    write_artifact(temp.path(), "b_second.onb", Some(&second), &[]);

    let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
    let session = scan_path(&[temp.path().to_path_buf()], &config).unwrap();
    assert_eq!(session.len(), 1);
    assert_eq!(session.get("acme.app.Dup").unwrap().module, "first");
}
