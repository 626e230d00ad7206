//! End-to-end file rewriting through the public facade.

use std::fs;
use std::path::Path;

use encoding_processor::{Encoding, Error, FileOp, FileProcessOptions, Processor, ProcessorConfig};

const SIMPLIFIED: &str = "我们的文件系统在处理中文内容时需要正确识别编码。这是一个关于字符编码的测试，\
    中国的很多老系统仍然使用国标编码保存文本，所以转换工具必须能够分辨这些字节到底属于哪一种编码。";

fn processor() -> Processor {
    Processor::new(ProcessorConfig::default()).expect("default config is valid")
}

fn gbk_fixture(dir: &Path, name: &str) -> (std::path::PathBuf, Vec<u8>) {
    let path = dir.join(name);
    let bytes = encoding_rs::GBK.encode(SIMPLIFIED).0.into_owned();
    fs::write(&path, &bytes).unwrap();
    (path, bytes)
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn in_place_backup_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let (path, original) = gbk_fixture(dir.path(), "notes.txt");

    let result = processor()
        .process_file_in_place(&path, &FileProcessOptions::default())
        .unwrap();

    let backup = result.backup_path.expect("backup is on by default");
    assert_eq!(fs::read(&backup).unwrap(), original);
    assert_eq!(fs::read_to_string(&path).unwrap(), SIMPLIFIED);
    assert!(matches!(result.source_encoding, Encoding::GBK | Encoding::GB18030));
    assert_eq!(entries(dir.path()), vec!["notes.txt", "notes.txt.bak"]);
}

#[test]
fn existing_output_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = gbk_fixture(dir.path(), "in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&output, b"precious").unwrap();
    let before = entries(dir.path());

    let err = processor()
        .process_file(&input, &output, &FileProcessOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::FileIo { op: FileOp::OverwriteCheck, .. }), "{err}");
    assert_eq!(fs::read(&output).unwrap(), b"precious");
    assert_eq!(entries(dir.path()), before);
}

#[test]
fn convert_to_another_legacy_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = gbk_fixture(dir.path(), "in.txt");
    let output = dir.path().join("nested/deeper/out.txt");

    let options = FileProcessOptions::to_encoding(Encoding::UTF16LE);
    let result = processor().process_file(&input, &output, &options).unwrap();

    let written = fs::read(&output).unwrap();
    assert_eq!(written.len() as u64, result.bytes_written);
    let (decoded, _, had_errors) = encoding_rs::UTF_16LE.decode(&written);
    assert!(!had_errors);
    assert_eq!(decoded, SIMPLIFIED);
    assert!(result.backup_path.is_none());
}

#[test]
fn already_target_encoding_is_copied_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("utf8.txt");
    let output = dir.path().join("copy.txt");
    fs::write(&input, SIMPLIFIED).unwrap();

    let result = processor()
        .process_file(&input, &output, &FileProcessOptions::default())
        .unwrap();

    assert!(!result.converted);
    assert_eq!(result.source_encoding, Encoding::UTF8);
    assert_eq!(fs::read(&output).unwrap(), SIMPLIFIED.as_bytes());
}

#[test]
fn dry_run_reports_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let (path, original) = gbk_fixture(dir.path(), "notes.txt");

    let options = FileProcessOptions {
        dry_run: true,
        ..FileProcessOptions::default()
    };
    let result = processor().process_file_in_place(&path, &options).unwrap();

    assert!(result.dry_run);
    assert!(result.converted);
    assert_eq!(fs::read(&path).unwrap(), original);
    assert_eq!(entries(dir.path()), vec!["notes.txt"]);
}

#[test]
fn file_detection_and_size_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = gbk_fixture(dir.path(), "notes.txt");

    let result = processor().detect_file(&path).unwrap();
    assert!(matches!(result.encoding, Encoding::GBK | Encoding::GB18030));

    let config = ProcessorConfig {
        max_file_size: 16,
        ..ProcessorConfig::default()
    };
    let err = Processor::new(config)
        .unwrap()
        .process_file_in_place(&path, &FileProcessOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::FileIo { op: FileOp::SizeCheck, .. }), "{err}");

    let missing = processor().detect_file(dir.path().join("missing.txt")).unwrap_err();
    assert!(matches!(missing, Error::FileIo { op: FileOp::Read, .. }), "{missing}");
}
