//! Shared-processor behaviour across threads.

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use encoding_processor::{Encoding, ErrorKind, FileProcessOptions, Processor, ProcessorConfig};

#[test]
fn concurrent_detection_agrees() {
    let processor = Arc::new(Processor::new(ProcessorConfig::default()).unwrap());
    let data: Arc<[u8]> = Arc::from(&b"caf\xE9 cr\xE8me br\xFBl\xE9e, cr\xEApes et g\xE2teaux"[..]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let data = Arc::clone(&data);
            thread::spawn(move || processor.detect(&data).unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = &results[0];
    for (i, result) in results.iter().enumerate().skip(1) {
        assert_eq!(first, result, "thread {i} disagreed");
    }
    let stats = processor.cache_stats().unwrap();
    assert_eq!(stats.entries, 1);
}

#[test]
fn same_destination_never_races() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.txt");
    let text = "Grüße ".repeat(200_000);
    fs::write(&path, encoding_rs::WINDOWS_1252.encode(&text).0).unwrap();

    let processor = Arc::new(Processor::new(ProcessorConfig::default()).unwrap());
    let barrier = Arc::new(Barrier::new(4));
    let options = FileProcessOptions {
        source_encoding: Some(Encoding::WINDOWS_1252),
        create_backup: false,
        ..FileProcessOptions::default()
    };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            let options = options.clone();
            thread::spawn(move || {
                barrier.wait();
                processor.process_file_in_place(&path, &options)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(outcomes.iter().any(Result::is_ok));
    for outcome in &outcomes {
        if let Err(err) = outcome {
            assert_eq!(err.kind(), ErrorKind::Locked, "{err}");
        }
    }

    // Each successful call read a complete file, never a half-written one.
    let content = fs::read(&path).unwrap();
    assert!(String::from_utf8(content).is_ok());
}
