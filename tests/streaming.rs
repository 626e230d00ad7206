//! Streaming transcoding through `Read`/`Write` adapters.

use std::io::{Cursor, Read, Write};

use encoding_processor::{
    CancellationToken, Encoding, ErrorKind, Processor, ProcessorConfig, StreamOptions,
};

const SIMPLIFIED: &str = "我们的文件系统在处理中文内容时需要正确识别编码。这是一个关于字符编码的测试。";

/// Yields at most `step` bytes per read, splitting multi-byte sequences.
struct Trickle<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn processor() -> Processor {
    Processor::new(ProcessorConfig::default()).expect("default config is valid")
}

#[test]
fn detected_stream_loses_no_bytes() {
    let gbk = encoding_rs::GBK.encode(&SIMPLIFIED.repeat(20)).0.into_owned();
    let options = StreamOptions {
        buffer_size: 5,
        detection_sample_size: 512,
        ..StreamOptions::default()
    };

    let mut out = Vec::new();
    let result = processor()
        .process_reader_writer(
            Trickle {
                data: &gbk,
                step: 3,
            },
            &mut out,
            &options,
            &CancellationToken::new(),
        )
        .unwrap();

    assert!(matches!(result.source_encoding, Encoding::GBK | Encoding::GB18030));
    assert_eq!(result.bytes_read, gbk.len() as u64);
    assert_eq!(result.bytes_written, out.len() as u64);
    assert_eq!(String::from_utf8(out).unwrap(), SIMPLIFIED.repeat(20));
}

#[test]
fn stream_matches_buffer_conversion() {
    let processor = processor();
    let text = "Grüße aus Köln, 中文, Привет\n".repeat(100);
    let options = StreamOptions {
        source_encoding: Some(Encoding::UTF8),
        target_encoding: Encoding::UTF16BE,
        buffer_size: 7,
        ..StreamOptions::default()
    };

    let mut streamed = Vec::new();
    processor
        .process_reader_writer(
            Cursor::new(text.as_bytes()),
            &mut streamed,
            &options,
            &CancellationToken::new(),
        )
        .unwrap();

    let buffered = processor
        .convert(text.as_bytes(), Encoding::UTF8, Encoding::UTF16BE)
        .unwrap();
    assert_eq!(streamed, buffered);
}

#[test]
fn pre_cancelled_stream_writes_nothing() {
    let token = CancellationToken::new();
    let remote = token.clone();
    remote.cancel();

    let mut out = Vec::new();
    let err = processor()
        .process_reader_writer(
            Cursor::new(b"never read".to_vec()),
            &mut out,
            &StreamOptions {
                source_encoding: Some(Encoding::UTF8),
                ..StreamOptions::default()
            },
            &token,
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(out.is_empty());
}

#[test]
fn reader_and_writer_adapters_compose() {
    let processor = processor();
    let gbk = encoding_rs::GBK.encode(SIMPLIFIED).0.into_owned();

    let mut reader = processor
        .process_reader(Cursor::new(gbk.clone()), Some(Encoding::GBK), Encoding::UTF16LE)
        .unwrap();
    let mut utf16 = Vec::new();
    reader.read_to_end(&mut utf16).unwrap();

    let mut writer = processor.process_writer(Vec::new(), Some(Encoding::UTF16LE), Encoding::GBK);
    for chunk in utf16.chunks(3) {
        writer.write_all(chunk).unwrap();
    }
    let round_tripped = writer.finish().unwrap();

    assert_eq!(round_tripped, gbk);
}
