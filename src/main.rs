//! # EncodingProcessor CLI - Character Encoding Detection and Conversion
//!
//! Command-line interface for detecting the encoding of files or standard
//! input and converting them, either streamed to stdout or rewritten safely
//! on disk.

#[cfg(feature = "cli")]
use std::fs::File;
#[cfg(feature = "cli")]
use std::io::{self, BufReader, BufWriter, Read};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use serde::Serialize;

#[cfg(feature = "cli")]
use encoding_processor::{
    CancellationToken, Encoding, FileProcessOptions, Processor, ProcessorConfig, StreamOptions,
};

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

/// EncodingProcessor: detect and convert character encodings
#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "encoding-processor")]
#[command(version, about, long_about = None)]
#[command(author = "EncodingProcessor Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Convert files between character encodings
    Convert(ConvertArgs),

    /// Detect encoding of input files
    Detect(DetectArgs),

    /// List all supported encodings
    List(ListArgs),

    /// Validate that a file is properly encoded
    Validate(ValidateArgs),

    /// Display detailed information about an encoding
    Info(InfoArgs),
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ConvertArgs {
    /// Source encoding (detected if not specified)
    #[arg(short = 'f', long = "from")]
    from: Option<Encoding>,

    /// Target encoding
    #[arg(short = 't', long = "to", default_value = "UTF-8")]
    to: Encoding,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Convert in-place (rewrite the input file)
    #[arg(long, conflicts_with = "output", requires = "input")]
    in_place: bool,

    /// Skip the backup normally taken before an in-place rewrite
    #[arg(long)]
    no_backup: bool,

    /// Suffix appended to the input path for the backup
    #[arg(long, default_value = ".bak")]
    backup_suffix: String,

    /// Replace an existing output file
    #[arg(long)]
    force: bool,

    /// Detect and report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Fail on the first undecodable or unmappable character
    #[arg(long)]
    strict: bool,

    /// Replacement for undecodable or unmappable characters
    #[arg(long, default_value = "?")]
    replacement: String,

    /// Minimum detection confidence (0.0 - 1.0)
    #[arg(long, default_value = "0.7")]
    min_confidence: f64,

    /// Strip BOM from input
    #[arg(long)]
    strip_bom: bool,

    /// Buffer size for streaming (KB)
    #[arg(long, default_value = "64")]
    buffer_size: usize,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct DetectArgs {
    /// Input files (stdin if none are given)
    inputs: Vec<PathBuf>,

    /// Show every candidate the detector considered
    #[arg(long)]
    confidence: bool,

    /// Maximum bytes to read for detection
    #[arg(long, default_value = "8192")]
    sample_size: usize,

    /// Minimum detection confidence (0.0 - 1.0)
    #[arg(long, default_value = "0.7")]
    min_confidence: f64,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ListArgs {
    /// Filter by category (unicode, cjk, cyrillic, latin)
    #[arg(short, long)]
    category: Option<String>,

    /// Show only ASCII-compatible encodings
    #[arg(long)]
    ascii_compatible: bool,

    /// Show only multibyte encodings
    #[arg(long)]
    multibyte: bool,

    /// Show encoding details
    #[arg(long)]
    details: bool,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ValidateArgs {
    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Expected encoding
    #[arg(short, long)]
    encoding: Encoding,

    /// Show position of first error
    #[arg(long)]
    show_errors: bool,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct InfoArgs {
    /// Encoding to describe
    encoding: Encoding,

    /// Show character mapping samples
    #[arg(long)]
    samples: bool,
}

#[cfg(feature = "cli")]
#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ConversionReport {
    success: bool,
    source_encoding: Encoding,
    target_encoding: Encoding,
    confidence: f64,
    bytes_read: u64,
    bytes_written: u64,
    backup_path: Option<PathBuf>,
    dry_run: bool,
    error_count: usize,
    processing_time_ms: u64,
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Convert(ref args) => convert_command(args, &cli)?,
        Commands::Detect(ref args) => detect_command(args, &cli)?,
        Commands::List(ref args) => list_command(args, &cli)?,
        Commands::Validate(ref args) => validate_command(args, &cli)?,
        Commands::Info(ref args) => info_command(args, &cli)?,
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.
#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "encoding_processor=debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn convert_command(args: &ConvertArgs, cli: &Cli) -> Result<()> {
    let mut config = ProcessorConfig::for_cli();
    config.detector.min_confidence = args.min_confidence;
    config.converter.strict_mode = args.strict;
    config.converter.invalid_char_replacement = args.replacement.clone();
    config.converter.buffer_size = args.buffer_size.max(1) * 1024;
    let processor = Processor::new(config).context("Invalid conversion settings")?;

    let output = if args.in_place {
        args.input.clone()
    } else {
        args.output.clone()
    };

    let report = match (&args.input, output) {
        (Some(input), Some(output)) => {
            let options = FileProcessOptions {
                source_encoding: args.from,
                target_encoding: args.to,
                min_confidence: args.min_confidence,
                create_backup: !args.no_backup,
                backup_suffix: args.backup_suffix.clone(),
                overwrite_existing: args.force,
                dry_run: args.dry_run,
                ..FileProcessOptions::default()
            };
            let result = processor
                .process_file(input, &output, &options)
                .with_context(|| format!("Failed to convert {}", input.display()))?;
            if cli.verbose {
                eprintln!(
                    "{} ({}, {:.1}%) -> {} ({})",
                    input.display(),
                    result.source_encoding,
                    result.confidence * 100.0,
                    output.display(),
                    result.target_encoding
                );
                if let Some(ref backup) = result.backup_path {
                    eprintln!("Backup written to: {}", backup.display());
                }
            }
            ConversionReport {
                success: true,
                source_encoding: result.source_encoding,
                target_encoding: result.target_encoding,
                confidence: result.confidence,
                bytes_read: result.bytes_read,
                bytes_written: result.bytes_written,
                backup_path: result.backup_path,
                dry_run: result.dry_run,
                error_count: result.error_count,
                processing_time_ms: result.processing_time.as_millis() as u64,
            }
        }
        (input, output) => {
            if args.dry_run {
                anyhow::bail!("--dry-run needs both an input and an output file");
            }
            let reader: Box<dyn Read> = match input {
                Some(path) => Box::new(BufReader::new(
                    File::open(path)
                        .with_context(|| format!("Failed to open input file: {}", path.display()))?,
                )),
                None => Box::new(io::stdin().lock()),
            };
            let writer: Box<dyn io::Write> = match output {
                Some(ref path) => {
                    if path.exists() && !args.force {
                        anyhow::bail!("{} exists; pass --force to replace it", path.display());
                    }
                    Box::new(BufWriter::new(File::create(path).with_context(|| {
                        format!("Failed to create output file: {}", path.display())
                    })?))
                }
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };

            let options = StreamOptions {
                source_encoding: args.from,
                target_encoding: args.to,
                buffer_size: args.buffer_size.max(1) * 1024,
                skip_bom: args.strip_bom,
                strict_mode: args.strict,
                ..StreamOptions::default()
            };
            let result = processor
                .process_reader_writer(reader, writer, &options, &CancellationToken::new())
                .context("Conversion failed")?;
            ConversionReport {
                success: true,
                source_encoding: result.source_encoding,
                target_encoding: result.target_encoding,
                confidence: result.confidence,
                bytes_read: result.bytes_read,
                bytes_written: result.bytes_written,
                backup_path: None,
                dry_run: false,
                error_count: result.error_count,
                processing_time_ms: result.processing_time.as_millis() as u64,
            }
        }
    };

    if cli.verbose {
        eprintln!(
            "Processed {} bytes -> {} bytes in {} ms ({} substitutions)",
            report.bytes_read, report.bytes_written, report.processing_time_ms, report.error_count
        );
    }

    // Stdout may already carry the converted bytes.
    let stdout_free = report.dry_run || args.output.is_some() || args.in_place;
    match cli.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            if stdout_free {
                println!("{json}");
            } else {
                eprintln!("{json}");
            }
        }
        OutputFormat::Text => {
            if report.dry_run {
                println!(
                    "Would convert {} -> {} (confidence {:.1}%)",
                    report.source_encoding,
                    report.target_encoding,
                    report.confidence * 100.0
                );
            } else if cli.verbose || stdout_free {
                eprintln!("✓ Conversion completed successfully");
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn detect_command(args: &DetectArgs, cli: &Cli) -> Result<()> {
    let mut config = ProcessorConfig::for_cli();
    config.detector.sample_size = args.sample_size;
    config.detector.min_confidence = args.min_confidence;
    let processor = Processor::new(config).context("Invalid detection settings")?;

    let mut results = Vec::new();
    if args.inputs.is_empty() {
        let mut buffer = Vec::with_capacity(args.sample_size);
        io::stdin()
            .lock()
            .take(args.sample_size as u64)
            .read_to_end(&mut buffer)
            .context("Failed to read from stdin")?;
        let result = processor.detect(&buffer).context("Detection failed")?;
        results.push(("-".to_string(), result));
    } else {
        for path in &args.inputs {
            let result = processor
                .detect_file(path)
                .with_context(|| format!("Failed to detect {}", path.display()))?;
            results.push((path.display().to_string(), result));
        }
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<_> = results
                .iter()
                .map(|(input, result)| {
                    serde_json::json!({
                        "input": input,
                        "detected_encoding": result.encoding,
                        "confidence": result.confidence,
                        "language": result.language,
                        "bom_detected": result.bom_detected,
                        "diagnostics": result.diagnostics,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            for (input, result) in &results {
                if results.len() > 1 {
                    println!("{input}:");
                }
                println!("Detected encoding: {}", result.encoding);
                println!("Confidence: {:.1}%", result.confidence * 100.0);
                if let Some(ref language) = result.language {
                    println!("Language: {language}");
                }
                if result.bom_detected {
                    println!("BOM detected: Yes");
                }
                println!("Method: {}", result.diagnostics.method.as_str());

                if args.confidence && !result.diagnostics.candidates.is_empty() {
                    println!("\nAll candidates:");
                    for candidate in &result.diagnostics.candidates {
                        println!(
                            "  {}: {:.1}% (oracle {:.1}%{})",
                            candidate.encoding,
                            candidate.score * 100.0,
                            candidate.oracle_confidence * 100.0,
                            if candidate.decodable { "" } else { ", undecodable" }
                        );
                    }
                }
                if results.len() > 1 {
                    println!();
                }
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn category(encoding: Encoding) -> &'static str {
    if encoding.is_unicode() {
        "unicode"
    } else if encoding.is_legacy_cjk() {
        "cjk"
    } else if encoding.language_hint() == Some("ru") || encoding == Encoding::ISO_8859_5 {
        "cyrillic"
    } else {
        "latin"
    }
}

#[cfg(feature = "cli")]
fn list_command(args: &ListArgs, cli: &Cli) -> Result<()> {
    let filtered: Vec<Encoding> = Encoding::ALL
        .into_iter()
        .filter(|encoding| {
            args.category
                .as_deref()
                .is_none_or(|filter| filter.eq_ignore_ascii_case(category(*encoding)))
        })
        .filter(|encoding| !args.ascii_compatible || encoding.is_ascii_compatible())
        .filter(|encoding| !args.multibyte || encoding.is_multibyte())
        .collect();

    match cli.format {
        OutputFormat::Json => {
            let encodings_info: Vec<_> = filtered
                .iter()
                .map(|encoding| {
                    serde_json::json!({
                        "name": encoding.name(),
                        "category": category(*encoding),
                        "description": get_encoding_description(*encoding),
                        "ascii_compatible": encoding.is_ascii_compatible(),
                        "multibyte": encoding.is_multibyte(),
                        "has_bom": encoding.bom().is_some()
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&encodings_info)?);
        }
        OutputFormat::Text => {
            println!("Supported Encodings ({} total):", filtered.len());
            println!();

            for encoding in filtered {
                println!(
                    "{:15} {:10} {}",
                    encoding.name(),
                    format!("[{}]", category(encoding)),
                    get_encoding_description(encoding)
                );

                if args.details {
                    println!(
                        "                ASCII Compatible: {}",
                        yes_no(encoding.is_ascii_compatible())
                    );
                    println!("                Multibyte: {}", yes_no(encoding.is_multibyte()));
                    if let Some(bom) = encoding.bom() {
                        println!("                BOM: {:02X?}", bom);
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn validate_command(args: &ValidateArgs, cli: &Cli) -> Result<()> {
    let encoding = args.encoding;

    let input_data = if let Some(ref input_path) = args.input {
        std::fs::read(input_path)
            .with_context(|| format!("Failed to read input file: {}", input_path.display()))?
    } else {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    };

    let processor = Processor::new(ProcessorConfig::strict())?;
    if processor.validate(&input_data, encoding) {
        match cli.format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "valid": true, "encoding": encoding })
            ),
            OutputFormat::Text => println!("✓ File is valid {}", encoding.name()),
        }
        return Ok(());
    }

    // A strict conversion pinpoints the first bad sequence.
    let error = processor
        .convert_to_utf8(&input_data, encoding)
        .err()
        .map(|err| err.to_string());
    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "valid": false, "encoding": encoding, "error": error })
        ),
        OutputFormat::Text => {
            println!("✗ File is not valid {}", encoding.name());
            if args.show_errors {
                if let Some(error) = error {
                    println!("  Error: {error}");
                }
            }
        }
    }
    std::process::exit(1);
}

#[cfg(feature = "cli")]
fn info_command(args: &InfoArgs, cli: &Cli) -> Result<()> {
    let encoding = args.encoding;

    match cli.format {
        OutputFormat::Json => {
            let info = serde_json::json!({
                "name": encoding.name(),
                "category": category(encoding),
                "ascii_compatible": encoding.is_ascii_compatible(),
                "multibyte": encoding.is_multibyte(),
                "language": encoding.language_hint(),
                "bom": encoding.bom().map(|b| format!("{:02X?}", b)),
                "description": get_encoding_description(encoding)
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Text => {
            println!("Encoding Information: {}", encoding.name());
            println!("Description: {}", get_encoding_description(encoding));
            println!("ASCII Compatible: {}", yes_no(encoding.is_ascii_compatible()));
            println!("Multibyte: {}", yes_no(encoding.is_multibyte()));
            if let Some(language) = encoding.language_hint() {
                println!("Language: {language}");
            }

            if let Some(bom) = encoding.bom() {
                println!("BOM: {:02X?}", bom);
            } else {
                println!("BOM: None");
            }

            if args.samples {
                println!("\nCharacter Samples:");
                print_character_samples(encoding)?;
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

#[cfg(feature = "cli")]
fn get_encoding_description(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::UTF8 => "Unicode Transformation Format 8-bit, variable-length encoding",
        Encoding::UTF16LE => "Unicode Transformation Format 16-bit, little-endian",
        Encoding::UTF16BE => "Unicode Transformation Format 16-bit, big-endian",
        Encoding::UTF32LE => "Unicode Transformation Format 32-bit, little-endian",
        Encoding::UTF32BE => "Unicode Transformation Format 32-bit, big-endian",
        Encoding::GBK => "Simplified Chinese, GB2312 extension",
        Encoding::GB18030 => "Simplified Chinese, full Unicode coverage",
        Encoding::BIG5 => "Traditional Chinese",
        Encoding::SHIFT_JIS => "Japanese, Shift JIS",
        Encoding::EUC_JP => "Japanese, Extended Unix Code",
        Encoding::EUC_KR => "Korean, Extended Unix Code",
        Encoding::ISO_8859_1 => "Latin alphabet No. 1, Western European",
        Encoding::ISO_8859_2 => "Latin alphabet No. 2, Central European",
        Encoding::ISO_8859_5 => "Latin/Cyrillic alphabet",
        Encoding::ISO_8859_15 => "Latin alphabet No. 9, Western European with Euro symbol",
        Encoding::WINDOWS_1250 => "Windows code page for Central and Eastern European languages",
        Encoding::WINDOWS_1251 => "Windows code page for Cyrillic scripts",
        Encoding::WINDOWS_1252 => "Windows code page for Western European languages",
        Encoding::WINDOWS_1254 => "Windows code page for Turkish",
        Encoding::KOI8_R => "Russian Cyrillic, KOI8-R",
        Encoding::CP_866 => "DOS Cyrillic code page",
        Encoding::MAC_ROMAN => "Classic Macintosh Roman character encoding",
    }
}

/// Encode a few representative characters and print their byte sequences.
#[cfg(feature = "cli")]
fn print_character_samples(encoding: Encoding) -> Result<()> {
    let samples: &[char] = match category(encoding) {
        "cjk" => match encoding {
            Encoding::SHIFT_JIS | Encoding::EUC_JP => &['A', 'あ', '日', '本'],
            Encoding::EUC_KR => &['A', '한', '국', '어'],
            _ => &['A', '中', '文', '字'],
        },
        "cyrillic" => &['A', 'Д', 'ж', 'я'],
        "unicode" => &['A', 'é', '中', '😀'],
        _ => &['A', 'é', 'ß', 'ü'],
    };

    let processor = Processor::new(ProcessorConfig::strict())?;
    for ch in samples {
        let text = ch.to_string();
        match processor.convert_string(&text, encoding) {
            Ok(bytes) => println!("  {ch} -> {:02X?}", bytes),
            Err(_) => println!("  {ch} -> (not representable)"),
        }
    }
    Ok(())
}
