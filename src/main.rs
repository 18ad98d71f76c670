//! # fast-text CLI
//!
//! Converts files between the encodings the library understands and reports
//! on the converters behind them.

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::{self, Read, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use serde::Serialize;

#[cfg(feature = "cli")]
use fast_text::options::SubstitutePolicy;
#[cfg(feature = "cli")]
use fast_text::{ConversionOptions, Encoding, Error as TextError, Width, decode, encode_to_vec, registry};

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

/// fast-text: convert text between character encodings
#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "fast-text")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Convert a file from one encoding to another
    Convert(ConvertArgs),

    /// List every supported encoding
    List(ListArgs),

    /// Check that a file decodes cleanly
    Validate(ValidateArgs),

    /// Describe one encoding and its converter
    Info(InfoArgs),
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ConvertArgs {
    /// Source encoding
    #[arg(short = 'f', long = "from")]
    from: Encoding,

    /// Target encoding
    #[arg(short = 't', long = "to")]
    to: Encoding,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Substitute instead of failing on unconvertible input
    #[arg(long)]
    lossy: bool,

    /// Byte written for unconvertible characters with --lossy
    #[arg(long, default_value = "?")]
    replacement: String,

    /// Prefix the output with the target encoding's BOM
    #[arg(long)]
    add_bom: bool,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ListArgs {
    /// Show only ASCII-compatible encodings
    #[arg(long)]
    ascii_compatible: bool,

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
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct InfoArgs {
    /// Encoding to describe
    encoding: Encoding,
}

#[cfg(feature = "cli")]
#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ConversionResult {
    from: Encoding,
    to: Encoding,
    bytes_read: usize,
    code_units: usize,
    width: Width,
    bytes_written: usize,
    processing_time_ms: u64,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct EncodingInfo {
    name: Encoding,
    id: String,
    converter: &'static str,
    ascii_compatible: bool,
    unicode: bool,
    max_bytes_per_unit: usize,
    bom: Option<String>,
}

#[cfg(feature = "cli")]
impl EncodingInfo {
    fn new(encoding: Encoding) -> Self {
        let wrapper = registry::lookup(encoding);
        let max_bytes_per_unit = match encoding {
            Encoding::UTF32 | Encoding::UTF32BE | Encoding::UTF32LE => 4,
            Encoding::UTF16 | Encoding::UTF16BE | Encoding::UTF16LE => 2,
            _ => wrapper.map_or(0, |wrapper| wrapper.max_bytes_per_unit()),
        };
        Self {
            name: encoding,
            id: format!("0x{:08X}", encoding.id()),
            converter: wrapper.map_or("unicode fast path", |wrapper| wrapper.shape_name()),
            ascii_compatible: encoding.is_ascii_compatible(),
            unicode: encoding.is_unicode(),
            max_bytes_per_unit,
            bom: encoding.bom().map(|bom| format!("{bom:02X?}")),
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ValidationResult {
    encoding: Encoding,
    valid: bool,
    bytes: usize,
    error: Option<String>,
    error_offset: Option<usize>,
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Convert(ref args) => convert_command(args, &cli)?,
        Commands::List(ref args) => list_command(args, &cli)?,
        Commands::Validate(ref args) => validate_command(args, &cli)?,
        Commands::Info(ref args) => info_command(args, &cli)?,
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn read_input(input: Option<&PathBuf>) -> Result<Vec<u8>> {
    if let Some(path) = input {
        log::debug!("reading from {}", path.display());
        return fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()));
    }
    log::debug!("reading from stdin");
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer).context("Failed to read from stdin")?;
    Ok(buffer)
}

#[cfg(feature = "cli")]
fn convert_command(args: &ConvertArgs, cli: &Cli) -> Result<()> {
    let start_time = std::time::Instant::now();
    log::debug!("converting from {} to {}", args.from, args.to);

    let (decode_options, encode_options) = if args.lossy {
        let replacement = match args.replacement.as_bytes() {
            &[byte] if byte.is_ascii() => byte,
            _ => anyhow::bail!("Replacement must be a single ASCII character: {:?}", args.replacement),
        };
        (
            ConversionOptions::new().with_lossy(SubstitutePolicy::Fallback),
            ConversionOptions::lossy(replacement),
        )
    } else {
        (ConversionOptions::new(), ConversionOptions::new())
    };

    let input_data = read_input(args.input.as_ref())?;
    let text = decode(&input_data, args.from, &decode_options)
        .with_context(|| format!("Failed to decode input as {}", args.from))?;
    let mut output_data = encode_to_vec(&text, .., args.to, &encode_options)
        .with_context(|| format!("Failed to encode output as {}", args.to))?;

    if args.add_bom {
        if let Some(bom) = args.to.bom() {
            let mut with_bom = bom.to_vec();
            with_bom.append(&mut output_data);
            output_data = with_bom;
        }
    }

    if let Some(ref output_path) = args.output {
        fs::write(output_path, &output_data)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        log::debug!("wrote {}", output_path.display());
    } else {
        io::stdout().write_all(&output_data).context("Failed to write to stdout")?;
    }

    let processing_time = start_time.elapsed();
    log::debug!(
        "processed {} bytes -> {} units -> {} bytes in {:?}",
        input_data.len(),
        text.len(),
        output_data.len(),
        processing_time
    );

    match cli.format {
        OutputFormat::Json => {
            let result = ConversionResult {
                from: args.from,
                to: args.to,
                bytes_read: input_data.len(),
                code_units: text.len(),
                width: text.width(),
                bytes_written: output_data.len(),
                processing_time_ms: u64::try_from(processing_time.as_millis()).unwrap_or(u64::MAX),
            };
            let report = serde_json::to_string_pretty(&result)?;
            // Converted bytes own stdout unless they went to a file.
            if args.output.is_some() {
                println!("{report}");
            } else {
                eprintln!("{report}");
            }
        }
        OutputFormat::Text => {
            if args.output.is_some() {
                eprintln!(
                    "✓ Converted {} bytes of {} to {} bytes of {}",
                    input_data.len(),
                    args.from,
                    output_data.len(),
                    args.to
                );
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn list_command(args: &ListArgs, cli: &Cli) -> Result<()> {
    let encodings: Vec<EncodingInfo> = Encoding::builtin()
        .filter(|encoding| !args.ascii_compatible || encoding.is_ascii_compatible())
        .map(EncodingInfo::new)
        .collect();

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&encodings)?);
        }
        OutputFormat::Text => {
            println!("Supported Encodings ({} total):", encodings.len());
            println!();

            for info in &encodings {
                println!("{:15} {:12} [{}]", info.name, info.id, info.converter);

                if args.details {
                    println!("                ASCII Compatible: {}", yes_no(info.ascii_compatible));
                    println!("                Unicode: {}", yes_no(info.unicode));
                    println!("                Max bytes per unit: {}", info.max_bytes_per_unit);
                    if let Some(ref bom) = info.bom {
                        println!("                BOM: {bom}");
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
    let input_data = read_input(args.input.as_ref())?;

    let outcome = decode(&input_data, args.encoding, &ConversionOptions::new());
    let (error, error_offset) = match outcome {
        Ok(_) => (None, None),
        Err(TextError::InvalidInput { consumed, .. }) => (Some("invalid byte sequence".to_string()), Some(consumed)),
        Err(TextError::UnknownEncoding(encoding)) => anyhow::bail!("No converter for {encoding}"),
        Err(e) => (Some(e.to_string()), None),
    };
    let result = ValidationResult {
        encoding: args.encoding,
        valid: error.is_none(),
        bytes: input_data.len(),
        error,
        error_offset,
    };

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            if result.valid {
                println!("✓ Input is valid {}", result.encoding);
            } else {
                println!("✗ Input is not valid {}", result.encoding);
                match (&result.error, result.error_offset) {
                    (Some(error), Some(offset)) => println!("  Error at byte {offset}: {error}"),
                    (Some(error), None) => println!("  Error: {error}"),
                    _ => {}
                }
            }
        }
    }

    if !result.valid {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn info_command(args: &InfoArgs, cli: &Cli) -> Result<()> {
    let info = EncodingInfo::new(args.encoding);

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Text => {
            println!("Encoding Information: {}", info.name);
            println!("Identifier: {}", info.id);
            println!("Converter: {}", info.converter);
            println!("ASCII Compatible: {}", yes_no(info.ascii_compatible));
            println!("Unicode: {}", yes_no(info.unicode));
            println!("Max bytes per unit: {}", info.max_bytes_per_unit);
            println!("BOM: {}", info.bom.as_deref().unwrap_or("None"));
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}
