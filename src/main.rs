use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};
use pe_probe::ProbeOptions;
use std::fs::File;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(short, long)]
    input: String,

    /// Fail on malformed imports or resources instead of warning
    #[arg(short, long)]
    strict: bool,

    #[arg(short, long)]
    verbose: bool,
}

/// Writes log records to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() -> Result<()> {
    let args = Args::parse();

    log::set_logger(&LOGGER).context("Failed to install logger")?;
    log::set_max_level(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    let file = File::open(&args.input).with_context(|| format!("Failed to open {}", args.input))?;
    let options = ProbeOptions {
        strict: args.strict,
    };
    let info = pe_probe::probe(&file, options)
        .with_context(|| format!("Failed to probe {}", args.input))?;

    let arch = match info.architecture.as_str() {
        "" => "unknown",
        arch => arch,
    };
    println!("Architecture: {arch}");

    println!("Imports: {}", info.imports.len());
    for import in &info.imports {
        println!("  {import}");
    }

    if let Some(fixed) = &info.fixed_file_info {
        println!("File version: {}", fixed.file_version_string());
        println!("Product version: {}", fixed.product_version_string());
    }

    for table in &info.string_tables {
        println!(
            "String table: language {:#06x}, code page {}",
            table.language, table.code_page
        );
    }

    println!("Version properties: {}", info.version_properties.len());
    for (key, value) in &info.version_properties {
        println!("  {key}: {value}");
    }

    Ok(())
}
