//! Command-line driver for the rvload image loader.
//!
//! This binary exposes the loader library as four subcommands:
//! 1. **load:** Load an ELF, ZBI or raw image into a memory map built from defaults or a JSON config.
//! 2. **entry:** Print the entry point recorded in an ELF header.
//! 3. **symbol:** Print the address of one named symbol.
//! 4. **symbols:** List every defined symbol of an executable.
//!
//! Any loader error is reported on stderr and ends the process with a non-zero status.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rvload_core::config::{LoadConfig, LoaderConfig};
use rvload_core::formats::ImageFormat;
use rvload_core::sim::loader::{self, LoadSummary};

#[derive(Parser, Debug)]
#[command(
    name = "rvload",
    author,
    version,
    about = "Load program images into simulated memory",
    long_about = "Load ELF executables, ZBI boot images or raw binaries into a simulated memory map, \
                  or query an executable's entry point and symbols.\n\nExamples:\n  \
                  rvload load kernel.zbi --offset 0x80000000 --config board.json\n  \
                  rvload load prog.elf -- --flag value\n  \
                  rvload symbol prog.elf tohost"
)]
struct Cli {
    /// Log per-region detail (overrides `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load an image and print what was placed.
    Load {
        /// Image to load.
        path: PathBuf,

        /// Offset added to every destination address (decimal or 0x-prefixed hex).
        #[arg(long, value_parser = parse_address)]
        offset: Option<u64>,

        /// Image format; detected from the file contents when omitted.
        #[arg(long, value_parser = parse_format)]
        format: Option<ImageFormat>,

        /// JSON memory/load configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Program arguments; when present the image is loaded as an ELF with an argument block.
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print the entry point of an ELF executable.
    Entry {
        /// Executable to inspect.
        path: PathBuf,
    },

    /// Print the address of a symbol.
    Symbol {
        /// Executable to inspect.
        path: PathBuf,
        /// Symbol name.
        name: String,
    },

    /// List the defined symbols of an executable.
    Symbols {
        /// Executable to inspect.
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Load {
            path,
            offset,
            format,
            config,
            args,
        } => cmd_load(&path, offset, format, config.as_deref(), args),
        Commands::Entry { path } => loader::entry_point(&path)
            .map(|entry| println!("{entry:#x}"))
            .map_err(Into::into),
        Commands::Symbol { path, name } => loader::symbol_location(&path, &name)
            .map(|addr| println!("{addr:#x}"))
            .map_err(Into::into),
        Commands::Symbols { path } => cmd_symbols(&path),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// Installs the stderr subscriber. `-v` forces `debug`; otherwise `RUST_LOG` or `warn` applies.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds memory from `config` (or defaults), loads the image and prints the summary.
///
/// Command-line `offset` and `format` take precedence over the config's `load` section.
/// Trailing `args` switch to the argument-vector ELF load, where the image path is `argv[0]`.
fn cmd_load(
    path: &Path,
    offset: Option<u64>,
    format: Option<ImageFormat>,
    config: Option<&Path>,
    args: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(p) => LoaderConfig::from_file(p)?,
        None => LoaderConfig::default(),
    };
    let mut memory = config.build_memory()?;

    let summary = if args.is_empty() {
        let offset = offset.unwrap_or(config.load.offset);
        let format = format.or(config.load.format);
        loader::load_image(path, offset, format, &mut memory)?
    } else {
        check_argument_load(offset, format, &config.load)?;
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(path.display().to_string());
        argv.extend(args);
        loader::load_elf_with_args(&argv, &mut memory)?
    };

    print_summary(&summary);
    Ok(())
}

/// Argument-vector loads always place an ELF at offset zero; reject settings that say otherwise.
fn check_argument_load(
    offset: Option<u64>,
    format: Option<ImageFormat>,
    load: &LoadConfig,
) -> Result<(), String> {
    if format.or(load.format).is_some_and(|f| f != ImageFormat::Elf) {
        return Err("program arguments require an ELF image".to_string());
    }
    if offset.is_some() || load.offset != 0 {
        return Err("program arguments cannot be combined with a load offset".to_string());
    }
    Ok(())
}

fn cmd_symbols(path: &Path) -> Result<(), Box<dyn Error>> {
    for sym in loader::symbols(path)? {
        let size = sym.size.map_or_else(|| "-".to_string(), |s| s.to_string());
        let binding = format!("{:?}", sym.binding);
        println!("{:#018x} {size:>8} {binding:<8} {}", sym.value, sym.name);
    }
    Ok(())
}

fn print_summary(summary: &LoadSummary) {
    println!("format: {}", summary.format);
    match summary.entry {
        Some(entry) => println!("entry:  {entry:#x}"),
        None => println!("entry:  -"),
    }
    for region in &summary.regions {
        let kind = format!("{:?}", region.kind);
        println!(
            "  {kind:<10} {:#012x}..{:#012x} copied {:>8} zeroed {:>8}",
            region.range.start,
            region.range.end(),
            region.copied,
            region.range.len - region.copied
        );
    }
    println!("total:  {} bytes", summary.bytes_written());
}

/// Parses a decimal or `0x`-prefixed hexadecimal address.
fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address `{s}`: {e}"))
}

fn parse_format(s: &str) -> Result<ImageFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "elf" => Ok(ImageFormat::Elf),
        "zbi" => Ok(ImageFormat::Zbi),
        "raw" | "bin" => Ok(ImageFormat::Raw),
        _ => Err(format!("unknown format `{s}` (expected elf, zbi or raw)")),
    }
}
