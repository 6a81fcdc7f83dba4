//! Extract the packet-test IR from a Scapy generator script.
//!
//! Usage:
//!   scapy_ir [OPTIONS] <FILE>
//!
//! The IR is printed to stdout as JSON. Logs and diagnostics go to stderr;
//! `RUST_LOG` overrides the level chosen by `--verbose`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use scapy_ir::{extract_file, ExtractorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Generator script to read
    file: PathBuf,

    /// Log discovered helpers, variables and emit calls
    #[arg(short, long)]
    verbose: bool,

    /// Print the IR on a single line
    #[arg(long)]
    compact: bool,

    /// TOML file overriding function names, layer vocabulary and address keys
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,
}

fn init_logger(verbose: bool) {
    let default = if verbose { "scapy_ir=debug" } else { "scapy_ir=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config = match &cli.config {
        Some(path) => ExtractorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExtractorConfig::default(),
    };

    let extraction =
        extract_file(&cli.file, &config).with_context(|| format!("extracting {}", cli.file.display()))?;
    if !extraction.diagnostics.is_empty() {
        tracing::info!(count = extraction.diagnostics.len(), "constructs skipped");
    }

    let json = extraction.ir.to_json(!cli.compact).context("serializing IR")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json).context("writing IR")?;
    Ok(())
}
