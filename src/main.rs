// SPDX-License-Identifier: MIT
use clap::{Parser, ValueEnum};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;
use vcdquery::convert::{Converter, ConverterOptions};
use vcdquery::store::Store;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Lossless JSON dump of the parsed AST.
    Json,
    /// Convert into a persistent SQLite signal store.
    Store,
    /// Convert, then emit the signal catalogue as CSV.
    Csv,
}

#[derive(Parser, Debug)]
#[command(version, about = "Parses a VCD waveform file and converts it into a queryable signal store")]
struct Cli {
    /// Value Change Dump (VCD) file to parse.
    input: PathBuf,

    /// Where to write the result. Defaults to stdout for `json`, required for `store`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Optional TOML file providing a `ConverterOptions` base, overridden by --max-tx.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of writes per transaction when converting into a store.
    #[arg(long)]
    max_tx: Option<usize>,
}

fn resolve_converter_options(cli: &Cli) -> Result<ConverterOptions, Box<dyn Error>> {
    let mut options = match &cli.config {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => ConverterOptions::default(),
    };
    if let Some(max_tx) = cli.max_tx {
        options.max_tx = max_tx;
    }
    Ok(options)
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let file = File::open(&cli.input)?;
    let reader = BufReader::new(file);
    let vcd_file = vcdquery::vcd::parse(reader)?;

    match cli.format {
        OutputFormat::Json => {
            if let Some(path) = &cli.output {
                let out = File::create(path)?;
                serde_json::to_writer_pretty(out, &vcd_file)?;
            } else {
                serde_json::to_writer_pretty(io::stdout().lock(), &vcd_file)?;
            }
        }
        OutputFormat::Store => {
            let options = resolve_converter_options(&cli)?;
            let path = cli
                .output
                .ok_or("store format requires --output <path>")?;
            let store = Store::open(path.to_str().ok_or("output path must be valid UTF-8")?)?;
            Converter::new(&store, options).convert(&vcd_file)?;
        }
        OutputFormat::Csv => {
            let options = resolve_converter_options(&cli)?;
            let store = Store::open_in_memory()?;
            Converter::new(&store, options).convert(&vcd_file)?;
            if let Some(path) = &cli.output {
                vcdquery::catalogue::write_csv(&store, File::create(path)?)?;
            } else {
                vcdquery::catalogue::write_csv(&store, io::stdout().lock())?;
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
