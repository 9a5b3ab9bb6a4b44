use anyhow::{Context, Result};
use clap::Parser;
use std::ffi::OsString;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use jpick::input;
use jpick::{OutputConfig, Query};

#[derive(Parser)]
#[command(
    name = "jpick",
    about = "Select values from a JSON stream by path",
    version
)]
struct Cli {
    /// Path expression, e.g. `.items[*]{.id,.name}`
    selector: OsString,

    /// Input file(s); defaults to stdin. `-` reads stdin.
    files: Vec<String>,

    /// Match every value of a concatenated or newline-delimited stream
    #[arg(short = 's', long)]
    stream: bool,

    /// Raw output (selected strings without quotes)
    #[arg(short = 'r', long = "raw-output")]
    raw: bool,

    /// Separate outputs with a NUL byte
    #[arg(short = '0', long = "null-separator")]
    null_separator: bool,

    /// Write no separator between outputs
    #[arg(short = 'j', long = "join-output")]
    join_output: bool,

    /// Separator written after every output
    #[arg(short = 'd', long, default_value = "\n", value_name = "STRING")]
    delimiter: OsString,

    /// Flush after every output
    #[arg(short = 'f', long, visible_alias = "unbuffered")]
    flush: bool,
}

impl Cli {
    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            raw: self.raw,
            separator: self.delimiter.as_encoded_bytes().to_vec(),
            null_separator: self.null_separator,
            join_output: self.join_output,
            unbuffered: self.flush,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let query = match jpick::compile(cli.selector.as_encoded_bytes()) {
        Ok(query) => query,
        Err(err) => {
            // Printed bare so the caret lines up under the expression.
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &query) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("jpick: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, query: &Query) -> Result<()> {
    let config = cli.output_config();
    let stdout = io::stdout().lock();
    let mut out = BufWriter::with_capacity(128 * 1024, stdout);

    let stdin = ["-".to_string()];
    let files = if cli.files.is_empty() {
        &stdin[..]
    } else {
        &cli.files[..]
    };

    for path in files {
        let name = input::display_name(path);
        let reader = input::open(path)?;
        let emitted = if cli.stream {
            jpick::match_stream(reader, query, &config, &mut out)
        } else {
            jpick::match_once(reader, query, &config, &mut out)
        }
        .with_context(|| format!("failed to process {name}"))?;
        log::debug!("{name}: {emitted} values selected");
    }

    out.flush().context("failed to write output")?;
    Ok(())
}
