use anyhow::{Context, Result};
use clap::Parser;
use pegmark::{Extension, Options, render};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Convert Markdown to HTML.
#[derive(Parser)]
#[command(name = "pegmark", version, about)]
struct Cli {
    /// Markdown file to read; stdin when omitted.
    input: Option<PathBuf>,

    /// Enable an extension (repeatable, or comma separated).
    #[arg(short = 'x', long = "extension", value_delimiter = ',')]
    extensions: Vec<Extension>,

    /// JSON document of extension flags, e.g. `{"smart": true}`.
    #[arg(long)]
    options: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut options = match &cli.options {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading options from {}", path.display()))?;
            Options::from_json(&json)
                .with_context(|| format!("parsing options from {}", path.display()))?
        }
        None => Options::default(),
    };
    for extension in cli.extensions {
        options = options.with(extension);
    }

    let text = match &cli.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            text
        }
    };

    let html = render(&text, &options);
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{html}").context("writing output")?;
    Ok(())
}
