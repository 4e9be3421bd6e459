use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use bibmark::Processor;
use bibmark::app::build::{SiteBuilder, write_output};
use bibmark::app::check::check_docs;
use bibmark::app::scan::DocsScanner;
use bibmark::bib::latex::to_text;
use bibmark::infra::config::Config;

#[derive(Parser)]
#[command(author, version, about = "BibTeX citations and bibliographies for Markdown", long_about = None)]
struct Cli {
    /// Configuration file: a bibmark TOML file or an mkdocs.yml
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// BibTeX file to use instead of the configured sources
    #[arg(long, global = true)]
    bib_file: Option<PathBuf>,
    /// Fail on citation keys missing from the bibliography
    #[arg(long, global = true)]
    strict: bool,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single Markdown page
    Render {
        /// Page to process, or `-` for stdin
        input: PathBuf,
        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Process every page of a docs tree into an output directory
    Build {
        #[arg(long)]
        docs: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Report citation keys that are missing from the bibliography
    Check {
        #[arg(long)]
        docs: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List bibliography entries
    Keys {
        #[arg(long)]
        json: bool,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    bibmark::init(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "bibmark", &mut io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Render { input, output } => render(&config, input, output),
        Commands::Build { docs, out } => build(&config, docs, out),
        Commands::Check { docs, json } => check(&config, docs, json),
        Commands::Keys { json } => keys(&config, json),
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bib_file) = &cli.bib_file {
        config.bibtex.bib_file = Some(bib_file.clone());
        config.bibtex.bib_dir = None;
    }
    if cli.strict {
        config.bibtex.set_strict(true);
    }
    Ok(config)
}

fn render(config: &Config, input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let source = if input.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read page from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&input)
            .with_context(|| format!("failed to read page {}", input.display()))?
    };

    let mut processor = Processor::new(&config.bibtex)?;
    let rendered = processor.process_page(&source)?;
    match output {
        Some(path) => write_output(&path, &rendered),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn build(config: &Config, docs: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let docs = docs.unwrap_or_else(|| config.docs.dir());
    let out = out.unwrap_or_else(|| config.docs.out_dir());
    let scanner = DocsScanner::new(docs).with_ignore(config.docs.ignore.clone());

    let mut processor = Processor::new(&config.bibtex)?;
    let report = SiteBuilder::new(scanner, out).build(&mut processor)?;
    println!(
        "processed {} page(s), {} citation(s), {} reference(s) -> {}",
        report.pages,
        report.citations,
        report.references,
        report.output_dir.display()
    );
    Ok(())
}

fn check(config: &Config, docs: Option<PathBuf>, json: bool) -> Result<()> {
    let docs = docs.unwrap_or_else(|| config.docs.dir());
    let scanner = DocsScanner::new(docs).with_ignore(config.docs.ignore.clone());
    let processor = Processor::new(&config.bibtex)?;
    let missing = check_docs(&scanner, &processor)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&missing)?);
    } else {
        for item in &missing {
            println!("{}:{}: unknown citation key '{}'", item.page, item.line, item.key);
        }
    }
    if !missing.is_empty() {
        bail!("{} unknown citation key(s)", missing.len());
    }
    Ok(())
}

#[derive(Serialize)]
struct KeyListing {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    year: Option<String>,
}

fn keys(config: &Config, json: bool) -> Result<()> {
    let processor = Processor::new(&config.bibtex)?;
    let listing: Vec<KeyListing> = processor
        .bibliography()
        .iter()
        .map(|entry| KeyListing {
            key: entry.key.clone(),
            kind: entry.kind.clone(),
            title: entry.field("title").map(to_text),
            year: entry.field("year").map(to_text),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }
    for item in listing {
        println!(
            "{}\t{}\t{}",
            item.key,
            item.kind,
            item.title.unwrap_or_default()
        );
    }
    Ok(())
}
