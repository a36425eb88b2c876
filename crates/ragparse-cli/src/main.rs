//! ragparse CLI - parse documents into normalized content lists.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use ragparse_parser::{get_parser, ParseMethod, ParseOptions, SUPPORTED_PARSERS};
use ragparse_pipeline::{BatchParser, Processor, ProcessorConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragparse",
    about = "Parse documents into normalized content lists",
    long_about = "Parse PDFs, images, DOCX and plain text into a normalized JSON content list.\n\
                  \n\
                  Two parser backends are available: 'ocr' (rasterizes pages and runs the\n\
                  ONNX OCR engine) and 'native' (extracts the embedded text layer directly).",
    version
)]
struct Args {
    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed processing information
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse one document and print its content list as JSON
    Parse {
        /// Input file path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Parser backend (see `ragparse parsers`)
        #[arg(short, long, default_value = "ocr")]
        parser: String,

        /// Extraction method: auto, ocr, or text
        #[arg(short, long, default_value = "auto")]
        method: ParseMethod,

        /// Also write the content list to this directory as <stem>.json
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Log block-count statistics after parsing
        #[arg(long)]
        stats: bool,

        /// Report the document by full path instead of file name
        #[arg(long)]
        full_path: bool,

        /// Compact JSON output (no pretty-printing)
        #[arg(long)]
        compact: bool,
    },

    /// Parse every supported file in a directory
    Batch {
        /// Input directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Parser backend (see `ragparse parsers`)
        #[arg(short, long, default_value = "ocr")]
        parser: String,

        /// Extraction method: auto, ocr, or text
        #[arg(short, long, default_value = "auto")]
        method: ParseMethod,

        /// OCR language hint (e.g. "en")
        #[arg(short, long)]
        lang: Option<String>,

        /// Skip the up-front installation check and let files fail individually
        #[arg(long)]
        skip_installation_check: bool,
    },

    /// Check which parser backends are fully installed
    Check {
        /// Check a single parser instead of all of them
        #[arg(value_name = "PARSER")]
        parser: Option<String>,
    },

    /// List the available parser backends
    Parsers,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.quiet, args.verbose);

    match args.command {
        Commands::Parse {
            input,
            parser,
            method,
            output_dir,
            stats,
            full_path,
            compact,
        } => {
            if !input.is_file() {
                eprintln!(
                    "{} Input file not found: {}",
                    "Error:".red().bold(),
                    input.display()
                );
                std::process::exit(1);
            }

            let processor = Processor::new(ProcessorConfig {
                parser,
                parser_output_dir: output_dir,
                parse_method: method,
                display_content_stats: stats,
                use_full_path: full_path,
            })?;

            let runtime = tokio::runtime::Runtime::new()?;
            let (content_list, doc_id) = runtime.block_on(processor.parse_document(&input))?;

            if !args.quiet {
                eprintln!(
                    "{} {} ({} blocks, id {})",
                    "Parsed".green().bold(),
                    input.display(),
                    content_list.len(),
                    doc_id
                );
            }
            let json = if compact {
                serde_json::to_string(&content_list)?
            } else {
                serde_json::to_string_pretty(&content_list)?
            };
            println!("{json}");
        }

        Commands::Batch {
            dir,
            parser,
            method,
            lang,
            skip_installation_check,
        } => {
            if !dir.is_dir() {
                eprintln!(
                    "{} Not a directory: {}",
                    "Error:".red().bold(),
                    dir.display()
                );
                std::process::exit(1);
            }

            let batch = BatchParser::new(parser, !args.quiet, skip_installation_check);
            let mut opts = ParseOptions::default().with_method(method);
            if let Some(lang) = lang {
                opts = opts.with_lang(lang);
            }
            let summary = batch.process_directory(&dir, &opts)?;

            for (path, blocks) in &summary.succeeded {
                println!("{} {} ({blocks} blocks)", "ok".green(), path.display());
            }
            for (path, message) in &summary.failed {
                println!("{} {} ({message})", "failed".red(), path.display());
            }
            eprintln!(
                "{} {} ok, {} failed",
                "Batch:".bold(),
                summary.succeeded.len(),
                summary.failed.len()
            );
            if !summary.all_succeeded() {
                std::process::exit(1);
            }
        }

        Commands::Check { parser } => {
            let ids: Vec<&str> = match parser.as_deref() {
                Some(id) => vec![id],
                None => SUPPORTED_PARSERS.to_vec(),
            };
            let mut all_ok = true;
            for id in ids {
                let backend = get_parser(id)?;
                if backend.check_installation() {
                    println!("{} {id}", "installed".green());
                } else {
                    println!("{} {id}", "missing".red());
                    all_ok = false;
                }
            }
            if !all_ok {
                std::process::exit(1);
            }
        }

        Commands::Parsers => {
            for id in SUPPORTED_PARSERS {
                println!("{id}");
            }
        }
    }

    Ok(())
}

fn init_logger(quiet: bool, verbose: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
