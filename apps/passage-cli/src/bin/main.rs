//! `passage`: ingest documents and query them.
//!
//! ```bash
//! passage ingest notes/phishing.txt
//! passage query phishing.txt "how do attackers steal passwords" -k 3 --mode hybrid
//! passage answer phishing.txt "what blunts stolen passwords?"
//! passage summarize phishing.txt
//! passage list --json
//! ```
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use passage_cli::app::{AppContext, RequestArgs};
use passage_cli::{init_logging, output};
use passage_core::artifacts::{delete_document, list_documents};
use passage_core::traits::PlainTextExtractor;
use passage_hybrid::answer::{DEFAULT_INTRO_CHUNKS, DEFAULT_QUESTION_COUNT};
use passage_vector::ingest_file;

#[derive(Parser)]
#[command(name = "passage", version, about = "Hybrid semantic + keyword retrieval over ingested documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read settings from this TOML file only
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Artifact directory (default: data.dir from settings)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store text files
    Ingest {
        files: Vec<PathBuf>,
        /// Re-ingest even if the text is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Retrieve the best chunks of a document
    Query {
        filename: String,
        query: String,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Answer a question from retrieved chunks
    Answer {
        filename: String,
        question: String,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Summarize a document
    Summarize {
        filename: String,
        /// Opening chunks always included in the context
        #[arg(long, default_value_t = DEFAULT_INTRO_CHUNKS)]
        intro_chunks: usize,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Suggest questions the document can answer
    Questions {
        filename: String,
        #[arg(short = 'n', long, default_value_t = DEFAULT_QUESTION_COUNT)]
        count: usize,
    },
    /// List ingested documents
    List,
    /// Remove a document's artifacts
    Delete { filename: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = AppContext::load(cli.config.as_deref(), cli.data_dir.clone())?;

    match cli.command {
        Command::Ingest { files, force } => {
            let embedder = ctx.embedder()?;
            let options = ctx.ingest_options()?.with_force(force).with_progress(!cli.json);
            let mut reports = Vec::with_capacity(files.len());
            for file in &files {
                let report = ingest_file(embedder.as_ref(), &PlainTextExtractor, file, &options)?;
                if !cli.json {
                    println!("{}", output::format_report(&report));
                }
                reports.push(report);
            }
            if cli.json {
                print_json(&reports)?;
            }
        }
        Command::Query { filename, query, request } => {
            let request = ctx.request(&query, &request);
            let results = ctx.engine()?.retrieve_document(&ctx.data_dir, &filename, &request)?;
            if cli.json {
                print_json(&results)?;
            } else {
                print!("{}", output::format_results(&query, &results));
            }
        }
        Command::Answer { filename, question, request } => {
            let request = ctx.request(&question, &request);
            let answer = ctx.assistant()?.answer(&filename, &request)?;
            if cli.json {
                print_json(&answer)?;
            } else {
                println!("{}\n", answer.answer);
                let cited: Vec<String> = answer.citations.iter().map(|c| c.chunk_id.to_string()).collect();
                println!("Sources: chunks {}", cited.join(", "));
            }
        }
        Command::Summarize { filename, intro_chunks, request } => {
            // The overview query replaces whatever is passed here.
            let request = ctx.request("overview", &request);
            let summary = ctx.assistant()?.summarize(&filename, intro_chunks, &request)?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("{}", summary.summary);
            }
        }
        Command::Questions { filename, count } => {
            let questions = ctx.assistant()?.sample_questions(&filename, count)?;
            if cli.json {
                print_json(&questions)?;
            } else {
                for q in questions {
                    println!("- {q}");
                }
            }
        }
        Command::List => {
            let docs = list_documents(&ctx.data_dir)?;
            if cli.json {
                print_json(&docs)?;
            } else {
                println!("{}", output::format_documents(&docs));
            }
        }
        Command::Delete { filename } => {
            let removed = delete_document(&ctx.data_dir, &filename)?;
            if cli.json {
                print_json(&removed)?;
            } else {
                for path in removed {
                    println!("removed {}", path.display());
                }
            }
        }
    }
    Ok(())
}
