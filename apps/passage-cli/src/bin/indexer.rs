//! `passage-indexer`: bulk-ingest every text file under a directory.
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use walkdir::WalkDir;

use passage_cli::app::AppContext;
use passage_cli::init_logging;
use passage_core::traits::PlainTextExtractor;
use passage_vector::ingest_file;

#[derive(Parser)]
#[command(name = "passage-indexer", version, about = "Ingest a directory tree of text files")]
struct Cli {
    /// Directory to scan recursively
    source: PathBuf,

    /// File extensions to ingest
    #[arg(long = "ext", default_values = ["txt", "md"])]
    extensions: Vec<String>,

    /// Stop after this many files
    #[arg(long)]
    limit: Option<usize>,

    /// Re-ingest files whose text is unchanged
    #[arg(long)]
    force: bool,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(&e)))
}

fn collect_files(root: &Path, extensions: &[String], limit: Option<usize>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, extensions))
        .collect();
    files.sort();
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    files
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if !cli.source.is_dir() {
        bail!("{} is not a directory", cli.source.display());
    }
    let ctx = AppContext::load(cli.config.as_deref(), cli.data_dir.clone())?;
    let files = collect_files(&cli.source, &cli.extensions, cli.limit);
    info!(source = %cli.source.display(), files = files.len(), data_dir = %ctx.data_dir.display(), "indexing");

    let embedder = ctx.embedder()?;
    let options = ctx.ingest_options()?.with_force(cli.force);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let (mut ingested, mut unchanged, mut failed, mut chunks) = (0usize, 0usize, 0usize, 0usize);
    for file in &files {
        pb.set_message(file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
        match ingest_file(embedder.as_ref(), &PlainTextExtractor, file, &options) {
            Ok(report) if report.skipped => unchanged += 1,
            Ok(report) => {
                ingested += 1;
                chunks += report.total_chunks;
            }
            Err(err) => {
                failed += 1;
                pb.suspend(|| warn!(file = %file.display(), %err, "ingest failed"));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Indexed {} file(s) into {}", files.len(), ctx.data_dir.display());
    println!("  ingested:  {ingested} ({chunks} chunks)");
    println!("  unchanged: {unchanged}");
    println!("  failed:    {failed}");
    if failed > 0 {
        bail!("{failed} file(s) failed to ingest");
    }
    Ok(())
}
