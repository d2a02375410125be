use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use medical_chatbot::app::{connect_index, load_embedder};
use medical_chatbot::config::Settings;
use medical_chatbot::indexer::chunker::Splitter;
use medical_chatbot::indexer::index_file;
use medical_chatbot::indexer::walker::find_sources;
use medical_chatbot::logging;
use medical_chatbot::rag::embeddings::Embedder;

#[derive(Parser, Debug)]
#[command(name = "store-index")]
#[command(about = "Load documents into the chatbot's existing vector index")]
struct Args {
    /// Directory to recursively index (.pdf, .txt, .md)
    #[arg(short, long, default_value = "data")]
    dir: PathBuf,

    /// Index (or Qdrant collection) name; overrides INDEX_NAME
    #[arg(long, env = "INDEX_NAME")]
    index_name: Option<String>,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    /// Overlap between chunks in characters
    #[arg(long, default_value_t = 20)]
    chunk_overlap: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut settings = Settings::load()?;
    if let Some(name) = args.index_name.clone() {
        settings.index_name = name;
    }
    settings.validate()?;

    if !args.dir.exists() {
        anyhow::bail!("Directory does not exist: {}", args.dir.display());
    }
    let splitter = Splitter::new(args.chunk_size, args.chunk_overlap)?;

    println!("Initializing embedding model...");
    let embedder = load_embedder(&settings)?;

    println!("Connecting to index `{}`...", settings.index_name);
    let index = connect_index(&settings, embedder.dimension()).await?;

    println!("Scanning directory: {}", args.dir.display());
    let files = find_sources(&args.dir);
    println!("Found {} supported files", files.len());

    if files.is_empty() {
        println!("No supported files found. Exiting.");
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut total_chunks = 0usize;
    let mut failed_files: Vec<(PathBuf, String)> = Vec::new();

    for (path, format) in &files {
        pb.set_message(path.file_name().unwrap_or_default().to_string_lossy().to_string());

        match index_file(path, *format, &splitter, embedder.as_ref(), index.as_ref()).await {
            Ok(chunk_count) => total_chunks += chunk_count,
            Err(e) => {
                tracing::warn!("Failed to process {}: {}", path.display(), e);
                failed_files.push((path.clone(), e.to_string()));
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("done");

    println!("\nIndexing complete!");
    println!("  Files processed: {}/{}", files.len() - failed_files.len(), files.len());
    println!("  Files failed:    {}", failed_files.len());
    println!("  Total chunks:    {}", total_chunks);
    println!("  Index:           {}", settings.index_name);

    if !failed_files.is_empty() {
        println!("\nFailed files:");
        for (path, err) in &failed_files {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}
