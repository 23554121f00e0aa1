//! yproto demo CLI
//!
//! Exercises the wire codec and the content-addressed file-transfer
//! protocol end to end, in-process: there is no transport here (the
//! protocol is transport-agnostic), just the codec and session state
//! machines driven directly against in-memory stores.

mod config;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use yproto_core::batch::decode_batch;
use yproto_core::heartbeat::{encode_ping, encode_pong};
use yproto_core::message::Envelope;
use yproto_files::merkle::MerkleTree;
use yproto_files::storage::{
    FileMetadata, FileStore, InMemoryFileStore, InMemoryUploadStore, PermissionDecision,
};
use yproto_files::upload::{UploadReceiver, UploadSender};
use yproto_files::{DownloadResponder, DownloadSession, TransferConfig, chunker};

use config::Config;
use progress::{TransferProgress, format_bytes};

/// yproto - wire codec and content-addressed file-transfer protocol demo
#[derive(Parser)]
#[command(name = "yproto")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a binary frame (or, with --batch, a message array) and
    /// print its structure
    Inspect {
        /// File containing the raw encoded bytes
        file: String,

        /// Decode as a message-array batch instead of a single envelope
        #[arg(long)]
        batch: bool,
    },

    /// Emit a ping or pong heartbeat frame's bytes, hex-encoded
    Heartbeat {
        /// "ping" or "pong"
        #[arg(default_value = "ping")]
        kind: String,
    },

    /// Build the Merkle tree over a file's chunks and print its root
    /// (content id) and per-chunk proof lengths
    Merkle {
        /// File to hash
        file: String,
    },

    /// Run an in-memory upload-then-download round trip for a file and
    /// report whether the reassembled bytes match the original
    Transfer {
        /// File to transfer
        file: String,
    },

    /// Print the effective configuration, creating a default file if
    /// none exists yet
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Inspect { file, batch } => inspect(&file, batch)?,
        Commands::Heartbeat { kind } => heartbeat(&kind)?,
        Commands::Merkle { file } => merkle(&file)?,
        Commands::Transfer { file } => transfer(&file, &config).await?,
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}

fn inspect(file: &str, batch: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(file)?;

    if batch {
        let envelopes = decode_batch(&bytes)?;
        println!("batch of {} envelope(s):", envelopes.len());
        for (i, mut env) in envelopes.into_iter().enumerate() {
            println!("  [{i}] id={} {env:?}", env.id());
        }
        return Ok(());
    }

    let mut env = Envelope::decode(&bytes)?;
    println!("id:       {}", env.id());
    println!("document: {:?}", env.document);
    println!("encrypted: {}", env.encrypted);
    println!("target:   {:?}", env.target);
    Ok(())
}

fn heartbeat(kind: &str) -> anyhow::Result<()> {
    let bytes = match kind {
        "ping" => encode_ping(),
        "pong" => encode_pong(),
        other => anyhow::bail!("unknown heartbeat kind '{other}', expected ping or pong"),
    };
    println!("{}", hex::encode(&bytes));
    Ok(())
}

fn merkle(file: &str) -> anyhow::Result<()> {
    let data = std::fs::read(file)?;
    let chunks = chunker::split(&data, yproto_files::DEFAULT_CHUNK_SIZE);
    let tree = MerkleTree::build(&chunks)?;

    println!("file:        {file}");
    println!("size:        {}", format_bytes(data.len() as u64));
    println!("chunks:      {}", tree.chunk_count());
    println!("content id:  {}", tree.root_base64());
    for i in 0..tree.chunk_count() {
        let proof = tree.proof(i)?;
        println!("  chunk {i}: proof length {}", proof.len());
    }
    Ok(())
}

async fn transfer(file: &str, config: &Config) -> anyhow::Result<()> {
    let path = PathBuf::from(file);
    let data = std::fs::read(&path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let progress = TransferProgress::new(data.len() as u64, &filename);

    let chunks = chunker::split(&data, config.transfer.chunk_size);
    let mut sender = UploadSender::new(chunks)?;

    let uploads = Arc::new(InMemoryUploadStore::new());
    let files = Arc::new(InMemoryFileStore::new());
    let receiver = UploadReceiver::new(
        Arc::clone(&uploads),
        Arc::clone(&files),
        config.transfer.clone(),
    );

    let metadata = FileMetadata {
        filename: filename.clone(),
        size: data.len() as u64,
        mime_type: "application/octet-stream".to_string(),
        encrypted: false,
        last_modified: 0,
    };
    receiver.begin(&filename, metadata, |_, _| PermissionDecision::allow())?;

    for index in sender.outstanding() {
        let (bytes, proof) = sender.chunk_frame(index)?;
        receiver.accept_chunk(&filename, index, bytes.to_vec(), proof)?;
        sender.ack(index);
        let transferred = (index + 1) * config.transfer.chunk_size as u64;
        progress.update(transferred.min(data.len() as u64));
    }

    let content_id = receiver.complete(&filename)?;
    progress.finish_with_message(format!("uploaded, content id {content_id}"));

    let responder = DownloadResponder::new(Arc::clone(&files));
    let stored = responder.handle_request(&content_id, |_| PermissionDecision::allow())?;

    let mut session = DownloadSession::new(content_id.clone())?;
    session.on_metadata(stored.metadata.clone());
    for i in 0..stored.chunks.len() as u64 {
        let proof = stored.tree.proof(i as usize)?;
        session.on_chunk(i, stored.chunks[i as usize].clone(), &proof)?;
    }

    let reassembled = session.assemble()?;
    if reassembled == data {
        println!("OK: content id {content_id} round-tripped {} bytes", data.len());
    } else {
        anyhow::bail!("reassembled bytes did not match the original file");
    }

    files.delete_file(&content_id);
    Ok(())
}

fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
