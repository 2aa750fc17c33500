//! garage-backup - command-line client for the garage backup API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use garage_backup_cli::{utils, BackupClient, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Server URL (overrides config)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Bearer token (overrides config)
    #[arg(short, long, global = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a backup and download it
    Create {
        /// Directory to save the archive in
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List archives stored on the server
    List,
    /// Restore from a local archive
    Restore { file: PathBuf },
    /// Restore from an archive stored on the server
    RestoreStored { name: String },
    /// Server health and collection counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(url) = args.server {
        config.server.url = url;
    }
    if let Some(token) = args.token {
        config.server.token = Some(token);
    }

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let client = BackupClient::new(&config.server)?;

    match args.command {
        Command::Create { output } => {
            let dir = output.unwrap_or_else(|| config.output.dir.clone());
            let path = client.create_backup(&dir).await?;
            println!("{}", path.display());
        }
        Command::List => {
            for archive in client.list_backups().await? {
                println!("{}\t{}\t{}", archive.name, archive.created, archive.size);
            }
        }
        Command::Restore { file } => {
            let summary = client.restore_file(&file).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::RestoreStored { name } => {
            let summary = client.restore_stored(&name).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Status => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            for collection in client.collections().await? {
                println!("{}\t{}", collection.name, collection.count);
            }
        }
    }

    Ok(())
}
