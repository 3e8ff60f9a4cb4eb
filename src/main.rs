use clap::{ArgAction, Parser, Subcommand};
use derive_more::{Display, Error};
use exn::ResultExt;
use futures::StreamExt;
use hoard_cache::{Database, MetadataStore, Repository, StoreHandle};
use hoard_config::Config;
use hoard_library::{Context, Library, UploadEvent, upload_all};
use hoard_storage::{Deleted, LocalResolver, LocalWriter, Resolution};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type Result<T> = std::result::Result<T, exn::Exn<ErrorKind>>;

#[derive(Debug, Display, Error)]
enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the metadata database")]
    Database,
    #[display("could not open the storage root")]
    Storage,
    #[display("operation failed")]
    Library,
}

#[derive(Parser)]
#[command(name = "hoard", version, about = "Content-addressed personal file storage")]
struct Cli {
    /// Configuration file (defaults to hoard.toml in the platform config directory)
    #[arg(long, short, global = true, env = "HOARD_CONFIG")]
    config: Option<PathBuf>,
    /// Log more (repeat for trace output); RUST_LOG takes precedence
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store files, skipping content that is already stored
    Upload {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Destination folder id (defaults to the configured default folder)
        #[arg(long)]
        folder: Option<Uuid>,
        /// Place files in dated subdirectories
        #[arg(long)]
        by_date: bool,
    },
    /// Create a folder path (and any missing parents), printing its id
    Mkdir { path: String },
    /// Find the physical file behind a stored path
    Resolve {
        stored: PathBuf,
        /// The record says the file is stored compressed
        #[arg(long)]
        compressed: bool,
    },
    /// Delete a physical file into the recycle bin
    Delete {
        path: PathBuf,
        /// Remove the file for good instead
        #[arg(long)]
        permanent: bool,
    },
    /// Delete a file record and its physical file
    Forget {
        id: Uuid,
        #[arg(long)]
        permanent: bool,
    },
    /// Move a recycled file back to where it was deleted from
    Restore { recycled: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; cancelling");
                cancel.cancel();
            }
        }
    });

    match run(cli, &cancel).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let db = Database::connect(&config.cache.database).await.or_raise(|| ErrorKind::Database)?;
    let store: StoreHandle = Arc::new(Repository::from(&db));
    let writer = LocalWriter::new(&config.storage.root, config.storage.recycle_bin()).or_raise(|| ErrorKind::Storage)?;
    let resolver = LocalResolver::new(&config.storage.root, config.storage.compression);
    let ctx = Context::from_config(&config).or_raise(|| ErrorKind::Config)?;
    let library = Library::new(store.clone(), Arc::new(writer), Arc::new(resolver), ctx);
    library.init().await.or_raise(|| ErrorKind::Library)?;

    let code = execute(cli.command, &library, &store, cancel).await;
    db.close().await;
    code
}

async fn execute(command: Command, library: &Library, store: &StoreHandle, cancel: &CancellationToken) -> Result<ExitCode> {
    match command {
        Command::Upload { sources, folder, by_date } => {
            let mut failed = 0usize;
            let mut events = std::pin::pin!(upload_all(library, sources, folder, by_date, cancel));
            while let Some(event) = events.next().await {
                match event {
                    Ok(UploadEvent::Uploaded(result)) => {
                        let status = if result.is_duplicate { "duplicate" } else { "stored" };
                        println!("{status}\t{}\t{}", result.file_id, result.final_path.display());
                    },
                    Ok(UploadEvent::DiscoveryComplete(total)) => info!(total, "uploading"),
                    Ok(UploadEvent::Started | UploadEvent::Complete) => {},
                    Err(err) => {
                        failed += 1;
                        eprintln!("{err:?}");
                    },
                }
            }
            Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        },
        Command::Mkdir { path } => {
            let folder = store.get_or_create_folder_by_path(&path).await.or_raise(|| ErrorKind::Library)?;
            println!("{}\t{}", folder.id, folder.path);
            Ok(ExitCode::SUCCESS)
        },
        Command::Resolve { stored, compressed } => {
            let resolution = library.resolve_physical_path(&stored, compressed).await;
            for checked in resolution.checked() {
                eprintln!("{}\t{}\t{}", if checked.exists { "hit" } else { "miss" }, checked.step, checked.path.display());
            }
            match resolution {
                Resolution::Found { path, .. } => {
                    println!("{}", path.display());
                    Ok(ExitCode::SUCCESS)
                },
                Resolution::NotFound { siblings, .. } => {
                    for sibling in siblings {
                        eprintln!("nearby\t{sibling}");
                    }
                    Ok(ExitCode::FAILURE)
                },
            }
        },
        Command::Delete { path, permanent } => {
            let deleted = library.delete_physical_file(&path, !permanent).await.or_raise(|| ErrorKind::Library)?;
            print_deleted(&deleted);
            Ok(ExitCode::SUCCESS)
        },
        Command::Forget { id, permanent } => {
            match library.delete_file(id, !permanent).await.or_raise(|| ErrorKind::Library)? {
                Some(deleted) => print_deleted(&deleted),
                None => println!("record removed; no physical file found"),
            }
            Ok(ExitCode::SUCCESS)
        },
        Command::Restore { recycled } => {
            let restored = library.restore_physical_file(&recycled).await.or_raise(|| ErrorKind::Library)?;
            println!("{}", restored.display());
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn print_deleted(deleted: &Deleted) {
    match deleted {
        Deleted::Recycled { from, to } => println!("recycled\t{}\t{}", from.display(), to.display()),
        Deleted::Erased(path) => println!("erased\t{}", path.display()),
    }
}
