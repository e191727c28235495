use clap::{Parser, Subcommand};
use media_locker::client::LockerClient;
use media_locker::config::{self, LockerConfig};
use media_locker::gallery::{
    Action, BrowseCommand, BrowseSession, GallerySink, GalleryState, PersistedView, Task,
};
use media_locker::listing::{self, ListingQuery};
use media_locker::media::FilterKind;
use media_locker::{output, server};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// File in the config directory holding the last browsed filter and page.
const VIEW_STATE_FILE: &str = ".locker-view.json";

#[derive(Parser)]
#[command(name = "media-locker")]
#[command(about = "Self-hosted LAN media locker")]
#[command(long_about = "\
Self-hosted LAN media locker

Devices on the local network upload photos, videos and documents to one
machine. Files are stored flat in the upload directory, named after the
device that sent them:

  uploads/
  ├── phone-7f3a_IMG_0042.JPG      # image
  ├── phone-7f3a_clip.mp4          # video
  ├── laptop_notes.pdf             # other
  └── thumbnails/                  # generated on demand, not listed
      └── phone-7f3a_clip.mp4.thumb.jpg

Listings are newest first and can be filtered by type (all, image, video,
other). Every request rescans the directory, so files added or removed by
hand show up immediately.

Run 'media-locker gen-config' to generate a documented locker.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing locker.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override where files are stored.
#[derive(clap::Args, Clone)]
struct StorageArgs {
    /// Upload directory (thumbnails go to its `thumbnails/` subdirectory)
    #[arg(long)]
    uploads: Option<PathBuf>,
}

/// Flags for commands talking to a running locker.
#[derive(clap::Args, Clone)]
struct RemoteArgs {
    /// Base URL of the locker server
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Device identifier prefixed to uploaded filenames
    #[arg(long, default_value = "cli")]
    device_id: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides locker.toml)
        #[arg(long)]
        port: Option<u16>,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// List the upload directory locally
    Ls {
        /// all, image, video or other
        #[arg(long, default_value = "all")]
        filter: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Page size (defaults to listing.default_page_size)
        #[arg(long)]
        limit: Option<usize>,
        /// Ignore paging and list every matching file
        #[arg(long)]
        all: bool,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Page through a remote locker interactively
    Browse {
        /// Initial view as a query string, e.g. "filter=video&page=2"
        #[arg(long)]
        query: Option<String>,
        /// Request thumbnails for images and videos as they are shown
        #[arg(long)]
        thumbnails: bool,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Upload files, skipping any already on the server
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Print a stock locker.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, storage } => {
            let mut config = load_config(&cli.config_dir, &storage)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await?;
        }
        Command::Ls {
            filter,
            page,
            limit,
            all,
            json,
            storage,
        } => {
            let config = load_config(&cli.config_dir, &storage)?;
            let query = ListingQuery {
                filter: FilterKind::parse(&filter),
                page: page.max(1),
                limit: config.listing.effective_page_size(limit),
                check_duplicates: all,
            };
            let response = listing::list_directory(&config.storage.upload_dir, &query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                output::print_listing(&response);
            }
        }
        Command::Browse {
            query,
            thumbnails,
            remote,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let client = LockerClient::new(&remote.server, remote.device_id)?;
            let state_path = cli.config_dir.join(VIEW_STATE_FILE);
            let stored = std::fs::read_to_string(&state_path).ok();
            let view = PersistedView::rehydrate(query.as_deref(), stored.as_deref());

            let state = GalleryState::from_view(&view, config.listing.default_page_size);
            let mut session = BrowseSession::new(state, thumbnails);
            browse(&client, &mut session, &view).await?;

            std::fs::write(&state_path, session.state().view().to_json()?)?;
        }
        Command::Upload { files, remote } => {
            let client = LockerClient::new(&remote.server, remote.device_id)?;
            let existing = client.existing_filenames().await?;
            let mut failed = 0;
            for path in &files {
                let result = client.upload_path(path, &existing).await;
                if result.is_err() {
                    failed += 1;
                }
                println!("{}", output::format_upload(path, &result));
            }
            if failed > 0 {
                return Err(format!("{failed} of {} uploads failed", files.len()).into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(dir: &Path, storage: &StorageArgs) -> Result<LockerConfig, config::ConfigError> {
    let mut config = config::load_config(dir)?;
    if let Some(uploads) = &storage.uploads {
        config.storage.thumbnail_dir = uploads.join("thumbnails");
        config.storage.upload_dir = uploads.clone();
    }
    Ok(config)
}

const BROWSE_HELP: &str = "\
commands: n (next page), f <all|image|video|other>, d <file> (delete),
          i <file> (details), c (close details), r (retry), q (quit)";

async fn browse(
    client: &LockerClient,
    session: &mut BrowseSession,
    view: &PersistedView,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sink = output::TerminalSink::new();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{BROWSE_HELP}");
    let mut actions: VecDeque<Action> = session.start(view).into();

    'browse: loop {
        while let Some(action) = actions.pop_front() {
            match action {
                Action::Run(Task::Load(req)) => {
                    let effects = client.load(session.state_mut(), &req).await;
                    sink.apply_all(&effects);
                    sink.flush();
                    actions.extend(session.loaded(&effects));
                }
                Action::Run(Task::Thumbnail(name)) => {
                    if let Err(e) = client.generate_thumbnail(&name).await {
                        warn!(filename = %name, error = %e, "thumbnail request failed");
                    }
                }
                Action::Preload(name) => {
                    let client = client.clone();
                    let done = done_tx.clone();
                    tokio::spawn(async move {
                        let result = client.file_metadata(&name).await;
                        // The receiver only goes away when browsing ends.
                        let _ = done.send((name, result));
                    });
                }
                Action::Delete(name) => match client.delete(&name).await {
                    Ok(counts) => {
                        println!("Deleted {name}. {}", output::format_counts(&counts));
                        actions.extend(session.deleted(&name));
                    }
                    Err(e) => println!("Delete failed: {e}"),
                },
                Action::Say(message) => println!("{message}"),
                Action::Help => println!("{BROWSE_HELP}"),
                Action::Quit => break 'browse,
            }
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break 'browse;
                };
                if let Some(command) = BrowseCommand::parse(&line) {
                    actions.extend(session.command(command));
                }
            }
            Some((name, result)) = done_rx.recv() => {
                println!("{}", output::format_metadata(&name, &result));
                actions.extend(session.preload_finished());
            }
        }
    }

    session.shutdown();
    Ok(())
}
