//! src/main.rs
//! `dirmon`: drive the directory engine from a terminal

use std::{fmt::Write as _, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

use dirmon_core::{
    ClientId, Config, DirectoryEvent, DirectoryRegistry, File, FileAttributes, LoggerBuilder, Uri,
    directory, search::Query,
};

#[derive(Parser)]
#[command(version, about = "Watch directories and run searches with the dirmon engine.")]
struct Args {
    /// Mirror log output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the configured log level (e.g. `debug`, `dirmon_core=trace`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the contents of a directory, then every change until interrupted.
    Watch {
        path: PathBuf,

        /// Include dotfiles and backup files.
        #[arg(long)]
        hidden: bool,

        /// Attributes to keep loaded: info, mime, link, count, deep, all.
        #[arg(long, default_value = "info")]
        attrs: String,
    },

    /// Search below a location for names containing every word.
    Search {
        location: PathBuf,

        #[arg(required = true)]
        text: Vec<String>,

        #[arg(long)]
        hidden: bool,

        /// Restrict to content types, e.g. `image/*` (repeatable).
        #[arg(long = "mime")]
        mime_types: Vec<String>,
    },

    /// Show the effective configuration.
    Config {
        /// Write it to the config path.
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().await.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        Config::default()
    });

    let mut logger = LoggerBuilder::new()
        .with_config(config.logging.clone())
        .with_stderr(args.verbose || config.logging.stderr);
    if let Some(level) = &args.log_level {
        logger = logger.with_level(level);
    }
    let _guard = logger.build().context("Failed to initialize logging")?;

    info!("dirmon {} starting", env!("CARGO_PKG_VERSION"));

    directory::install_global(DirectoryRegistry::with_config(config.clone()))?;

    match args.command {
        Command::Watch {
            path,
            hidden,
            attrs,
        } => watch(path, hidden, &attrs).await,

        Command::Search {
            location,
            text,
            hidden,
            mime_types,
        } => search(location, &text, hidden, mime_types).await,

        Command::Config { write } => show_config(&config, write).await,
    }
}

async fn watch(path: PathBuf, hidden: bool, attrs: &str) -> Result<()> {
    let path = tokio::fs::canonicalize(&path)
        .await
        .with_context(|| format!("Cannot resolve {}", path.display()))?;
    let attrs = FileAttributes::parse_list(attrs)?;

    let dir = directory::get_by_uri(&Uri::from_path(&path)?)?;
    let client = ClientId::new();

    dir.monitor_add(client, hidden, attrs, print_event);

    wait_for_shutdown().await;
    dir.monitor_remove(client);

    Ok(())
}

async fn search(
    location: PathBuf,
    text: &[String],
    hidden: bool,
    mime_types: Vec<String>,
) -> Result<()> {
    let location = tokio::fs::canonicalize(&location)
        .await
        .with_context(|| format!("Cannot resolve {}", location.display()))?;

    let query = Query::new(text.join(" "), Uri::from_path(&location)?)
        .with_hidden(hidden)
        .with_mime_types(mime_types);

    let dir = directory::get_by_uri(&Uri::search(std::process::id()))?;
    dir.set_search_query(query)?;

    let files = tokio::select! {
        result = dir.ready(FileAttributes::INFO | FileAttributes::MIME_TYPE, true) => result?,
        () = wait_for_shutdown() => return Ok(()),
    };

    for file in &files {
        println!("{}", describe(file));
    }
    println!("{} hits", files.len());

    Ok(())
}

async fn show_config(config: &Config, write: bool) -> Result<()> {
    println!("# {}", Config::config_path()?.display());
    println!("{}", toml::to_string_pretty(config)?);

    if write {
        config.save().await?;
    }

    Ok(())
}

fn print_event(event: &DirectoryEvent) {
    match event {
        DirectoryEvent::Ready(files) => {
            println!("ready: {} entries", files.len());
            for file in files {
                println!("  {}", describe(file));
            }
        }
        DirectoryEvent::FilesAdded(files) => files.iter().for_each(|f| println!("+ {}", describe(f))),
        DirectoryEvent::FilesChanged(files) => {
            files.iter().for_each(|f| println!("~ {}", describe(f)));
        }
        DirectoryEvent::FilesRemoved(files) => files.iter().for_each(|f| println!("- {}", f.name())),
        DirectoryEvent::DoneLoading => println!("-- done loading"),
        DirectoryEvent::LoadError(e) => eprintln!("! {e}"),
    }
}

fn describe(file: &File) -> String {
    let info = file.info();
    let mut out = file.name();
    if file.is_directory() {
        out.push('/');
    }

    if let Some(size) = info.size_human() {
        let _ = write!(out, "  {size}");
    }
    if let Some(date) = info.format_date("%Y-%m-%d %H:%M") {
        let _ = write!(out, "  {date}");
    }
    if let Some(mime) = &info.mime_type {
        let _ = write!(out, "  {mime}");
    }
    if let Some(target) = &info.link_target {
        let _ = write!(out, " -> {}", target.display());
    }
    if let Some(count) = info.item_count {
        let _ = write!(out, "  ({count} items)");
    }
    if let Some(deep) = &info.deep_counts {
        let _ = write!(out, "  [{} files, {} dirs]", deep.files, deep.directories);
    }
    let failed = file.failed_attributes();
    if !failed.is_empty() {
        let _ = write!(out, "  (unavailable: {failed:?})");
    }

    out
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = signal::ctrl_c() => info!("Received Ctrl+C"),
                }
            }
            Err(e) => {
                warn!("Failed to create SIGTERM handler: {}", e);
                let _ = signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C");
    }
}
