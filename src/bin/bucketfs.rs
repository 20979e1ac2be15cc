use bucketfs::{
    config::Config,
    filesystem::{AccountInfo, BucketFileSystemProvider, DirectoryEntry, Entry, FileSystemProvider, UnixFileSystem},
    Error,
    Result,
};
use bytes::Bytes;
use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "bucketfs.toml";

/// Splits a slash path into its parent path and leaf name.
fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    }
}

/// Walks `path` from the root one lookup per segment, the way a session
/// resolves a client path.
async fn resolve(fs: &dyn UnixFileSystem, path: &str, cancel: &CancellationToken) -> Result<Entry> {
    let mut current = Entry::Directory(fs.root().clone());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let dir = current
            .as_directory()
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        current = fs
            .get_entry_by_name(dir, segment, cancel)
            .await?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
    }
    Ok(current)
}

async fn resolve_directory(fs: &dyn UnixFileSystem, path: &str, cancel: &CancellationToken) -> Result<DirectoryEntry> {
    match resolve(fs, path, cancel).await? {
        Entry::Directory(dir) => Ok(dir),
        Entry::File(_) => Err(Error::InvalidData(format!("{} is not a directory", path))),
    }
}

async fn run(matches: &ArgMatches, fs: Arc<dyn UnixFileSystem>, cancel: &CancellationToken) -> Result<()> {
    let fs = fs.as_ref();
    match matches.subcommand() {
        Some(("ls", sub)) => {
            let path = sub.get_one::<String>("path").map(|s| s.as_str()).unwrap_or("");
            let dir = resolve_directory(fs, path, cancel).await?;
            let entries = fs.get_entries(&dir, cancel).await?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{}", entry);
                }
            }
        }
        Some(("stat", sub)) => {
            let path = required(sub, "path")?;
            println!("{}", resolve(fs, path, cancel).await?);
        }
        Some(("put", sub)) => {
            let local = required(sub, "local")?;
            let remote = required(sub, "remote")?;
            let data = Bytes::from(tokio::fs::read(local).await?);
            let (parent, name) = split_parent(remote);
            let dir = resolve_directory(fs, parent, cancel).await?;
            match fs.get_entry_by_name(&dir, name, cancel).await? {
                Some(Entry::File(existing)) => fs.replace(&existing, data, cancel).await?,
                Some(Entry::Directory(_)) => {
                    return Err(Error::InvalidData(format!("{} is a directory", remote)));
                }
                None => fs.create(&dir, name, data, cancel).await?,
            }
        }
        Some(("mkdir", sub)) => {
            let (parent, name) = split_parent(required(sub, "path")?);
            let dir = resolve_directory(fs, parent, cancel).await?;
            let created = fs.create_directory(&dir, name, cancel).await?;
            info!("Created {}", created.key);
        }
        Some(("mv", sub)) => {
            let source = required(sub, "source")?;
            let target = required(sub, "target")?;
            let (source_parent, _) = split_parent(source);
            let (target_parent, target_name) = split_parent(target);
            let parent = resolve_directory(fs, source_parent, cancel).await?;
            let entry = resolve(fs, source, cancel).await?;
            let target_dir = resolve_directory(fs, target_parent, cancel).await?;
            let moved = fs.move_entry(&parent, &entry, &target_dir, target_name, cancel).await?;
            println!("{}", moved);
        }
        Some(("rm", sub)) => {
            let entry = resolve(fs, required(sub, "path")?, cancel).await?;
            fs.unlink(&entry, cancel).await?;
        }
        Some(("cat", sub)) => {
            let path = required(sub, "path")?;
            let offset = sub.get_one::<u64>("offset").copied().unwrap_or(0);
            let file = match resolve(fs, path, cancel).await? {
                Entry::File(file) => file,
                Entry::Directory(_) => return Err(Error::InvalidData(format!("{} is a directory", path))),
            };
            let mut reader = fs.open_read(&file, offset, cancel).await?;
            tokio::io::copy(&mut reader, &mut tokio::io::stdout()).await?;
        }
        _ => return Err(Error::InvalidData("no command given".to_string())),
    }
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(|s| s.as_str())
        .ok_or_else(|| Error::InvalidData(format!("missing argument {}", id)))
}

fn path_arg(help: &'static str) -> Arg {
    Arg::new("path").value_name("PATH").required(true).help(help)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("bucketfs")
        .version("1.0")
        .about("Browse and edit a storage bucket as a directory tree")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file path")
        )
        .arg(
            Arg::new("user")
                .long("user")
                .value_name("NAME")
                .global(true)
                .help("Account name the session runs as")
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("ls")
                .about("List a directory")
                .arg(Arg::new("path").value_name("PATH").help("Directory path (default: root)"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Print entries as JSON")
                )
        )
        .subcommand(Command::new("stat").about("Show one entry").arg(path_arg("Entry path")))
        .subcommand(
            Command::new("put")
                .about("Upload a local file")
                .arg(Arg::new("local").value_name("LOCAL").required(true))
                .arg(Arg::new("remote").value_name("REMOTE").required(true))
        )
        .subcommand(Command::new("mkdir").about("Create a directory").arg(path_arg("Directory path")))
        .subcommand(
            Command::new("mv")
                .about("Move a file (copy, then delete the source)")
                .arg(Arg::new("source").value_name("SOURCE").required(true))
                .arg(Arg::new("target").value_name("TARGET").required(true))
        )
        .subcommand(Command::new("rm").about("Delete a file or a whole directory tree").arg(path_arg("Entry path")))
        .subcommand(
            Command::new("cat")
                .about("Print a file")
                .arg(path_arg("File path"))
                .arg(
                    Arg::new("offset")
                        .long("offset")
                        .value_name("BYTES")
                        .help("Start reading at this byte offset")
                        .value_parser(clap::value_parser!(u64))
                )
        )
        .get_matches();

    // Load configuration
    let config = match matches.get_one::<String>("config") {
        Some(file) => Config::load(file)?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG)?,
        None => Config::from_env(),
    };

    // Initialize logging
    let log_level = match config.loglevel() {
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let provider = BucketFileSystemProvider::from_config(&config).await?;
    let user = matches.get_one::<String>("user").map(|s| s.as_str()).unwrap_or("anonymous");
    let fs = provider.create(&AccountInfo::new(user)).await?;

    if let Err(e) = run(&matches, fs, &cancel).await {
        error!("{}", e);
        for key in e.failed_keys() {
            error!("  not removed: {}", key);
        }
        std::process::exit(1);
    }

    Ok(())
}
