use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use webp_shelf::config;
use webp_shelf::imaging::mime_for_path;
use webp_shelf::naming::Owner;
use webp_shelf::output;
use webp_shelf::service::{Download, Service, Upload};

#[derive(Parser)]
#[command(name = "webp-shelf")]
#[command(about = "Convert images to WebP and keep them for a limited time")]
#[command(long_about = "\
Convert images to WebP and keep them for a limited time

Every invocation acts on behalf of one session owner. Converted files are
stored as {owner}_{token}_{timestamp}.webp and only that owner can list,
download, or delete them. Files older than the retention age are swept
automatically, at most once per cleanup interval.

Storage layout (relative to the working directory by default):

  uploads/                          # Spooled uploads, removed after conversion
  converted/                        # Stored artifacts
  <temp>/webp_shelf_cleanup.lock    # Last-cleanup marker (its mtime)

Run 'webp-shelf gen-config' to generate a documented webp-shelf.toml.")]
#[command(version)]
struct Cli {
    /// Config file; missing means stock defaults
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Session owner; a new one is generated and printed when omitted
    #[arg(long, env = "WEBP_SHELF_OWNER", global = true)]
    owner: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one or more images to WebP
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Declared mime type for every file (default: guessed from extension)
        #[arg(long)]
        mime: Option<String>,
    },
    /// List the owner's converted files, newest first
    List,
    /// Delete one converted file
    Delete { name: String },
    /// Save one converted file
    Download {
        name: String,
        /// Output file or directory (default: current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Save every converted file as one archive
    DownloadAll {
        /// Output file or directory (default: current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete expired files now, ignoring the cleanup interval
    Cleanup,
    /// Show file counts and retention settings
    Stats,
    /// Print a stock webp-shelf.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let service = Service::from_config(config::load_config(&cli.config)?)?;
    let owner = resolve_owner(cli.owner.as_deref())?;

    match cli.command {
        Command::Upload { files, mime } => {
            let uploads = files
                .iter()
                .map(|path| read_upload(path, mime.as_deref()))
                .collect::<std::io::Result<Vec<_>>>()?;
            let outcomes = service.upload(&owner, uploads);
            if cli.json {
                print_json(&output::upload_outcomes_json(&outcomes))?;
            } else {
                output::print_upload_outcomes(&outcomes);
            }
        }
        Command::List => {
            let artifacts = service.list(&owner)?;
            if cli.json {
                print_json(&artifacts)?;
            } else {
                output::print_artifact_list(&artifacts);
            }
        }
        Command::Delete { name } => {
            service.delete(&owner, &name)?;
            if cli.json {
                print_json(&serde_json::json!({ "deleted": name }))?;
            } else {
                println!("Deleted {}", name);
            }
        }
        Command::Download { name, out } => {
            let download = service.download(&owner, &name)?;
            save_download(&download, out.as_deref(), cli.json)?;
        }
        Command::DownloadAll { out } => {
            let download = service.download_all(&owner)?;
            save_download(&download, out.as_deref(), cli.json)?;
        }
        Command::Cleanup => {
            let report = service.manual_cleanup();
            if cli.json {
                print_json(&report)?;
            } else {
                output::print_cleanup_report(&report);
            }
        }
        Command::Stats => {
            let stats = service.stats(&owner)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                output::print_stats(&stats);
            }
        }
        Command::GenConfig => unreachable!("handled before the service is built"),
    }

    Ok(())
}

/// Use the given owner, or start a new session and tell the user its id.
fn resolve_owner(given: Option<&str>) -> Result<Owner, webp_shelf::naming::NamingError> {
    match given {
        Some(id) => Owner::new(id),
        None => {
            let owner = Owner::generate();
            eprintln!("Session: {owner} (pass --owner {owner} to reuse it)");
            Ok(owner)
        }
    }
}

fn read_upload(path: &Path, mime: Option<&str>) -> std::io::Result<Upload> {
    let mime = mime
        .or_else(|| mime_for_path(path))
        .unwrap_or("application/octet-stream");
    Ok(Upload {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        mime: mime.to_string(),
        bytes: std::fs::read(path)?,
    })
}

/// Write a download next to `out` (a directory) or at `out` (a file path).
fn save_download(
    download: &Download,
    out: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = match out {
        Some(p) if p.is_dir() => p.join(&download.file_name),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(&download.file_name),
    };
    std::fs::write(&target, &download.bytes)?;
    if json {
        print_json(&serde_json::json!({
            "file": target,
            "content_type": download.content_type,
            "size_bytes": download.bytes.len(),
        }))?;
    } else {
        println!(
            "Saved {} ({}, {})",
            target.display(),
            download.content_type,
            output::format_size(download.bytes.len() as u64)
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
